use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::error::{OrchestratorError, Result};
use crate::generation::models::TaskKind;
use crate::scheduler::resource::ResourceId;
use crate::worker::command::{visible_devices, CommandBuilder, CommandSpec};

pub const DEFAULT_PREPROCESS_TIMEOUT: Duration = Duration::from_secs(1800);

/// Checkpoint folder for the pose/face/mask models, inside the animate weights.
const PROCESS_CHECKPOINT: &str = "process_checkpoint";

/// Source video settings for the `animate-14B` preprocessing step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessOptions {
    /// Driving video whose motion (or performer) is extracted
    pub video: PathBuf,
    /// Defaults to the model's sample rate
    #[serde(default)]
    pub fps: Option<u32>,
    /// Animation mode: retarget the pose onto the reference character
    #[serde(default)]
    pub retarget: bool,
    /// Animation mode with retargeting: edit the reference with FLUX first
    #[serde(default)]
    pub use_flux: bool,
    /// Replacement mode: mask dilation iterations
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Replacement mode: dilation kernel size
    #[serde(default = "default_kernel")]
    pub k: u32,
    #[serde(default = "one")]
    pub w_len: u32,
    #[serde(default = "one")]
    pub h_len: u32,
}

fn default_iterations() -> u32 {
    3
}

fn default_kernel() -> u32 {
    7
}

fn one() -> u32 {
    1
}

impl PreprocessOptions {
    pub fn new(video: impl Into<PathBuf>) -> Self {
        Self {
            video: video.into(),
            fps: None,
            retarget: false,
            use_flux: false,
            iterations: default_iterations(),
            k: default_kernel(),
            w_len: one(),
            h_len: one(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreprocessMode {
    /// Drive the reference character with the video's motion
    Animation,
    /// Swap the video's performer for the reference character
    Replacement,
}

/// Builds the `preprocess_data.py` invocation that turns a driving video and
/// a reference image into the inputs `generate.py --src_root_path` expects.
///
/// Runs on a single GPU from the script's own directory so its relative
/// imports resolve.
#[derive(Debug, Clone)]
pub struct PreprocessCommand {
    config: GenerationConfig,
    options: PreprocessOptions,
    mode: PreprocessMode,
    reference: PathBuf,
    resolution: (u32, u32),
    save_path: PathBuf,
}

impl PreprocessCommand {
    pub fn new(
        config: GenerationConfig,
        options: PreprocessOptions,
        mode: PreprocessMode,
        reference: impl Into<PathBuf>,
        resolution: (u32, u32),
        save_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            options,
            mode,
            reference: reference.into(),
            resolution,
            save_path: save_path.into(),
        }
    }

    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    pub fn mode(&self) -> PreprocessMode {
        self.mode
    }

    fn arguments(&self) -> Vec<String> {
        let spec = TaskKind::Animate14B.spec();
        let ckpt = self
            .config
            .checkpoint_dir(spec.checkpoint_dir)
            .join(PROCESS_CHECKPOINT);
        let fps = self.options.fps.unwrap_or(spec.sample_fps);
        let (width, height) = self.resolution;

        let mut args = vec![
            "--ckpt_path".to_string(),
            ckpt.display().to_string(),
            "--video_path".to_string(),
            self.options.video.display().to_string(),
            "--refer_path".to_string(),
            self.reference.display().to_string(),
            "--save_path".to_string(),
            self.save_path.display().to_string(),
            "--resolution_area".to_string(),
            width.to_string(),
            height.to_string(),
            "--fps".to_string(),
            fps.to_string(),
        ];
        match self.mode {
            PreprocessMode::Replacement => {
                args.push("--replace_flag".to_string());
                for (name, value) in [
                    ("--iterations", self.options.iterations),
                    ("--k", self.options.k),
                    ("--w_len", self.options.w_len),
                    ("--h_len", self.options.h_len),
                ] {
                    args.push(name.to_string());
                    args.push(value.to_string());
                }
            }
            PreprocessMode::Animation if self.options.retarget => {
                args.push("--retarget_flag".to_string());
                if self.options.use_flux {
                    args.push("--use_flux".to_string());
                }
            }
            PreprocessMode::Animation => {}
        }
        args
    }
}

impl CommandBuilder for PreprocessCommand {
    fn build(&self, resource_ids: &[ResourceId]) -> Result<CommandSpec> {
        if resource_ids.is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "at least one GPU is required".to_string(),
            ));
        }
        let script = self.config.preprocess_script();
        let cwd = script
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.repo_root.clone());

        Ok(CommandSpec::new(&self.config.python)
            .arg(script.display().to_string())
            .args(self.arguments())
            .current_dir(cwd)
            .env("CUDA_VISIBLE_DEVICES", visible_devices(resource_ids))
            .env("PYTHONPATH", self.config.python_path()))
    }
}

/// `"1280*720"` as `(1280, 720)`.
pub fn parse_size(size: &str) -> Result<(u32, u32)> {
    let parsed = size
        .split_once('*')
        .and_then(|(w, h)| Some((w.trim().parse().ok()?, h.trim().parse().ok()?)));
    parsed.ok_or_else(|| OrchestratorError::InvalidRequest(format!("malformed size {}", size)))
}
