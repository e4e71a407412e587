use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::generation::models::TaskKind;
use crate::generation::preprocess::PreprocessOptions;
use crate::generation::tiers::PerfTier;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum SampleSolver {
    #[default]
    #[serde(rename = "unipc")]
    #[value(name = "unipc")]
    Unipc,
    #[serde(rename = "dpm++")]
    #[value(name = "dpm++")]
    DpmPlusPlus,
}

impl SampleSolver {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleSolver::Unipc => "unipc",
            SampleSolver::DpmPlusPlus => "dpm++",
        }
    }
}

/// Character animation inputs (`animate-14B`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimateOptions {
    /// Output directory of the preprocessing step
    pub src_root_path: Option<PathBuf>,
    /// Run preprocessing on this video first; its output becomes `src_root_path`
    pub preprocess: Option<PreprocessOptions>,
    /// Replace the character instead of animating the reference
    pub replace: bool,
    pub refert_num: u32,
    pub use_relighting_lora: bool,
}

impl Default for AnimateOptions {
    fn default() -> Self {
        Self {
            src_root_path: None,
            preprocess: None,
            replace: false,
            refert_num: 5,
            use_relighting_lora: false,
        }
    }
}

/// Speech-driven inputs (`s2v-14B`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechOptions {
    pub enable_tts: bool,
    pub tts_prompt_audio: Option<PathBuf>,
    pub tts_prompt_text: Option<String>,
    pub tts_text: Option<String>,
    pub pose_video: Option<PathBuf>,
    pub infer_frames: u32,
    pub start_from_ref: bool,
    pub num_clip: Option<u32>,
}

impl Default for SpeechOptions {
    fn default() -> Self {
        Self {
            enable_tts: false,
            tts_prompt_audio: None,
            tts_prompt_text: None,
            tts_text: None,
            pose_video: None,
            infer_frames: 80,
            start_from_ref: false,
            num_clip: None,
        }
    }
}

/// Everything the generator needs besides the GPUs.
///
/// Unset size, steps, shift and guide scale use the
/// [`ModelSpec`](super::ModelSpec) defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub task: TaskKind,
    pub prompt: String,
    #[serde(default)]
    pub output_file: Option<PathBuf>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub sample_steps: Option<u32>,
    #[serde(default)]
    pub sample_solver: SampleSolver,
    #[serde(default)]
    pub sample_shift: Option<f64>,
    #[serde(default)]
    pub sample_guide_scale: Option<f64>,
    /// Negative means random.
    #[serde(default = "random_seed")]
    pub seed: i64,
    #[serde(default)]
    pub image: Option<PathBuf>,
    #[serde(default)]
    pub audio: Option<PathBuf>,
    #[serde(default)]
    pub frame_num: Option<u32>,
    /// Converted to a frame count at the model's fps when `frame_num` is unset.
    #[serde(default)]
    pub duration_secs: Option<f64>,
    #[serde(default)]
    pub use_prompt_extend: bool,
    #[serde(default)]
    pub perf_tier: PerfTier,
    #[serde(default)]
    pub teacache_threshold: Option<f64>,
    #[serde(default)]
    pub animate: AnimateOptions,
    #[serde(default)]
    pub speech: SpeechOptions,
}

fn random_seed() -> i64 {
    -1
}

impl GenerationRequest {
    pub fn new(task: TaskKind, prompt: impl Into<String>) -> Self {
        Self {
            task,
            prompt: prompt.into(),
            output_file: None,
            size: None,
            sample_steps: None,
            sample_solver: SampleSolver::default(),
            sample_shift: None,
            sample_guide_scale: None,
            seed: random_seed(),
            image: None,
            audio: None,
            frame_num: None,
            duration_secs: None,
            use_prompt_extend: false,
            perf_tier: PerfTier::default(),
            teacache_threshold: None,
            animate: AnimateOptions::default(),
            speech: SpeechOptions::default(),
        }
    }

    /// First 50 characters of the prompt, for queue displays.
    pub fn prompt_preview(&self) -> String {
        self.prompt.chars().take(50).collect()
    }
}
