use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::config::GenerationConfig;
use crate::error::{OrchestratorError, Result};
use crate::generation::models::{frame_num_for_duration, TaskKind};
use crate::generation::preprocess::{parse_size, PreprocessCommand, PreprocessMode};
use crate::generation::request::GenerationRequest;
use crate::generation::tiers::{PerfTier, DEFAULT_TEACACHE_THRESHOLD};
use crate::scheduler::resource::ResourceId;
use crate::worker::command::{visible_devices, CommandBuilder, CommandSpec};

const CUDA_ALLOC_CONF: &str = "expandable_segments:True,garbage_collection_threshold:0.8";

/// Builds the `generate.py` invocation for a request once its GPUs are known.
///
/// One GPU runs the script under the configured interpreter; several GPUs go
/// through the distributed launcher with FSDP and Ulysses sequence parallelism.
#[derive(Debug, Clone)]
pub struct GenerationCommand {
    config: GenerationConfig,
    request: GenerationRequest,
    output_file: PathBuf,
}

impl GenerationCommand {
    /// Resolves the output path, and the preprocessing output directory when
    /// there is one, up front so every build is identical.
    pub fn new(config: GenerationConfig, mut request: GenerationRequest) -> Self {
        let output_file = request
            .output_file
            .clone()
            .unwrap_or_else(|| default_output_file(&config.output_root, request.task));
        if request.animate.preprocess.is_some() && request.animate.src_root_path.is_none() {
            request.animate.src_root_path = Some(processed_dir(&output_file));
        }
        Self {
            config,
            request,
            output_file,
        }
    }

    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    pub fn output_file(&self) -> &Path {
        &self.output_file
    }

    /// Check the request against the model before any GPU is held.
    pub fn validate(&self) -> Result<()> {
        let req = &self.request;
        let spec = req.task.spec();

        if req.prompt.trim().is_empty() {
            return Err(invalid("prompt must not be empty"));
        }
        if let Some(ref size) = req.size {
            if !spec.sizes.contains(&size.as_str()) {
                return Err(invalid(format!(
                    "size {} is not supported by {} (expected one of {})",
                    size,
                    req.task,
                    spec.sizes.join(", ")
                )));
            }
        }
        if req.sample_steps == Some(0) {
            return Err(invalid("sample_steps must be positive"));
        }
        if let Some(duration) = req.duration_secs {
            if !(duration.is_finite() && duration > 0.0) {
                return Err(invalid("duration_secs must be positive"));
            }
        }
        if spec.requires_image && req.image.is_none() {
            return Err(invalid(format!("{} requires an input image", req.task)));
        }
        if spec.requires_audio && req.audio.is_none() && !req.speech.enable_tts {
            return Err(invalid(format!(
                "{} requires input audio or text-to-speech",
                req.task
            )));
        }
        if spec.requires_preprocessing && req.animate.src_root_path.is_none() {
            return Err(invalid(format!(
                "{} requires preprocessed inputs (src_root_path) or a preprocess step",
                req.task
            )));
        }
        if req.animate.preprocess.is_some() && !spec.requires_preprocessing {
            return Err(invalid(format!("{} has no preprocessing step", req.task)));
        }
        let video = req.animate.preprocess.as_ref().map(|p| &p.video);
        for path in [req.image.as_ref(), req.audio.as_ref(), video].into_iter().flatten() {
            if !path.exists() {
                return Err(invalid(format!("input file {} does not exist", path.display())));
            }
        }
        Ok(())
    }

    /// The step that must succeed before generation, if the request asks for one.
    pub fn preprocess_command(&self) -> Result<Option<PreprocessCommand>> {
        let req = &self.request;
        let (Some(options), Some(save_path)) =
            (&req.animate.preprocess, &req.animate.src_root_path)
        else {
            return Ok(None);
        };
        let reference = req
            .image
            .clone()
            .ok_or_else(|| invalid("preprocessing needs a reference image"))?;
        let size = req.size.as_deref().unwrap_or(req.task.spec().default_size);
        let mode = if req.animate.replace {
            PreprocessMode::Replacement
        } else {
            PreprocessMode::Animation
        };
        Ok(Some(PreprocessCommand::new(
            self.config.clone(),
            options.clone(),
            mode,
            reference,
            parse_size(size)?,
            save_path.clone(),
        )))
    }

    fn validate_gpus(&self, resource_ids: &[ResourceId]) -> Result<()> {
        if resource_ids.is_empty() {
            return Err(invalid("at least one GPU is required"));
        }
        let unique: HashSet<_> = resource_ids.iter().collect();
        if unique.len() != resource_ids.len() {
            return Err(invalid(format!("duplicate GPU ids: {:?}", resource_ids)));
        }
        self.validate_gpu_count(resource_ids.len() as u32)
    }

    /// Reject a GPU count the task cannot split its attention heads across.
    /// Checked before queueing so the job never waits for GPUs it cannot use.
    pub fn validate_gpu_count(&self, count: u32) -> Result<()> {
        if count == 0 {
            return Err(invalid("at least one GPU is required"));
        }
        if !self.request.task.supports_gpu_count(count) {
            return Err(invalid(format!(
                "{} GPUs cannot split {} attention heads evenly for {}",
                count,
                self.request.task.spec().num_heads,
                self.request.task
            )));
        }
        Ok(())
    }

    fn frame_num(&self) -> Option<u32> {
        let spec = self.request.task.spec();
        self.request.frame_num.or_else(|| {
            spec.frame_num.map(|default| {
                self.request
                    .duration_secs
                    .map(|d| frame_num_for_duration(d, spec.sample_fps))
                    .unwrap_or(default)
            })
        })
    }

    fn arguments(&self, gpus: usize) -> Vec<String> {
        let req = &self.request;
        let spec = req.task.spec();
        let size = req.size.as_deref().unwrap_or(spec.default_size);
        let steps = req.sample_steps.unwrap_or(spec.default_steps);
        let ckpt = self.config.checkpoint_dir(spec.checkpoint_dir);

        let mut args: Vec<String> = Vec::new();
        let mut flag = |name: &str, value: Option<String>| {
            args.push(name.to_string());
            if let Some(value) = value {
                args.push(value);
            }
        };

        flag("--task", Some(req.task.to_string()));
        flag("--size", Some(size.to_string()));
        flag("--ckpt_dir", Some(ckpt.display().to_string()));
        flag("--sample_steps", Some(steps.to_string()));
        flag("--sample_solver", Some(req.sample_solver.as_str().to_string()));
        flag("--save_file", Some(self.output_file.display().to_string()));
        flag("--prompt", Some(req.prompt.clone()));

        let shift = req.sample_shift.unwrap_or(spec.default_shift);
        flag("--sample_shift", Some(shift.to_string()));
        let scale = req.sample_guide_scale.unwrap_or(spec.default_guide_scale);
        flag("--sample_guide_scale", Some(scale.to_string()));
        if req.seed >= 0 {
            flag("--base_seed", Some(req.seed.to_string()));
        }
        if let Some(frames) = self.frame_num() {
            flag("--frame_num", Some(frames.to_string()));
        }
        if let Some(ref image) = req.image {
            flag("--image", Some(image.display().to_string()));
        }
        if let Some(ref audio) = req.audio {
            flag("--audio", Some(audio.display().to_string()));
        }

        if gpus > 1 {
            flag("--dit_fsdp", None);
            flag("--t5_fsdp", None);
            flag("--ulysses_size", Some(gpus.to_string()));
        }

        flag("--perf_mode", Some(req.perf_tier.to_string()));
        if req.perf_tier == PerfTier::Speed {
            let threshold = req.teacache_threshold.unwrap_or(DEFAULT_TEACACHE_THRESHOLD);
            flag("--teacache_threshold", Some(threshold.to_string()));
        }

        let extend = &self.config.prompt_extend;
        if req.use_prompt_extend && extend.is_enabled() {
            flag("--use_prompt_extend", None);
            flag("--prompt_extend_method", Some(extend.method.clone()));
            flag("--prompt_extend_target_lang", Some(extend.target_lang.clone()));
            flag("--prompt_extend_model", extend.model.clone());
        }

        match req.task {
            TaskKind::Animate14B => {
                let animate = &req.animate;
                if let Some(ref src) = animate.src_root_path {
                    flag("--src_root_path", Some(src.display().to_string()));
                }
                flag("--refert_num", Some(animate.refert_num.to_string()));
                if animate.replace {
                    flag("--replace_flag", None);
                    if animate.use_relighting_lora {
                        flag("--use_relighting_lora", None);
                    }
                }
            }
            TaskKind::S2v14B => {
                let speech = &req.speech;
                flag("--infer_frames", Some(speech.infer_frames.to_string()));
                if speech.enable_tts {
                    flag("--enable_tts", None);
                    if let Some(ref audio) = speech.tts_prompt_audio {
                        flag("--tts_prompt_audio", Some(audio.display().to_string()));
                    }
                    if let Some(ref text) = speech.tts_prompt_text {
                        flag("--tts_prompt_text", Some(text.clone()));
                    }
                    if let Some(ref text) = speech.tts_text {
                        flag("--tts_text", Some(text.clone()));
                    }
                }
                if let Some(ref pose) = speech.pose_video {
                    if pose.exists() {
                        flag("--pose_video", Some(pose.display().to_string()));
                    }
                }
                if speech.start_from_ref {
                    flag("--start_from_ref", None);
                }
                if let Some(clips) = speech.num_clip {
                    flag("--num_clip", Some(clips.to_string()));
                }
            }
            _ => {}
        }

        args
    }
}

impl CommandBuilder for GenerationCommand {
    fn build(&self, resource_ids: &[ResourceId]) -> Result<CommandSpec> {
        self.validate()?;
        self.validate_gpus(resource_ids)?;

        let gpus = resource_ids.len();
        let script = self.config.generate_script().display().to_string();
        let command = if gpus > 1 {
            CommandSpec::new(&self.config.launcher)
                .arg(format!("--nproc_per_node={}", gpus))
                .arg(script)
        } else {
            CommandSpec::new(&self.config.python).arg(script)
        };

        let mut command = command
            .args(self.arguments(gpus))
            .current_dir(&self.config.repo_root)
            .env("CUDA_VISIBLE_DEVICES", visible_devices(resource_ids))
            .env("PYTHONPATH", self.config.python_path())
            .env("PYTORCH_CUDA_ALLOC_CONF", CUDA_ALLOC_CONF);
        if gpus > 1 {
            command = command
                .env("NCCL_NVLS_ENABLE", "1")
                .env("NCCL_P2P_LEVEL", "NVL");
        }
        Ok(command)
    }
}

fn invalid(message: impl Into<String>) -> OrchestratorError {
    OrchestratorError::InvalidRequest(message.into())
}

/// `<dir>/<stem>_processed` next to the output video.
fn processed_dir(output_file: &Path) -> PathBuf {
    let stem = output_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output_file.with_file_name(format!("{}_processed", stem))
}

fn default_output_file(output_root: &Path, task: TaskKind) -> PathBuf {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S_%3f");
    output_root
        .join(task.as_str())
        .join(format!("output_{}.mp4", stamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::preprocess::PreprocessOptions;

    fn config() -> GenerationConfig {
        GenerationConfig {
            repo_root: PathBuf::from("/opt/Wan2.2"),
            models_path: PathBuf::from("/models"),
            output_root: PathBuf::from("/out"),
            ..Default::default()
        }
    }

    fn t2v() -> GenerationRequest {
        let mut req = GenerationRequest::new(TaskKind::T2vA14B, "two cats boxing");
        req.output_file = Some(PathBuf::from("/out/cats.mp4"));
        req
    }

    fn value_after<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == name)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn single_gpu_uses_python() {
        let spec = GenerationCommand::new(config(), t2v()).build(&[2]).unwrap();
        assert_eq!(spec.program, "python3");
        assert_eq!(spec.args[0], "/opt/Wan2.2/generate.py");
        assert_eq!(spec.env["CUDA_VISIBLE_DEVICES"], "2");
        assert!(!spec.env.contains_key("NCCL_P2P_LEVEL"));
        assert!(!spec.args.iter().any(|a| a == "--dit_fsdp"));
        assert_eq!(spec.cwd, Some(PathBuf::from("/opt/Wan2.2")));
        assert_eq!(value_after(&spec.args, "--task"), Some("t2v-A14B"));
        assert_eq!(value_after(&spec.args, "--size"), Some("1280*720"));
        assert_eq!(value_after(&spec.args, "--sample_steps"), Some("40"));
        assert_eq!(value_after(&spec.args, "--frame_num"), Some("81"));
        assert_eq!(value_after(&spec.args, "--ckpt_dir"), Some("/models/Wan2.2-T2V-A14B"));
        assert_eq!(value_after(&spec.args, "--save_file"), Some("/out/cats.mp4"));
        assert_eq!(value_after(&spec.args, "--perf_mode"), Some("quality"));
        assert!(value_after(&spec.args, "--base_seed").is_none());
    }

    #[test]
    fn multi_gpu_uses_launcher_and_nccl() {
        let spec = GenerationCommand::new(config(), t2v()).build(&[0, 1, 2, 3]).unwrap();
        assert_eq!(spec.program, "torchrun");
        assert_eq!(spec.args[0], "--nproc_per_node=4");
        assert_eq!(spec.env["CUDA_VISIBLE_DEVICES"], "0,1,2,3");
        assert_eq!(spec.env["NCCL_NVLS_ENABLE"], "1");
        assert_eq!(spec.env["NCCL_P2P_LEVEL"], "NVL");
        assert_eq!(value_after(&spec.args, "--ulysses_size"), Some("4"));
        assert!(spec.args.iter().any(|a| a == "--t5_fsdp"));
        assert_eq!(spec.env["PYTORCH_CUDA_ALLOC_CONF"], CUDA_ALLOC_CONF);
        assert!(spec.env["PYTHONPATH"].starts_with("/opt/Wan2.2"));
    }

    #[test]
    fn build_is_deterministic() {
        let cmd = GenerationCommand::new(config(), GenerationRequest::new(TaskKind::T2vA14B, "x"));
        assert_eq!(cmd.build(&[1]).unwrap(), cmd.build(&[1]).unwrap());
    }

    #[test]
    fn gpu_count_must_split_heads() {
        let err = GenerationCommand::new(config(), t2v()).build(&[0, 1, 2]);
        assert!(matches!(err, Err(OrchestratorError::InvalidRequest(_))));
        let err = GenerationCommand::new(config(), t2v()).build(&[1, 1]);
        assert!(matches!(err, Err(OrchestratorError::InvalidRequest(_))));
        let err = GenerationCommand::new(config(), t2v()).build(&[]);
        assert!(matches!(err, Err(OrchestratorError::InvalidRequest(_))));
    }

    #[test]
    fn requested_gpu_count_checked_before_queueing() {
        let command = GenerationCommand::new(config(), t2v());
        assert!(command.validate_gpu_count(1).is_ok());
        assert!(command.validate_gpu_count(8).is_ok());
        let err = command.validate_gpu_count(3).unwrap_err();
        assert!(err.to_string().contains("40 attention heads"), "{}", err);
        assert!(command.validate_gpu_count(0).is_err());
    }

    #[test]
    fn duration_sets_frame_count() {
        let mut req = t2v();
        req.duration_secs = Some(6.0);
        let spec = GenerationCommand::new(config(), req).build(&[0]).unwrap();
        assert_eq!(value_after(&spec.args, "--frame_num"), Some("96"));
    }

    #[test]
    fn sampling_overrides_and_seed() {
        let mut req = t2v();
        req.seed = 42;
        req.sample_shift = Some(8.5);
        req.sample_guide_scale = Some(4.0);
        req.perf_tier = PerfTier::Speed;
        req.teacache_threshold = Some(0.3);
        let spec = GenerationCommand::new(config(), req).build(&[0]).unwrap();
        assert_eq!(value_after(&spec.args, "--base_seed"), Some("42"));
        assert_eq!(value_after(&spec.args, "--sample_shift"), Some("8.5"));
        assert_eq!(value_after(&spec.args, "--sample_guide_scale"), Some("4"));
        assert_eq!(value_after(&spec.args, "--perf_mode"), Some("speed"));
        assert_eq!(value_after(&spec.args, "--teacache_threshold"), Some("0.3"));
    }

    #[test]
    fn sampling_defaults_come_from_model() {
        let spec = GenerationCommand::new(config(), t2v()).build(&[0]).unwrap();
        assert_eq!(value_after(&spec.args, "--sample_shift"), Some("12"));
        assert_eq!(value_after(&spec.args, "--sample_guide_scale"), Some("3.5"));

        let req = GenerationRequest::new(TaskKind::Ti2v5B, "x");
        let spec = GenerationCommand::new(config(), req).build(&[0]).unwrap();
        assert_eq!(value_after(&spec.args, "--sample_shift"), Some("8"));
        assert_eq!(value_after(&spec.args, "--sample_guide_scale"), Some("3"));
    }

    #[test]
    fn speed_tier_defaults_teacache_threshold() {
        let mut req = t2v();
        req.perf_tier = PerfTier::Speed;
        let spec = GenerationCommand::new(config(), req).build(&[0]).unwrap();
        assert_eq!(value_after(&spec.args, "--teacache_threshold"), Some("0.25"));
    }

    #[test]
    fn teacache_ignored_outside_speed_tier() {
        let mut req = t2v();
        req.perf_tier = PerfTier::Balanced;
        req.teacache_threshold = Some(0.3);
        let spec = GenerationCommand::new(config(), req).build(&[0]).unwrap();
        assert!(value_after(&spec.args, "--teacache_threshold").is_none());
    }

    #[test]
    fn prompt_extension_requires_model() {
        let mut req = t2v();
        req.use_prompt_extend = true;
        let spec = GenerationCommand::new(config(), req.clone()).build(&[0]).unwrap();
        assert!(!spec.args.iter().any(|a| a == "--use_prompt_extend"));

        let mut cfg = config();
        cfg.prompt_extend.model = Some("qwen-plus".to_string());
        let spec = GenerationCommand::new(cfg, req).build(&[0]).unwrap();
        assert!(spec.args.iter().any(|a| a == "--use_prompt_extend"));
        assert_eq!(value_after(&spec.args, "--prompt_extend_model"), Some("qwen-plus"));
        assert_eq!(value_after(&spec.args, "--prompt_extend_method"), Some("openai"));
    }

    #[test]
    fn rejects_unsupported_size_and_empty_prompt() {
        let mut req = t2v();
        req.size = Some("1024*704".to_string());
        assert!(GenerationCommand::new(config(), req).validate().is_err());

        let req = GenerationRequest::new(TaskKind::T2vA14B, "   ");
        assert!(GenerationCommand::new(config(), req).validate().is_err());
    }

    #[test]
    fn image_tasks_need_an_existing_image() {
        let req = GenerationRequest::new(TaskKind::I2vA14B, "wind in the trees");
        assert!(GenerationCommand::new(config(), req.clone()).validate().is_err());

        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("ref.png");
        std::fs::write(&image, b"png").unwrap();
        let mut req = req;
        req.image = Some(image.clone());
        let spec = GenerationCommand::new(config(), req).build(&[0]).unwrap();
        assert_eq!(
            value_after(&spec.args, "--image"),
            Some(image.display().to_string().as_str())
        );

        let mut missing = GenerationRequest::new(TaskKind::I2vA14B, "x");
        missing.image = Some(dir.path().join("nope.png"));
        assert!(GenerationCommand::new(config(), missing).validate().is_err());
    }

    #[test]
    fn animate_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("ref.png");
        std::fs::write(&image, b"png").unwrap();

        let mut req = GenerationRequest::new(TaskKind::Animate14B, "dance");
        req.image = Some(image);
        req.animate.src_root_path = Some(dir.path().join("processed"));
        req.animate.replace = true;
        req.animate.use_relighting_lora = true;
        let spec = GenerationCommand::new(config(), req).build(&[0]).unwrap();
        assert_eq!(value_after(&spec.args, "--refert_num"), Some("5"));
        assert!(spec.args.iter().any(|a| a == "--replace_flag"));
        assert!(spec.args.iter().any(|a| a == "--use_relighting_lora"));
        assert_eq!(value_after(&spec.args, "--frame_num"), Some("77"));
    }

    #[test]
    fn animate_needs_inputs_or_preprocess_step() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("ref.png");
        std::fs::write(&image, b"png").unwrap();
        let mut req = GenerationRequest::new(TaskKind::Animate14B, "dance");
        req.image = Some(image);
        assert!(GenerationCommand::new(config(), req.clone()).validate().is_err());

        req.animate.preprocess = Some(PreprocessOptions::new(dir.path().join("missing.mp4")));
        let err = GenerationCommand::new(config(), req.clone()).validate().unwrap_err();
        assert!(err.to_string().contains("missing.mp4"), "{}", err);

        let video = dir.path().join("dance.mp4");
        std::fs::write(&video, b"mp4").unwrap();
        req.animate.preprocess = Some(PreprocessOptions::new(&video));
        assert!(GenerationCommand::new(config(), req).validate().is_ok());
    }

    #[test]
    fn preprocess_step_feeds_generation() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("ref.png");
        let video = dir.path().join("swap.mp4");
        std::fs::write(&image, b"png").unwrap();
        std::fs::write(&video, b"mp4").unwrap();
        let mut req = GenerationRequest::new(TaskKind::Animate14B, "swap");
        req.image = Some(image.clone());
        req.output_file = Some(PathBuf::from("/out/animate/clip.mp4"));
        req.animate.replace = true;
        req.animate.preprocess = Some(PreprocessOptions::new(&video));

        let command = GenerationCommand::new(config(), req);
        let pre = command.preprocess_command().unwrap().unwrap();
        assert_eq!(pre.save_path(), Path::new("/out/animate/clip_processed"));
        assert_eq!(pre.mode(), PreprocessMode::Replacement);
        let pre_spec = pre.build(&[1]).unwrap();
        assert_eq!(
            value_after(&pre_spec.args, "--refer_path"),
            Some(image.display().to_string().as_str())
        );

        let spec = command.build(&[0]).unwrap();
        assert_eq!(
            value_after(&spec.args, "--src_root_path"),
            Some("/out/animate/clip_processed")
        );

        // Without a preprocess step there is nothing to run first
        assert!(GenerationCommand::new(config(), t2v())
            .preprocess_command()
            .unwrap()
            .is_none());
    }

    #[test]
    fn preprocess_rejected_for_other_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("dance.mp4");
        std::fs::write(&video, b"mp4").unwrap();
        let mut req = t2v();
        req.animate.preprocess = Some(PreprocessOptions::new(&video));
        let err = GenerationCommand::new(config(), req).validate().unwrap_err();
        assert!(err.to_string().contains("no preprocessing step"), "{}", err);
    }

    #[test]
    fn speech_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("face.png");
        std::fs::write(&image, b"png").unwrap();

        let mut req = GenerationRequest::new(TaskKind::S2v14B, "talking");
        req.image = Some(image);
        req.speech.enable_tts = true;
        req.speech.tts_text = Some("hello there".to_string());
        req.speech.num_clip = Some(2);
        let spec = GenerationCommand::new(config(), req).build(&[0]).unwrap();
        assert_eq!(value_after(&spec.args, "--infer_frames"), Some("80"));
        assert_eq!(value_after(&spec.args, "--tts_text"), Some("hello there"));
        assert_eq!(value_after(&spec.args, "--num_clip"), Some("2"));
        assert_eq!(value_after(&spec.args, "--size"), Some("1024*704"));
        assert!(value_after(&spec.args, "--frame_num").is_none());
    }

    #[test]
    fn default_output_lands_under_task_dir() {
        let cmd = GenerationCommand::new(config(), GenerationRequest::new(TaskKind::Ti2v5B, "x"));
        assert!(cmd.output_file().starts_with("/out/ti2v-5B"));
        assert_eq!(cmd.output_file().extension().and_then(|e| e.to_str()), Some("mp4"));
    }
}
