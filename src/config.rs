use std::path::{Path, PathBuf};
use std::time::Duration;

/// Timing and capacity knobs for the queue and the process runner.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Interval between checks while a process runs
    pub poll_interval_ms: u64,
    /// Interval between acquisition attempts while queued
    pub queue_poll_interval_ms: u64,
    /// How long a process gets to exit after SIGTERM before SIGKILL
    pub grace_period_ms: u64,
    /// Timeout applied when a caller does not supply one
    pub default_timeout_secs: u64,
    /// Maximum number of waiting submissions
    pub max_queued_jobs: usize,
    /// Finished jobs the dashboard remembers; the oldest are forgotten first
    pub max_finished_jobs: usize,
    /// Override the discovered GPU count (e.g. for CPU-only testing)
    pub total_gpus: Option<u32>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            queue_poll_interval_ms: 500,
            grace_period_ms: 10_000,
            default_timeout_secs: 7_200,
            max_queued_jobs: 1_000,
            max_finished_jobs: 500,
            total_gpus: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_queue_poll_interval(mut self, interval: Duration) -> Self {
        self.queue_poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period_ms = grace.as_millis() as u64;
        self
    }

    pub fn with_max_finished_jobs(mut self, max: usize) -> Self {
        self.max_finished_jobs = max;
        self
    }

    pub fn with_total_gpus(mut self, total: u32) -> Self {
        self.total_gpus = Some(total);
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn queue_poll_interval(&self) -> Duration {
        Duration::from_millis(self.queue_poll_interval_ms.max(1))
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }
}

/// Optional LLM prompt extension forwarded to the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptExtendConfig {
    pub method: String,
    pub target_lang: String,
    /// Extension is disabled when no model is configured.
    pub model: Option<String>,
}

impl Default for PromptExtendConfig {
    fn default() -> Self {
        Self {
            method: "openai".to_string(),
            target_lang: "en".to_string(),
            model: None,
        }
    }
}

impl PromptExtendConfig {
    pub fn is_enabled(&self) -> bool {
        self.model.as_deref().is_some_and(|m| !m.is_empty())
    }
}

/// Where the Wan2.2 checkout, model weights and outputs live.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Root of the Wan2.2 repository (contains generate.py)
    pub repo_root: PathBuf,
    /// Directory holding the model checkpoint folders
    pub models_path: PathBuf,
    /// Where generated videos are written
    pub output_root: PathBuf,
    /// Interpreter for single-GPU runs
    pub python: String,
    /// Distributed launcher for multi-GPU runs
    pub launcher: String,
    pub prompt_extend: PromptExtendConfig,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from("./Wan2.2"),
            models_path: PathBuf::from("/opt/huggingface"),
            output_root: PathBuf::from("./output"),
            python: "python3".to_string(),
            launcher: "torchrun".to_string(),
            prompt_extend: PromptExtendConfig::default(),
        }
    }
}

impl GenerationConfig {
    /// Resolve relative repository and output paths against `base`.
    pub fn resolved_against(mut self, base: &Path) -> Self {
        if self.repo_root.is_relative() {
            self.repo_root = base.join(&self.repo_root);
        }
        if self.output_root.is_relative() {
            self.output_root = base.join(&self.output_root);
        }
        self
    }

    pub fn generate_script(&self) -> PathBuf {
        self.repo_root.join("generate.py")
    }

    /// Pose, face and mask extraction for `animate-14B`.
    pub fn preprocess_script(&self) -> PathBuf {
        self.repo_root
            .join("wan")
            .join("modules")
            .join("animate")
            .join("preprocess")
            .join("preprocess_data.py")
    }

    pub fn checkpoint_dir(&self, dir_name: &str) -> PathBuf {
        self.models_path.join(dir_name)
    }

    /// `PYTHONPATH` for child processes: the Wan2.2 checkout first, then
    /// whatever the orchestrator inherited.
    pub fn python_path(&self) -> String {
        let repo = self.repo_root.display().to_string();
        match std::env::var("PYTHONPATH") {
            Ok(existing) if !existing.is_empty() => format!("{}:{}", repo, existing),
            _ => repo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orchestrator_config_default() {
        let cfg = OrchestratorConfig::default();
        assert_eq!(cfg.poll_interval(), Duration::from_millis(500));
        assert_eq!(cfg.queue_poll_interval(), Duration::from_millis(500));
        assert_eq!(cfg.grace_period(), Duration::from_secs(10));
        assert_eq!(cfg.default_timeout(), Duration::from_secs(7200));
        assert!(cfg.total_gpus.is_none());
    }

    #[test]
    fn orchestrator_config_builders() {
        let cfg = OrchestratorConfig::default()
            .with_poll_interval(Duration::from_millis(50))
            .with_queue_poll_interval(Duration::from_millis(20))
            .with_grace_period(Duration::from_secs(1))
            .with_total_gpus(4);
        assert_eq!(cfg.poll_interval_ms, 50);
        assert_eq!(cfg.queue_poll_interval_ms, 20);
        assert_eq!(cfg.grace_period_ms, 1000);
        assert_eq!(cfg.total_gpus, Some(4));
    }

    #[test]
    fn zero_poll_interval_is_clamped() {
        let cfg = OrchestratorConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(cfg.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn prompt_extend_disabled_without_model() {
        let mut cfg = PromptExtendConfig::default();
        assert!(!cfg.is_enabled());
        cfg.model = Some(String::new());
        assert!(!cfg.is_enabled());
        cfg.model = Some("qwen-plus".to_string());
        assert!(cfg.is_enabled());
    }

    #[test]
    fn generation_config_resolves_relative_paths() {
        let cfg = GenerationConfig::default().resolved_against(Path::new("/srv/frontend"));
        assert_eq!(cfg.repo_root, PathBuf::from("/srv/frontend/Wan2.2"));
        assert_eq!(cfg.output_root, PathBuf::from("/srv/frontend/output"));
        assert_eq!(cfg.models_path, PathBuf::from("/opt/huggingface"));
        assert_eq!(
            cfg.generate_script(),
            PathBuf::from("/srv/frontend/Wan2.2/generate.py")
        );
    }

    #[test]
    fn generation_config_keeps_absolute_paths() {
        let cfg = GenerationConfig {
            repo_root: PathBuf::from("/opt/wan"),
            ..Default::default()
        }
        .resolved_against(Path::new("/srv"));
        assert_eq!(cfg.repo_root, PathBuf::from("/opt/wan"));
        assert_eq!(
            cfg.checkpoint_dir("Wan2.2-T2V-A14B"),
            PathBuf::from("/opt/huggingface/Wan2.2-T2V-A14B")
        );
    }
}
