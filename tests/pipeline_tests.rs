use std::path::Path;
use std::time::Duration;

use wan_orchestrator::config::{GenerationConfig, OrchestratorConfig};
use wan_orchestrator::generation::{
    run_generation, GenerationCommand, GenerationRequest, PreprocessOptions, TaskKind,
};
use wan_orchestrator::scheduler::{JobCoordinator, JobStatus, ResourceRequest};
use wan_orchestrator::worker::NeverCancel;

const TIMEOUT: Duration = Duration::from_secs(30);

/// Wan2.2 checkout whose two entry points are shell scripts.
struct FakeRepo {
    dir: tempfile::TempDir,
}

impl FakeRepo {
    fn new(preprocess: &str, generate: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let preprocess_dir = dir.path().join("wan/modules/animate/preprocess");
        std::fs::create_dir_all(&preprocess_dir).unwrap();
        std::fs::write(preprocess_dir.join("preprocess_data.py"), preprocess).unwrap();
        std::fs::write(dir.path().join("generate.py"), generate).unwrap();
        std::fs::write(dir.path().join("ref.png"), b"png").unwrap();
        std::fs::write(dir.path().join("dance.mp4"), b"mp4").unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn log(&self) -> Vec<String> {
        std::fs::read_to_string(self.path().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn config(&self) -> GenerationConfig {
        GenerationConfig {
            repo_root: self.path().to_path_buf(),
            models_path: self.path().join("models"),
            output_root: self.path().join("output"),
            python: "sh".to_string(),
            ..Default::default()
        }
    }

    fn animate_request(&self, replace: bool) -> GenerationRequest {
        let mut request = GenerationRequest::new(TaskKind::Animate14B, "dance like nobody watches");
        request.image = Some(self.path().join("ref.png"));
        request.output_file = Some(self.path().join("output/clip.mp4"));
        request.animate.replace = replace;
        request.animate.preprocess = Some(PreprocessOptions::new(self.path().join("dance.mp4")));
        request
    }
}

fn test_coordinator(total: u32) -> JobCoordinator {
    let config = OrchestratorConfig::default()
        .with_poll_interval(Duration::from_millis(20))
        .with_queue_poll_interval(Duration::from_millis(10))
        .with_grace_period(Duration::from_millis(300));
    JobCoordinator::new(total, &config)
}

#[tokio::test]
async fn test_preprocess_runs_before_generation() {
    let repo = FakeRepo::new(
        "echo \"preprocess $CUDA_VISIBLE_DEVICES $(basename \"$(pwd)\") $*\" >> ../../../../calls.log",
        "echo \"generate $CUDA_VISIBLE_DEVICES\" >> calls.log; echo done",
    );
    let coordinator = test_coordinator(2);
    let command = GenerationCommand::new(repo.config(), repo.animate_request(true));
    command.validate().unwrap();

    let result = run_generation(
        &coordinator,
        "animate-job",
        &command,
        ResourceRequest::Count(1),
        &NeverCancel,
        TIMEOUT,
    )
    .await;

    assert_eq!(result.status, JobStatus::Success, "{}", result.message);
    assert_eq!(result.message, "done\n");
    let calls = repo.log();
    assert_eq!(calls.len(), 2, "{:?}", calls);
    // One GPU, run from the preprocess directory, replacement flags
    assert!(calls[0].starts_with("preprocess 0 preprocess "), "{}", calls[0]);
    assert!(calls[0].contains("--replace_flag"));
    assert!(calls[0].contains("clip_processed"));
    assert_eq!(calls[1], "generate 0");
    assert!(repo.path().join("output/clip_processed").is_dir());
    assert!(coordinator.snapshot().is_idle());
}

#[tokio::test]
async fn test_failed_preprocess_skips_generation() {
    let repo = FakeRepo::new(
        "echo 'no person detected' >&2; exit 2",
        "echo generate >> calls.log",
    );
    let coordinator = test_coordinator(1);
    let command = GenerationCommand::new(repo.config(), repo.animate_request(false));

    let result = run_generation(
        &coordinator,
        "animate-fail",
        &command,
        ResourceRequest::Count(1),
        &NeverCancel,
        TIMEOUT,
    )
    .await;

    assert_eq!(result.status, JobStatus::Failed);
    assert!(result.message.starts_with("Preprocessing failed:"), "{}", result.message);
    assert!(result.message.contains("no person detected"));
    assert!(repo.log().is_empty());
    assert_eq!(coordinator.free_resource_ids(), vec![0]);
}

#[tokio::test]
async fn test_requests_without_preprocess_go_straight_to_generation() {
    let repo = FakeRepo::new("exit 1", "echo \"$CUDA_VISIBLE_DEVICES\"");
    let coordinator = test_coordinator(1);
    let command = GenerationCommand::new(
        repo.config(),
        GenerationRequest::new(TaskKind::Ti2v5B, "waves"),
    );

    let result = run_generation(
        &coordinator,
        "plain",
        &command,
        ResourceRequest::Count(1),
        &NeverCancel,
        TIMEOUT,
    )
    .await;

    assert_eq!(result.status, JobStatus::Success);
    assert_eq!(result.message, "0\n");
}
