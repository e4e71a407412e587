use std::time::Duration;

use crate::generation::command::GenerationCommand;
use crate::generation::preprocess::DEFAULT_PREPROCESS_TIMEOUT;
use crate::scheduler::{JobCoordinator, JobResult, ResourceRequest};
use crate::worker::CancelSignal;

/// Run one generation job end to end through the shared queue.
///
/// A preprocessing step, when the request carries one, goes through the
/// queue first on a single GPU under the same job id. Generation is only
/// queued once it succeeds, so a failed or cancelled step never holds the
/// GPUs generation would need. The reported elapsed time covers both.
pub async fn run_generation<C>(
    coordinator: &JobCoordinator,
    job_id: &str,
    command: &GenerationCommand,
    request: ResourceRequest,
    cancel: &C,
    timeout: Duration,
) -> JobResult
where
    C: CancelSignal + ?Sized,
{
    let task_label = command.request().task.to_string();

    let preprocess = match command.preprocess_command() {
        Ok(preprocess) => preprocess,
        Err(e) => return JobResult::failed(e.to_string(), 0.0),
    };
    let mut preprocess_secs = 0.0;
    if let Some(preprocess) = preprocess {
        if let Err(e) = tokio::fs::create_dir_all(preprocess.save_path()).await {
            return JobResult::failed(format!("Preprocessing error: {}", e), 0.0);
        }
        tracing::info!(
            job_id,
            mode = ?preprocess.mode(),
            save_path = %preprocess.save_path().display(),
            "Preprocessing animate inputs"
        );
        let result = coordinator
            .submit_and_run(
                job_id,
                &task_label,
                ResourceRequest::Count(1),
                &preprocess,
                cancel,
                DEFAULT_PREPROCESS_TIMEOUT.min(timeout),
            )
            .await;
        if !result.is_success() {
            tracing::warn!(job_id, status = %result.status, "Preprocessing did not complete");
            return JobResult::new(
                result.status,
                format!("Preprocessing failed:\n{}", result.message),
                result.elapsed_seconds,
            );
        }
        preprocess_secs = result.elapsed_seconds;
    }

    let result = coordinator
        .submit_and_run(job_id, &task_label, request, command, cancel, timeout)
        .await;
    JobResult::new(
        result.status,
        result.message,
        result.elapsed_seconds + preprocess_secs,
    )
}
