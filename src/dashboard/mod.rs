use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower_http::cors::{Any, CorsLayer};

use crate::config::{GenerationConfig, OrchestratorConfig};
use crate::generation::{run_generation, GenerationCommand, GenerationRequest};
use crate::scheduler::{
    GpuStrategy, JobCoordinator, JobResult, QueueSnapshot, ResourceId, ResourceRequest,
};

/// A job submitted through the API.
struct TrackedJob {
    task_label: String,
    model: &'static str,
    strategy: GpuStrategy,
    prompt_preview: String,
    request: ResourceRequest,
    output_file: String,
    submitted_at: DateTime<Utc>,
    cancel: CancellationToken,
    result: Option<JobResult>,
}

/// Jobs known to the API. Finished jobs are kept up to `max_finished`,
/// dropping the earliest to finish first.
struct JobTable {
    jobs: HashMap<String, TrackedJob>,
    finished: VecDeque<String>,
    max_finished: usize,
}

impl JobTable {
    fn new(max_finished: usize) -> Self {
        Self {
            jobs: HashMap::new(),
            finished: VecDeque::new(),
            max_finished,
        }
    }

    fn insert(&mut self, job_id: String, job: TrackedJob) {
        self.jobs.insert(job_id, job);
    }

    fn get(&self, job_id: &str) -> Option<&TrackedJob> {
        self.jobs.get(job_id)
    }

    fn iter(&self) -> impl Iterator<Item = (&String, &TrackedJob)> {
        self.jobs.iter()
    }

    /// Record the result and forget the oldest finished jobs over the cap.
    fn finish(&mut self, job_id: &str, result: JobResult) {
        let Some(job) = self.jobs.get_mut(job_id) else {
            return;
        };
        job.result = Some(result);
        self.finished.push_back(job_id.to_string());
        while self.finished.len() > self.max_finished {
            if let Some(oldest) = self.finished.pop_front() {
                self.jobs.remove(&oldest);
                tracing::debug!(job_id = %oldest, "Forgetting finished job");
            }
        }
    }
}

#[derive(Clone)]
pub struct DashboardState {
    pub coordinator: JobCoordinator,
    pub generation: Arc<GenerationConfig>,
    pub config: Arc<OrchestratorConfig>,
    jobs: Arc<RwLock<JobTable>>,
    tasks: TaskTracker,
}

impl DashboardState {
    pub fn new(
        coordinator: JobCoordinator,
        generation: GenerationConfig,
        config: OrchestratorConfig,
    ) -> Self {
        let jobs = JobTable::new(config.max_finished_jobs);
        Self {
            coordinator,
            generation: Arc::new(generation),
            config: Arc::new(config),
            jobs: Arc::new(RwLock::new(jobs)),
            tasks: TaskTracker::new(),
        }
    }

    /// Cancel every job that has not finished yet.
    pub async fn cancel_all(&self) {
        for (_, job) in self.jobs.read().await.iter() {
            if job.result.is_none() {
                job.cancel.cancel();
            }
        }
    }

    /// Cancel outstanding jobs and wait until each one has stopped its
    /// process and released its GPUs. No new jobs are accepted afterwards.
    pub async fn shutdown(&self) {
        self.tasks.close();
        self.cancel_all().await;
        self.tasks.wait().await;
        tracing::info!("All jobs stopped");
    }

    /// Jobs still in flight.
    pub fn active_jobs(&self) -> usize {
        self.tasks.len()
    }
}

#[derive(Serialize)]
struct StatusResponse {
    message: Option<String>,
    #[serde(flatten)]
    snapshot: QueueSnapshot,
}

#[derive(Deserialize)]
struct SubmitJobRequest {
    #[serde(flatten)]
    generation: GenerationRequest,
    #[serde(default = "default_gpus")]
    gpus: u32,
    #[serde(default)]
    strategy: GpuStrategy,
    #[serde(default)]
    timeout_seconds: Option<u64>,
}

fn default_gpus() -> u32 {
    1
}

#[derive(Serialize)]
struct SubmitJobResponse {
    success: bool,
    job_id: Option<String>,
    error: Option<String>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum JobState {
    Queued,
    Running,
    Finished,
}

#[derive(Serialize)]
struct JobResponse {
    job_id: String,
    task: String,
    model: &'static str,
    strategy: &'static str,
    prompt: String,
    state: JobState,
    position: Option<usize>,
    requested: ResourceRequest,
    gpus: Option<Vec<ResourceId>>,
    output_file: String,
    submitted_at: DateTime<Utc>,
    result: Option<JobResult>,
}

#[derive(Serialize)]
struct CancelResponse {
    job_id: String,
    cancelled: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// All API routes, without binding a listener.
pub fn router(state: DashboardState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/status", get(status_handler))
        .route("/api/jobs", get(list_jobs_handler).post(submit_job_handler))
        .route("/api/jobs/:id", get(job_handler))
        .route("/api/jobs/:id/cancel", post(cancel_job_handler))
        .layer(cors)
        .with_state(state)
}

/// Serve the API until `shutdown` fires, then cancel outstanding jobs.
pub async fn run_dashboard(
    addr: SocketAddr,
    state: DashboardState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let app = router(state.clone());

    tracing::info!(addr = %addr, "Starting dashboard server");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!(
        active_jobs = state.active_jobs(),
        "Dashboard stopped, cancelling outstanding jobs"
    );
    state.shutdown().await;
    Ok(())
}

async fn status_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    let snapshot = state.coordinator.snapshot();
    Json(StatusResponse {
        message: snapshot.status_message(),
        snapshot,
    })
}

async fn submit_job_handler(
    State(state): State<DashboardState>,
    Json(payload): Json<SubmitJobRequest>,
) -> impl IntoResponse {
    if state.tasks.is_closed() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(SubmitJobResponse {
                success: false,
                job_id: None,
                error: Some("server is shutting down".to_string()),
            }),
        );
    }

    let command = GenerationCommand::new((*state.generation).clone(), payload.generation);
    let validated = command
        .validate()
        .and_then(|_| command.validate_gpu_count(payload.gpus));
    if let Err(e) = validated {
        return (
            StatusCode::BAD_REQUEST,
            Json(SubmitJobResponse {
                success: false,
                job_id: None,
                error: Some(e.to_string()),
            }),
        );
    }

    let job_id = uuid::Uuid::new_v4().to_string();
    let request = state
        .coordinator
        .resolve_request(
            payload.strategy,
            payload.gpus,
            command.request().task.spec().num_heads,
        );
    let task_label = command.request().task.to_string();
    let timeout = payload
        .timeout_seconds
        .map(Duration::from_secs)
        .unwrap_or_else(|| state.config.default_timeout());
    let cancel = CancellationToken::new();

    state.jobs.write().await.insert(
        job_id.clone(),
        TrackedJob {
            task_label: task_label.clone(),
            model: command.request().task.spec().name,
            strategy: payload.strategy,
            prompt_preview: command.request().prompt_preview(),
            request: request.clone(),
            output_file: command.output_file().display().to_string(),
            submitted_at: Utc::now(),
            cancel: cancel.clone(),
            result: None,
        },
    );
    tracing::info!(
        job_id = %job_id,
        task = %task_label,
        strategy = %payload.strategy,
        request = %request,
        "Generation submitted"
    );

    let jobs = state.jobs.clone();
    let coordinator = state.coordinator.clone();
    let id = job_id.clone();
    state.tasks.spawn(async move {
        let result = run_generation(&coordinator, &id, &command, request, &cancel, timeout).await;
        jobs.write().await.finish(&id, result);
    });

    (
        StatusCode::OK,
        Json(SubmitJobResponse {
            success: true,
            job_id: Some(job_id),
            error: None,
        }),
    )
}

fn job_response(state: &DashboardState, job_id: &str, job: &TrackedJob) -> JobResponse {
    let assignment = state.coordinator.assignment(job_id);
    let job_state = if job.result.is_some() {
        JobState::Finished
    } else if assignment.is_some() {
        JobState::Running
    } else {
        JobState::Queued
    };
    JobResponse {
        job_id: job_id.to_string(),
        task: job.task_label.clone(),
        model: job.model,
        strategy: job.strategy.label(),
        prompt: job.prompt_preview.clone(),
        state: job_state,
        position: state.coordinator.position(job_id),
        requested: job.request.clone(),
        gpus: assignment.map(|a| a.resource_ids),
        output_file: job.output_file.clone(),
        submitted_at: job.submitted_at,
        result: job.result.clone(),
    }
}

async fn list_jobs_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    let jobs = state.jobs.read().await;
    let mut list: Vec<JobResponse> = jobs
        .iter()
        .map(|(id, job)| job_response(&state, id, job))
        .collect();
    list.sort_by_key(|job| job.submitted_at);
    Json(list)
}

async fn job_handler(
    State(state): State<DashboardState>,
    Path(job_id): Path<String>,
) -> axum::response::Response {
    let jobs = state.jobs.read().await;
    match jobs.get(&job_id) {
        Some(job) => Json(job_response(&state, &job_id, job)).into_response(),
        None => not_found(&job_id),
    }
}

async fn cancel_job_handler(
    State(state): State<DashboardState>,
    Path(job_id): Path<String>,
) -> axum::response::Response {
    let jobs = state.jobs.read().await;
    let Some(job) = jobs.get(&job_id) else {
        return not_found(&job_id);
    };
    let cancelled = job.result.is_none();
    if cancelled {
        tracing::info!(job_id = %job_id, "Cancellation requested");
        job.cancel.cancel();
    }
    Json(CancelResponse { job_id, cancelled }).into_response()
}

fn not_found(job_id: &str) -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: crate::error::OrchestratorError::JobNotFound(job_id.to_string()).to_string(),
        }),
    )
        .into_response()
}
