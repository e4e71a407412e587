use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::config::OrchestratorConfig;
use crate::scheduler::queue::JobQueue;
use crate::scheduler::resource::{AssignmentRecord, ResourceId, ResourceRegistry, ResourceRequest};
use crate::scheduler::status::{QueueSnapshot, QueuedJob};
use crate::scheduler::strategy::GpuStrategy;
use crate::scheduler::JobResult;
use crate::worker::{CancelSignal, CommandBuilder, ProcessRunner};

/// Critical sections never await, so a std mutex is enough. A panic while
/// holding the lock leaves the tables consistent (every mutation is a single
/// insert or remove), so poisoning is ignored.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Single entry point for running a generation job on the shared GPU pool.
///
/// Cheap to clone; every clone shares the same queue and registry, so one
/// coordinator is constructed at startup and handed to every session.
#[derive(Debug, Clone)]
pub struct JobCoordinator {
    queue: Arc<Mutex<JobQueue>>,
    registry: Arc<Mutex<ResourceRegistry>>,
    runner: ProcessRunner,
    queue_poll_interval: Duration,
}

impl JobCoordinator {
    pub fn new(total_resources: u32, config: &OrchestratorConfig) -> Self {
        Self {
            queue: Arc::new(Mutex::new(JobQueue::with_capacity(config.max_queued_jobs))),
            registry: Arc::new(Mutex::new(ResourceRegistry::new(total_resources))),
            runner: ProcessRunner::from_config(config),
            queue_poll_interval: config.queue_poll_interval(),
        }
    }

    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    pub fn total_resources(&self) -> u32 {
        lock(&self.registry).total()
    }

    /// Queue the job, wait for its turn and its GPUs, run it, and release the
    /// GPUs. Always produces a result; nothing is propagated as an error.
    ///
    /// The GPUs are released on every exit path, including the returned
    /// future being dropped mid-wait or mid-run.
    pub async fn submit_and_run<B, C>(
        &self,
        job_id: &str,
        task_label: &str,
        request: ResourceRequest,
        builder: &B,
        cancel: &C,
        timeout: Duration,
    ) -> JobResult
    where
        B: CommandBuilder + ?Sized,
        C: CancelSignal + ?Sized,
    {
        if request.is_empty() {
            tracing::warn!(job_id, "Rejecting job that requests no GPUs");
            return JobResult::failed("Invalid resource request: at least one GPU is required", 0.0);
        }
        let queued = lock(&self.queue).submit(job_id, task_label, request.clone());
        if let Err(e) = queued {
            tracing::warn!(job_id, error = %e, "Job submission rejected");
            return JobResult::failed(e.to_string(), 0.0);
        }
        let _reservation = Reservation {
            coordinator: self,
            job_id,
        };
        tracing::info!(job_id, task = task_label, request = %request, "Job submitted");

        let submitted = Instant::now();
        let resource_ids = match self.wait_for_turn(job_id, task_label, &request, cancel).await {
            Some(ids) => ids,
            None => return JobResult::cancelled("cancelled while queued", 0.0),
        };
        tracing::info!(
            job_id,
            gpus = ?resource_ids,
            waited_secs = submitted.elapsed().as_secs_f64(),
            "GPUs acquired"
        );

        let spec = match builder.build(&resource_ids) {
            Ok(spec) => spec,
            Err(e) => {
                tracing::error!(job_id, error = %e, "Command construction failed");
                return JobResult::failed(e.to_string(), 0.0);
            }
        };

        let result = self
            .runner
            .run(job_id, &spec, &resource_ids, cancel, timeout)
            .await;
        tracing::info!(
            job_id,
            status = %result.status,
            elapsed_secs = result.elapsed_seconds,
            "Job finished"
        );
        result
    }

    /// Poll until this job is at the head and its GPUs are granted. `None`
    /// means it was cancelled while waiting.
    async fn wait_for_turn<C>(
        &self,
        job_id: &str,
        task_label: &str,
        request: &ResourceRequest,
        cancel: &C,
    ) -> Option<Vec<ResourceId>>
    where
        C: CancelSignal + ?Sized,
    {
        let mut last_position = None;
        let mut warned_oversized = false;
        loop {
            if cancel.is_cancelled() {
                lock(&self.queue).cancel(job_id);
                tracing::info!(job_id, "Job cancelled while queued");
                return None;
            }

            if let Some(ids) = self.try_acquire_as_head(job_id, task_label, request) {
                return Some(ids);
            }

            let position = self.position(job_id);
            if position != last_position {
                tracing::info!(job_id, position = ?position, "Waiting in queue");
                last_position = position;
            }
            if !warned_oversized && request.count() > self.total_resources() {
                tracing::warn!(
                    job_id,
                    requested = request.count(),
                    total = self.total_resources(),
                    "Request exceeds the GPU pool and will wait until cancelled"
                );
                warned_oversized = true;
            }

            tokio::time::sleep(self.queue_poll_interval).await;
        }
    }

    /// Only the head may take GPUs; it leaves the queue right after.
    fn try_acquire_as_head(
        &self,
        job_id: &str,
        task_label: &str,
        request: &ResourceRequest,
    ) -> Option<Vec<ResourceId>> {
        if !lock(&self.queue).is_head(job_id) {
            return None;
        }
        let ids = lock(&self.registry).try_acquire(job_id, task_label, request)?;
        if lock(&self.queue).pop_if_head(job_id) {
            Some(ids)
        } else {
            // Dequeued between the checks; hand the GPUs straight back.
            lock(&self.registry).release(job_id);
            None
        }
    }

    /// 0-based queue position, `None` if the job is not waiting.
    pub fn position(&self, job_id: &str) -> Option<usize> {
        lock(&self.queue).position(job_id)
    }

    pub fn assignment(&self, job_id: &str) -> Option<AssignmentRecord> {
        lock(&self.registry).assignment(job_id).cloned()
    }

    pub fn free_resource_ids(&self) -> Vec<ResourceId> {
        lock(&self.registry).free_ids()
    }

    /// Concrete request for `requested` GPUs under `strategy`, given the pool
    /// as it is right now. The count always splits `num_heads` evenly.
    pub fn resolve_request(
        &self,
        strategy: GpuStrategy,
        requested: u32,
        num_heads: u32,
    ) -> ResourceRequest {
        let registry = lock(&self.registry);
        strategy.resolve(requested, &registry.free_ids(), registry.total(), num_heads)
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let queued: Vec<QueuedJob> = lock(&self.queue)
            .entries()
            .enumerate()
            .map(|(position, entry)| QueuedJob {
                job_id: entry.job_id.clone(),
                task_label: entry.task_label.clone(),
                position,
                requested_gpus: entry.request.count(),
            })
            .collect();
        let registry = lock(&self.registry);
        QueueSnapshot {
            total_resources: registry.total(),
            free_resources: registry.free_ids(),
            running: registry.assignments(),
            queued,
        }
    }
}

/// Dequeues and releases on drop, whichever way `submit_and_run` exits.
struct Reservation<'a> {
    coordinator: &'a JobCoordinator,
    job_id: &'a str,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        lock(&self.coordinator.queue).cancel(self.job_id);
        if let Some(record) = lock(&self.coordinator.registry).release(self.job_id) {
            tracing::info!(job_id = self.job_id, gpus = ?record.resource_ids, "GPUs released");
        }
    }
}
