use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};
use crate::scheduler::resource::ResourceRequest;

const DEFAULT_MAX_JOBS: usize = 1_000;

/// A submission waiting for GPUs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub job_id: String,
    pub task_label: String,
    pub request: ResourceRequest,
    pub submitted_at: DateTime<Utc>,
}

/// Ordered waiting list. Only the head entry may try to take GPUs, which
/// keeps service strictly first-in first-out.
#[derive(Debug)]
pub struct JobQueue {
    entries: VecDeque<QueueEntry>,
    members: HashSet<String>,
    max_jobs: usize,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_JOBS)
    }

    pub fn with_capacity(max_jobs: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            members: HashSet::new(),
            max_jobs,
        }
    }

    /// Append a submission to the tail.
    pub fn submit(&mut self, job_id: &str, task_label: &str, request: ResourceRequest) -> Result<()> {
        if self.members.contains(job_id) {
            return Err(OrchestratorError::InvalidRequest(format!(
                "job {} is already queued",
                job_id
            )));
        }
        if self.entries.len() >= self.max_jobs {
            return Err(OrchestratorError::InvalidRequest(format!(
                "queue is at capacity ({} jobs)",
                self.max_jobs
            )));
        }
        self.members.insert(job_id.to_string());
        self.entries.push_back(QueueEntry {
            job_id: job_id.to_string(),
            task_label: task_label.to_string(),
            request,
            submitted_at: Utc::now(),
        });
        Ok(())
    }

    /// 0-based position, or `None` once the job is running, cancelled, or unknown.
    pub fn position(&self, job_id: &str) -> Option<usize> {
        if !self.members.contains(job_id) {
            return None;
        }
        self.entries.iter().position(|e| e.job_id == job_id)
    }

    /// Drop a job that has not acquired GPUs yet. Returns true if it was queued.
    pub fn cancel(&mut self, job_id: &str) -> bool {
        if !self.members.remove(job_id) {
            return false;
        }
        self.entries.retain(|e| e.job_id != job_id);
        true
    }

    pub fn is_head(&self, job_id: &str) -> bool {
        self.entries
            .front()
            .map(|e| e.job_id == job_id)
            .unwrap_or(false)
    }

    /// Remove `job_id` only if it is still at the head.
    pub fn pop_if_head(&mut self, job_id: &str) -> bool {
        if !self.is_head(job_id) {
            return false;
        }
        if let Some(entry) = self.entries.pop_front() {
            self.members.remove(&entry.job_id);
        }
        true
    }

    pub fn head(&self) -> Option<&QueueEntry> {
        self.entries.front()
    }

    pub fn get(&self, job_id: &str) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| e.job_id == job_id)
    }

    /// Waiting entries in service order.
    pub fn entries(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.max_jobs
    }
}
