use serde::{Deserialize, Serialize};

use crate::scheduler::resource::{AssignmentRecord, ResourceId};

/// A waiting job as seen by a polling UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedJob {
    pub job_id: String,
    pub task_label: String,
    pub position: usize,
    pub requested_gpus: u32,
}

/// Point-in-time view of the queue and the GPU pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub total_resources: u32,
    pub free_resources: Vec<ResourceId>,
    pub running: Vec<AssignmentRecord>,
    pub queued: Vec<QueuedJob>,
}

impl QueueSnapshot {
    pub fn is_idle(&self) -> bool {
        self.running.is_empty() && self.queued.is_empty()
    }

    /// Human-readable summary, `None` when nothing is running or waiting.
    ///
    /// e.g. `"1 generation running (t2v-A14B), 2 in queue"`.
    pub fn status_message(&self) -> Option<String> {
        if self.is_idle() {
            return None;
        }

        let mut parts = Vec::new();
        if !self.running.is_empty() {
            let labels: Vec<&str> = self
                .running
                .iter()
                .map(|r| r.task_label.as_str())
                .collect();
            let noun = if self.running.len() == 1 {
                "generation"
            } else {
                "generations"
            };
            parts.push(format!(
                "{} {} running ({})",
                self.running.len(),
                noun,
                labels.join(", ")
            ));
        }
        if !self.queued.is_empty() {
            parts.push(format!("{} in queue", self.queued.len()));
        }
        Some(parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(job_id: &str, task: &str, ids: Vec<ResourceId>) -> AssignmentRecord {
        AssignmentRecord {
            job_id: job_id.to_string(),
            resource_ids: ids,
            task_label: task.to_string(),
            started_at: Utc::now(),
        }
    }

    fn queued(job_id: &str, position: usize) -> QueuedJob {
        QueuedJob {
            job_id: job_id.to_string(),
            task_label: "i2v-A14B".to_string(),
            position,
            requested_gpus: 1,
        }
    }

    #[test]
    fn idle_has_no_message() {
        let snapshot = QueueSnapshot {
            total_resources: 2,
            free_resources: vec![0, 1],
            running: vec![],
            queued: vec![],
        };
        assert_eq!(snapshot.status_message(), None);
    }

    #[test]
    fn running_and_queued_message() {
        let snapshot = QueueSnapshot {
            total_resources: 1,
            free_resources: vec![],
            running: vec![record("a", "t2v-A14B", vec![0])],
            queued: vec![queued("b", 0), queued("c", 1)],
        };
        assert_eq!(
            snapshot.status_message().as_deref(),
            Some("1 generation running (t2v-A14B), 2 in queue")
        );
    }

    #[test]
    fn several_running_without_queue() {
        let snapshot = QueueSnapshot {
            total_resources: 2,
            free_resources: vec![],
            running: vec![
                record("a", "t2v-A14B", vec![0]),
                record("b", "s2v-14B", vec![1]),
            ],
            queued: vec![],
        };
        assert_eq!(
            snapshot.status_message().as_deref(),
            Some("2 generations running (t2v-A14B, s2v-14B)")
        );
    }

    #[test]
    fn queue_only_message() {
        let snapshot = QueueSnapshot {
            total_resources: 1,
            free_resources: vec![0],
            running: vec![],
            queued: vec![queued("b", 0)],
        };
        assert_eq!(snapshot.status_message().as_deref(), Some("1 in queue"));
    }
}
