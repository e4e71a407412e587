use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of one exclusive-use GPU.
pub type ResourceId = u32;

/// How many GPUs a job needs, or exactly which ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceRequest {
    Count(u32),
    Ids(BTreeSet<ResourceId>),
}

impl ResourceRequest {
    pub fn ids(ids: impl IntoIterator<Item = ResourceId>) -> Self {
        ResourceRequest::Ids(ids.into_iter().collect())
    }

    /// Number of GPUs this request will hold once granted.
    pub fn count(&self) -> u32 {
        match self {
            ResourceRequest::Count(n) => *n,
            ResourceRequest::Ids(ids) => ids.len() as u32,
        }
    }

    /// A request that no pool can ever satisfy.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

impl std::fmt::Display for ResourceRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceRequest::Count(n) => write!(f, "{} gpu(s)", n),
            ResourceRequest::Ids(ids) => write!(f, "gpus {:?}", ids),
        }
    }
}

/// Binds a set of GPUs to one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub job_id: String,
    pub resource_ids: Vec<ResourceId>,
    pub task_label: String,
    pub started_at: DateTime<Utc>,
}

/// GPU-to-job assignment table.
///
/// The registry itself is not synchronized; callers share it behind a single
/// mutex so each operation is one critical section (see `JobCoordinator`).
#[derive(Debug)]
pub struct ResourceRegistry {
    total: u32,
    assignments: HashMap<String, AssignmentRecord>,
    owners: BTreeMap<ResourceId, String>,
}

impl ResourceRegistry {
    pub fn new(total: u32) -> Self {
        Self {
            total,
            assignments: HashMap::new(),
            owners: BTreeMap::new(),
        }
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// Try to assign GPUs to `job_id`. Returns the granted ids in ascending
    /// order, or `None` if the request cannot be satisfied right now.
    ///
    /// Explicit requests succeed only if every id is free. Count requests take
    /// the lowest free ids.
    pub fn try_acquire(
        &mut self,
        job_id: &str,
        task_label: &str,
        request: &ResourceRequest,
    ) -> Option<Vec<ResourceId>> {
        if self.assignments.contains_key(job_id) {
            tracing::warn!(job_id, "Job already holds GPUs, refusing second acquisition");
            return None;
        }

        let granted: Vec<ResourceId> = match request {
            ResourceRequest::Ids(ids) => {
                if ids.is_empty() || ids.iter().any(|id| *id >= self.total) {
                    return None;
                }
                if ids.iter().any(|id| self.owners.contains_key(id)) {
                    return None;
                }
                ids.iter().copied().collect()
            }
            ResourceRequest::Count(count) => {
                let count = *count as usize;
                if count == 0 || count > self.total as usize {
                    return None;
                }
                let free = self.free_resource_ids(self.total);
                if free.len() < count {
                    return None;
                }
                free.into_iter().take(count).collect()
            }
        };

        for id in &granted {
            self.owners.insert(*id, job_id.to_string());
        }
        self.assignments.insert(
            job_id.to_string(),
            AssignmentRecord {
                job_id: job_id.to_string(),
                resource_ids: granted.clone(),
                task_label: task_label.to_string(),
                started_at: Utc::now(),
            },
        );
        tracing::debug!(job_id, gpus = ?granted, "GPUs assigned");
        Some(granted)
    }

    /// Free every GPU held by `job_id`. Releasing an unknown job is a no-op.
    pub fn release(&mut self, job_id: &str) -> Option<AssignmentRecord> {
        let record = self.assignments.remove(job_id)?;
        for id in &record.resource_ids {
            self.owners.remove(id);
        }
        tracing::debug!(job_id, gpus = ?record.resource_ids, "GPUs released");
        Some(record)
    }

    /// Ids in `[0, total)` that nobody holds, ascending.
    pub fn free_resource_ids(&self, total: u32) -> Vec<ResourceId> {
        (0..total).filter(|id| !self.owners.contains_key(id)).collect()
    }

    /// Free ids across the whole pool.
    pub fn free_ids(&self) -> Vec<ResourceId> {
        self.free_resource_ids(self.total)
    }

    pub fn is_assigned(&self, resource_id: ResourceId) -> bool {
        self.owners.contains_key(&resource_id)
    }

    pub fn owner_of(&self, resource_id: ResourceId) -> Option<&str> {
        self.owners.get(&resource_id).map(String::as_str)
    }

    pub fn assignment(&self, job_id: &str) -> Option<&AssignmentRecord> {
        self.assignments.get(job_id)
    }

    /// Active assignments, oldest first.
    pub fn assignments(&self) -> Vec<AssignmentRecord> {
        let mut records: Vec<AssignmentRecord> = self.assignments.values().cloned().collect();
        records.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.resource_ids.cmp(&b.resource_ids))
        });
        records
    }

    pub fn is_idle(&self) -> bool {
        self.assignments.is_empty()
    }
}
