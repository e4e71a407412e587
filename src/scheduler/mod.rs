pub mod coordinator;
pub mod job;
pub mod queue;
pub mod resource;
pub mod status;
pub mod strategy;

pub use coordinator::JobCoordinator;
pub use job::{JobResult, JobStatus};
pub use queue::{JobQueue, QueueEntry};
pub use resource::{AssignmentRecord, ResourceId, ResourceRegistry, ResourceRequest};
pub use status::{QueueSnapshot, QueuedJob};
pub use strategy::GpuStrategy;
