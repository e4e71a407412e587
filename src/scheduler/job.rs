use serde::{Deserialize, Serialize};

/// Terminal outcome of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Success,
    Cancelled,
    Failed,
    TimedOut,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Success => write!(f, "success"),
            JobStatus::Cancelled => write!(f, "cancelled"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::TimedOut => write!(f, "timed_out"),
        }
    }
}

/// Exactly one of these is produced per submitted job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub status: JobStatus,
    pub message: String,
    pub elapsed_seconds: f64,
}

impl JobResult {
    pub fn new(status: JobStatus, message: impl Into<String>, elapsed_seconds: f64) -> Self {
        Self {
            status,
            message: message.into(),
            elapsed_seconds: elapsed_seconds.max(0.0),
        }
    }

    pub fn success(message: impl Into<String>, elapsed_seconds: f64) -> Self {
        Self::new(JobStatus::Success, message, elapsed_seconds)
    }

    pub fn cancelled(message: impl Into<String>, elapsed_seconds: f64) -> Self {
        Self::new(JobStatus::Cancelled, message, elapsed_seconds)
    }

    pub fn failed(message: impl Into<String>, elapsed_seconds: f64) -> Self {
        Self::new(JobStatus::Failed, message, elapsed_seconds)
    }

    pub fn timed_out(message: impl Into<String>, elapsed_seconds: f64) -> Self {
        Self::new(JobStatus::TimedOut, message, elapsed_seconds)
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display_matches_serde_names() {
        for status in [
            JobStatus::Success,
            JobStatus::Cancelled,
            JobStatus::Failed,
            JobStatus::TimedOut,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status));
        }
    }

    #[test]
    fn elapsed_is_never_negative() {
        let result = JobResult::failed("boom", -3.0);
        assert_eq!(result.elapsed_seconds, 0.0);
        assert!(!result.is_success());
    }
}
