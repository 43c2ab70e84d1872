//! Job status state machine.
//!
//! The status is deliberately small: archival and restoration are **not**
//! statuses, they are independent markers on the record (`archive_id`,
//! `restore_marker`). Status only tracks the processing lifecycle and only
//! ever moves forward.

use serde::{Deserialize, Serialize};

/// Processing lifecycle of a job.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Submitted, waiting for a dispatcher.
    Pending,
    /// Dispatched; the external processing job has been launched.
    Running,
    /// Results persisted.
    Completed,
}

impl JobStatus {
    /// Total order used for monotonicity checks.
    pub fn rank(self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Running => 1,
            JobStatus::Completed => 2,
        }
    }

    /// Whether a transition to `next` moves the lifecycle forward.
    ///
    /// Pure and total — the record store uses this to refuse regressions,
    /// tests use it directly.
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        next.rank() > self.rank()
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed)
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
        };
        f.write_str(s)
    }
}
