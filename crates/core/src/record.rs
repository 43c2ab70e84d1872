//! The job record: one row per submitted job.
//!
//! The record is created once at submission and only updated afterwards:
//! conceptually immutable history (ids, input, submit time) plus a small
//! mutable set (status, result pointers, archival/restoration markers).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{ArchiveId, JobId, UserId};
use crate::location::BlobLocation;
use crate::status::JobStatus;

/// Persistent state of one job, keyed by `job_id` with a secondary index
/// on `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub user_id: UserId,
    pub input_file_name: String,
    pub input_location: BlobLocation,
    pub status: JobStatus,
    pub submit_time: DateTime<Utc>,

    /// Set by the completion reporter, together with `status = Completed`.
    pub result_location: Option<BlobLocation>,
    pub log_location: Option<BlobLocation>,
    pub complete_time: Option<DateTime<Utc>>,

    /// Present iff the result has been migrated to the cold tier.
    pub archive_id: Option<ArchiveId>,
    /// Present iff a retrieval has been requested and not yet completed.
    /// Human-readable, shown to the user while the result is unavailable.
    pub restore_marker: Option<String>,
}

impl JobRecord {
    /// Record as created at submission time: `Pending`, no results, no
    /// archival markers.
    pub fn submitted(
        job_id: JobId,
        user_id: UserId,
        input_file_name: impl Into<String>,
        input_location: BlobLocation,
        submit_time: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id,
            user_id,
            input_file_name: input_file_name.into(),
            input_location,
            status: JobStatus::Pending,
            submit_time,
            result_location: None,
            log_location: None,
            complete_time: None,
            archive_id: None,
            restore_marker: None,
        }
    }

    pub fn is_archived(&self) -> bool {
        self.archive_id.is_some()
    }

    pub fn is_restoring(&self) -> bool {
        self.restore_marker.is_some()
    }

    /// Check the record's structural invariants.
    ///
    /// The store's mutators keep these true; this is the single place the
    /// rules are written down (and the hook tests use).
    pub fn check_invariants(&self) -> DomainResult<()> {
        if self.archive_id.is_some() && self.restore_marker.is_some() {
            return Err(DomainError::invariant(format!(
                "job {}: archive_id and restore_marker both present",
                self.job_id
            )));
        }
        if self.status == JobStatus::Completed && self.complete_time.is_none() {
            return Err(DomainError::invariant(format!(
                "job {}: completed without a completion time",
                self.job_id
            )));
        }
        Ok(())
    }
}

/// Fields written by the completion reporter in one unconditional update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionUpdate {
    pub result_location: BlobLocation,
    pub log_location: BlobLocation,
    pub complete_time: DateTime<Utc>,
}
