//! Typed message payloads and their JSON wire forms.
//!
//! Queues carry opaque JSON strings; these are the shapes consumers parse
//! them into. Wire field names are fixed contracts with the producers (web
//! front-end, cold store) — do not rename them.
//!
//! A body that fails to parse is non-recoverable: redelivery cannot add a
//! missing field, so consumers drop-and-log instead of retrying.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use frostflow_core::{ArchiveId, JobId, JobStatus, RetrievalId, UserId};

/// Submitted by the front-end once the input blob is uploaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionMessage {
    pub job_id: JobId,
    pub user_id: UserId,
    pub input_file_name: String,
    #[serde(rename = "s3_inputs_bucket")]
    pub inputs_bucket: String,
    #[serde(rename = "s3_key_input_file")]
    pub input_key: String,
    pub submit_time: DateTime<Utc>,
    pub job_status: JobStatus,
}

/// Published by the completion reporter, once per downstream interest
/// (result-ready for the notifier, archive-eligible for the archiver).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionNotice {
    pub user_id: UserId,
    pub input_file_name: String,
    pub job_id: JobId,
    /// Hot-tier key of the uploaded result blob.
    pub results_file: String,
}

/// Published when a user's plan changes to one that keeps results hot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeEvent {
    pub user_id: UserId,
}

/// Emitted by the cold store once a requested retrieval is ready to read.
///
/// Carries the retrieval job, not the owning job — the thaw worker derives
/// the job id from the description (the original hot-tier key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalReady {
    #[serde(rename = "JobId")]
    pub retrieval_id: RetrievalId,
    #[serde(rename = "ArchiveId")]
    pub archive_id: ArchiveId,
    #[serde(rename = "JobDescription")]
    pub description: String,
}
