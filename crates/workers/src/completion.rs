//! Completion reporter: invoked by the finished processing job itself.
//!
//! This is the one role that is not a queue consumer — it runs co-located
//! with the external job and gets handed the job's scratch directory
//! directly. It uploads the result and log blobs, records completion, and
//! announces it once per downstream interest (result-ready, archive-
//! eligible).
//!
//! The record update is all-or-nothing with the uploads: if either upload
//! fails the record stays RUNNING and the scratch directory stays put, so
//! the caller can invoke the reporter again. A COMPLETED record always
//! points at blobs that exist.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, warn};

use frostflow_core::{location, BlobLocation, CompletionUpdate, JobId, UserId};
use frostflow_messaging::{CompletionNotice, NotificationBus, QueueError};
use frostflow_storage::{BlobStore, BlobStoreError, RecordStore, RecordStoreError};

#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub results_bucket: String,
    /// First segment of every result key (`{prefix}/{user}/{job}~{file}`).
    pub key_prefix: String,
    /// Extension that marks the result file in the scratch directory.
    pub result_extension: String,
    /// Extension that marks the processing log.
    pub log_extension: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            results_bucket: "results".to_string(),
            key_prefix: "jobs".to_string(),
            result_extension: ".annot.vcf".to_string(),
            log_extension: ".count.log".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("no file matching *{extension} in {dir:?}")]
    OutputMissing { extension: String, dir: PathBuf },
    #[error("reading {path:?}: {source}")]
    ReadOutput {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Blob(#[from] BlobStoreError),
    #[error(transparent)]
    Records(#[from] RecordStoreError),
    #[error(transparent)]
    Publish(#[from] QueueError),
    #[error("encoding completion notice: {0}")]
    Encode(#[from] serde_json::Error),
}

pub struct CompletionReporter<R, B, N> {
    records: R,
    blobs: B,
    result_topic: N,
    archive_topic: N,
    config: CompletionConfig,
}

impl<R, B, N> CompletionReporter<R, B, N>
where
    R: RecordStore,
    B: BlobStore,
    N: NotificationBus,
{
    pub fn new(
        records: R,
        blobs: B,
        result_topic: N,
        archive_topic: N,
        config: CompletionConfig,
    ) -> Self {
        Self {
            records,
            blobs,
            result_topic,
            archive_topic,
            config,
        }
    }

    /// Persist a finished job's outputs and announce completion.
    ///
    /// Callback contract with the external job: `(scratch_dir, job_id,
    /// user_id)`, invoked once when processing ends.
    pub fn report(
        &self,
        scratch_dir: &Path,
        job_id: JobId,
        user_id: UserId,
    ) -> Result<CompletionNotice, CompletionError> {
        let record = self
            .records
            .get(job_id)?
            .ok_or(RecordStoreError::NotFound(job_id))?;

        let result_path = self.find_output(scratch_dir, &self.config.result_extension)?;
        let log_path = self.find_output(scratch_dir, &self.config.log_extension)?;

        let result_location = self.upload(&result_path, user_id, job_id)?;
        let log_location = self.upload(&log_path, user_id, job_id)?;

        // Both uploads landed; only now does the record change.
        self.records.record_completion(
            job_id,
            CompletionUpdate {
                result_location: result_location.clone(),
                log_location,
                complete_time: Utc::now(),
            },
        )?;

        // Best-effort cleanup; a leftover scratch directory is an
        // operational nuisance, not a correctness problem.
        if let Err(e) = fs::remove_dir_all(scratch_dir) {
            warn!(job_id = %job_id, error = %e, "failed to remove scratch directory");
        }

        let notice = CompletionNotice {
            user_id,
            input_file_name: record.input_file_name,
            job_id,
            results_file: result_location.key.clone(),
        };
        let body = serde_json::to_string(&notice)?;
        self.result_topic.publish(&body)?;
        self.archive_topic.publish(&body)?;

        info!(job_id = %job_id, result = %result_location, "job completed");
        Ok(notice)
    }

    fn find_output(&self, dir: &Path, extension: &str) -> Result<PathBuf, CompletionError> {
        let entries = fs::read_dir(dir).map_err(|source| CompletionError::ReadOutput {
            path: dir.to_path_buf(),
            source,
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(extension))
            {
                return Ok(path);
            }
        }

        Err(CompletionError::OutputMissing {
            extension: extension.to_string(),
            dir: dir.to_path_buf(),
        })
    }

    fn upload(
        &self,
        path: &Path,
        user_id: UserId,
        job_id: JobId,
    ) -> Result<BlobLocation, CompletionError> {
        let bytes = fs::read(path).map_err(|source| CompletionError::ReadOutput {
            path: path.to_path_buf(),
            source,
        })?;

        let key = location::result_key(&self.config.key_prefix, user_id, job_id, &file_name(path));
        let loc = BlobLocation::new(&self.config.results_bucket, key);
        self.blobs.put(&loc, bytes)?;
        Ok(loc)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
