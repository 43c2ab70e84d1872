//! Job record store.
//!
//! Write discipline: every mutation here is the narrowest correct write.
//! Transitions that can race (dispatch, restore initiation) are
//! compare-and-swap and report a lost race as a *normal outcome*, not an
//! error. Writes that are structurally single-writer (completion, archival)
//! are unconditional but still refuse to break record invariants.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use frostflow_core::{
    ArchiveId, CompletionUpdate, JobId, JobRecord, JobStatus, UserId,
};

/// Result of a conditional status write.
///
/// Losing the race is expected under concurrent dispatch; callers treat
/// `PreconditionFailed` as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum CasOutcome {
    Applied,
    PreconditionFailed { actual: JobStatus },
}

impl CasOutcome {
    pub fn applied(self) -> bool {
        matches!(self, CasOutcome::Applied)
    }
}

/// Result of the conditional archive-to-restore marker swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum RestoreOutcome {
    /// `archive_id` removed, `restore_marker` set.
    Begun,
    /// A retrieval is already pending for this job; nothing to do.
    AlreadyRestoring,
    /// The job has no cold copy; nothing to restore.
    NotArchived,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RecordStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("record invariant refused write: {0}")]
    InvariantViolation(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Key-value table of job records with conditional updates.
pub trait RecordStore: Send + Sync {
    /// Insert the record created at submission. A job id is only ever
    /// created once; re-creation is an error.
    fn create(&self, record: JobRecord) -> Result<(), RecordStoreError>;

    fn get(&self, job_id: JobId) -> Result<Option<JobRecord>, RecordStoreError>;

    /// Secondary-index scan: all jobs owned by `user_id`.
    fn list_by_user(&self, user_id: UserId) -> Result<Vec<JobRecord>, RecordStoreError>;

    /// Compare-and-swap on `status`: applies `next` only if the stored
    /// status equals `expected`.
    fn advance_status(
        &self,
        job_id: JobId,
        expected: JobStatus,
        next: JobStatus,
    ) -> Result<CasOutcome, RecordStoreError>;

    /// Unconditional completion write: locations, `Completed`, completion
    /// time. Single-writer by construction — the external job invokes the
    /// completion reporter at most once.
    fn record_completion(
        &self,
        job_id: JobId,
        update: CompletionUpdate,
    ) -> Result<(), RecordStoreError>;

    /// Record the cold-tier handle after a successful archival.
    /// Unconditional (one archive-eligible notice per job), but refuses to
    /// mark an archived job that is mid-restore.
    fn set_archive_id(
        &self,
        job_id: JobId,
        archive_id: ArchiveId,
    ) -> Result<(), RecordStoreError>;

    /// Conditionally swap `archive_id` for `restore_marker`. The two fields
    /// are never simultaneously present; the swap is atomic.
    fn begin_restore(
        &self,
        job_id: JobId,
        note: &str,
    ) -> Result<RestoreOutcome, RecordStoreError>;

    /// Drop the restore marker once the result is back on the hot tier.
    /// Clearing an already-clear marker is a no-op (thaw redelivery).
    fn clear_restore_marker(&self, job_id: JobId) -> Result<(), RecordStoreError>;
}

impl<S> RecordStore for Arc<S>
where
    S: RecordStore + ?Sized,
{
    fn create(&self, record: JobRecord) -> Result<(), RecordStoreError> {
        (**self).create(record)
    }

    fn get(&self, job_id: JobId) -> Result<Option<JobRecord>, RecordStoreError> {
        (**self).get(job_id)
    }

    fn list_by_user(&self, user_id: UserId) -> Result<Vec<JobRecord>, RecordStoreError> {
        (**self).list_by_user(user_id)
    }

    fn advance_status(
        &self,
        job_id: JobId,
        expected: JobStatus,
        next: JobStatus,
    ) -> Result<CasOutcome, RecordStoreError> {
        (**self).advance_status(job_id, expected, next)
    }

    fn record_completion(
        &self,
        job_id: JobId,
        update: CompletionUpdate,
    ) -> Result<(), RecordStoreError> {
        (**self).record_completion(job_id, update)
    }

    fn set_archive_id(
        &self,
        job_id: JobId,
        archive_id: ArchiveId,
    ) -> Result<(), RecordStoreError> {
        (**self).set_archive_id(job_id, archive_id)
    }

    fn begin_restore(
        &self,
        job_id: JobId,
        note: &str,
    ) -> Result<RestoreOutcome, RecordStoreError> {
        (**self).begin_restore(job_id, note)
    }

    fn clear_restore_marker(&self, job_id: JobId) -> Result<(), RecordStoreError> {
        (**self).clear_restore_marker(job_id)
    }
}

/// In-memory record store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<JobId, JobRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl RecordStore for InMemoryRecordStore {
    fn create(&self, record: JobRecord) -> Result<(), RecordStoreError> {
        let mut records = self.records.write().unwrap();
        if records.contains_key(&record.job_id) {
            return Err(RecordStoreError::AlreadyExists(record.job_id));
        }
        record
            .check_invariants()
            .map_err(|e| RecordStoreError::InvariantViolation(e.to_string()))?;
        records.insert(record.job_id, record);
        Ok(())
    }

    fn get(&self, job_id: JobId) -> Result<Option<JobRecord>, RecordStoreError> {
        let records = self.records.read().unwrap();
        Ok(records.get(&job_id).cloned())
    }

    fn list_by_user(&self, user_id: UserId) -> Result<Vec<JobRecord>, RecordStoreError> {
        let records = self.records.read().unwrap();
        let mut result: Vec<_> = records
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        result.sort_by_key(|r| r.submit_time);
        Ok(result)
    }

    fn advance_status(
        &self,
        job_id: JobId,
        expected: JobStatus,
        next: JobStatus,
    ) -> Result<CasOutcome, RecordStoreError> {
        let mut records = self.records.write().unwrap();
        let record = records
            .get_mut(&job_id)
            .ok_or(RecordStoreError::NotFound(job_id))?;

        if record.status != expected {
            return Ok(CasOutcome::PreconditionFailed {
                actual: record.status,
            });
        }
        if !record.status.can_advance_to(next) {
            return Err(RecordStoreError::InvariantViolation(format!(
                "job {job_id}: status may not move {} -> {next}",
                record.status
            )));
        }

        record.status = next;
        Ok(CasOutcome::Applied)
    }

    fn record_completion(
        &self,
        job_id: JobId,
        update: CompletionUpdate,
    ) -> Result<(), RecordStoreError> {
        let mut records = self.records.write().unwrap();
        let record = records
            .get_mut(&job_id)
            .ok_or(RecordStoreError::NotFound(job_id))?;

        if !record.status.can_advance_to(JobStatus::Completed) {
            return Err(RecordStoreError::InvariantViolation(format!(
                "job {job_id}: already {}",
                record.status
            )));
        }

        record.status = JobStatus::Completed;
        record.result_location = Some(update.result_location);
        record.log_location = Some(update.log_location);
        record.complete_time = Some(update.complete_time);
        Ok(())
    }

    fn set_archive_id(
        &self,
        job_id: JobId,
        archive_id: ArchiveId,
    ) -> Result<(), RecordStoreError> {
        let mut records = self.records.write().unwrap();
        let record = records
            .get_mut(&job_id)
            .ok_or(RecordStoreError::NotFound(job_id))?;

        if record.restore_marker.is_some() {
            return Err(RecordStoreError::InvariantViolation(format!(
                "job {job_id}: cannot archive while a restore is pending"
            )));
        }

        record.archive_id = Some(archive_id);
        Ok(())
    }

    fn begin_restore(
        &self,
        job_id: JobId,
        note: &str,
    ) -> Result<RestoreOutcome, RecordStoreError> {
        let mut records = self.records.write().unwrap();
        let record = records
            .get_mut(&job_id)
            .ok_or(RecordStoreError::NotFound(job_id))?;

        if record.restore_marker.is_some() {
            return Ok(RestoreOutcome::AlreadyRestoring);
        }
        if record.archive_id.is_none() {
            return Ok(RestoreOutcome::NotArchived);
        }

        record.archive_id = None;
        record.restore_marker = Some(note.to_string());
        Ok(RestoreOutcome::Begun)
    }

    fn clear_restore_marker(&self, job_id: JobId) -> Result<(), RecordStoreError> {
        let mut records = self.records.write().unwrap();
        let record = records
            .get_mut(&job_id)
            .ok_or(RecordStoreError::NotFound(job_id))?;
        record.restore_marker = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use frostflow_core::BlobLocation;

    fn submitted(user_id: UserId) -> JobRecord {
        JobRecord::submitted(
            JobId::new(),
            user_id,
            "sample.vcf",
            BlobLocation::new("inputs", "u/j~sample.vcf"),
            Utc::now(),
        )
    }

    fn completion(job_id: JobId, user_id: UserId) -> CompletionUpdate {
        CompletionUpdate {
            result_location: BlobLocation::new(
                "results",
                format!("jobs/{user_id}/{job_id}~sample.annot.vcf"),
            ),
            log_location: BlobLocation::new(
                "results",
                format!("jobs/{user_id}/{job_id}~sample.vcf.count.log"),
            ),
            complete_time: Utc::now(),
        }
    }

    #[test]
    fn create_is_once_only() {
        let store = InMemoryRecordStore::new();
        let record = submitted(UserId::new());
        store.create(record.clone()).unwrap();
        assert!(matches!(
            store.create(record),
            Err(RecordStoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn cas_applies_exactly_once() {
        let store = InMemoryRecordStore::new();
        let record = submitted(UserId::new());
        let job_id = record.job_id;
        store.create(record).unwrap();

        let first = store
            .advance_status(job_id, JobStatus::Pending, JobStatus::Running)
            .unwrap();
        assert!(first.applied());

        // Second dispatcher loses the race and observes the actual status.
        let second = store
            .advance_status(job_id, JobStatus::Pending, JobStatus::Running)
            .unwrap();
        assert_eq!(
            second,
            CasOutcome::PreconditionFailed {
                actual: JobStatus::Running
            }
        );
    }

    #[test]
    fn status_never_regresses() {
        let store = InMemoryRecordStore::new();
        let record = submitted(UserId::new());
        let job_id = record.job_id;
        store.create(record).unwrap();

        assert!(store
            .advance_status(job_id, JobStatus::Pending, JobStatus::Running)
            .unwrap()
            .applied());

        let err = store
            .advance_status(job_id, JobStatus::Running, JobStatus::Pending)
            .unwrap_err();
        assert!(matches!(err, RecordStoreError::InvariantViolation(_)));
    }

    #[test]
    fn completion_is_unconditional_but_single_shot() {
        let store = InMemoryRecordStore::new();
        let user_id = UserId::new();
        let record = submitted(user_id);
        let job_id = record.job_id;
        store.create(record).unwrap();

        store
            .record_completion(job_id, completion(job_id, user_id))
            .unwrap();

        let record = store.get(job_id).unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert!(record.result_location.is_some());
        assert!(record.complete_time.is_some());
        record.check_invariants().unwrap();

        // A second completion would regress nothing but is still refused.
        assert!(store
            .record_completion(job_id, completion(job_id, user_id))
            .is_err());
    }

    #[test]
    fn archive_and_restore_markers_are_mutually_exclusive() {
        let store = InMemoryRecordStore::new();
        let user_id = UserId::new();
        let record = submitted(user_id);
        let job_id = record.job_id;
        store.create(record).unwrap();

        store.set_archive_id(job_id, ArchiveId::new("a1")).unwrap();

        let outcome = store.begin_restore(job_id, "restore in progress").unwrap();
        assert_eq!(outcome, RestoreOutcome::Begun);

        let record = store.get(job_id).unwrap().unwrap();
        assert!(record.archive_id.is_none());
        assert_eq!(record.restore_marker.as_deref(), Some("restore in progress"));
        record.check_invariants().unwrap();

        // Archiving mid-restore is refused.
        assert!(matches!(
            store.set_archive_id(job_id, ArchiveId::new("a2")),
            Err(RecordStoreError::InvariantViolation(_))
        ));
    }

    #[test]
    fn begin_restore_is_idempotent_under_redelivery() {
        let store = InMemoryRecordStore::new();
        let record = submitted(UserId::new());
        let job_id = record.job_id;
        store.create(record).unwrap();
        store.set_archive_id(job_id, ArchiveId::new("a1")).unwrap();

        assert_eq!(
            store.begin_restore(job_id, "pending").unwrap(),
            RestoreOutcome::Begun
        );
        assert_eq!(
            store.begin_restore(job_id, "pending").unwrap(),
            RestoreOutcome::AlreadyRestoring
        );
    }

    #[test]
    fn begin_restore_without_archive_is_a_no_op() {
        let store = InMemoryRecordStore::new();
        let record = submitted(UserId::new());
        let job_id = record.job_id;
        store.create(record).unwrap();

        assert_eq!(
            store.begin_restore(job_id, "pending").unwrap(),
            RestoreOutcome::NotArchived
        );
    }

    #[test]
    fn clear_restore_marker_tolerates_redelivery() {
        let store = InMemoryRecordStore::new();
        let record = submitted(UserId::new());
        let job_id = record.job_id;
        store.create(record).unwrap();
        store.set_archive_id(job_id, ArchiveId::new("a1")).unwrap();
        let _ = store.begin_restore(job_id, "pending").unwrap();

        store.clear_restore_marker(job_id).unwrap();
        store.clear_restore_marker(job_id).unwrap();

        let record = store.get(job_id).unwrap().unwrap();
        assert!(record.restore_marker.is_none());
    }

    #[test]
    fn list_by_user_scans_the_secondary_index() {
        let store = InMemoryRecordStore::new();
        let owner = UserId::new();
        let other = UserId::new();

        store.create(submitted(owner)).unwrap();
        store.create(submitted(owner)).unwrap();
        store.create(submitted(other)).unwrap();

        let jobs = store.list_by_user(owner).unwrap();
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|r| r.user_id == owner));
    }
}
