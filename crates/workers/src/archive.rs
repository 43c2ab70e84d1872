//! Archive worker: migrates completed results to the cold tier.
//!
//! Consumes archive-eligible completion notices. Premium accounts keep
//! their results hot, so the notice is acknowledged as a no-op. For free
//! accounts the migration is copy-then-delete: the hot copy is only removed
//! after the cold write succeeds, which is exactly what makes a redelivered
//! notice safe to repeat — the retry re-reads a hot copy that is still
//! there. A record that already carries an archive id short-circuits to an
//! ack, so a crash after the final record write cannot archive twice.

use tracing::{debug, info};

use frostflow_core::BlobLocation;
use frostflow_messaging::CompletionNotice;
use frostflow_storage::{BlobStore, BlobStoreError, ColdStore, RecordStore, RecordStoreError};

use crate::collaborators::ProfileService;
use crate::runtime::{HandlerOutcome, MessageHandler};

pub struct ArchiveWorker<R, B, C, P> {
    records: R,
    blobs: B,
    cold: C,
    profiles: P,
    results_bucket: String,
}

impl<R, B, C, P> ArchiveWorker<R, B, C, P>
where
    R: RecordStore,
    B: BlobStore,
    C: ColdStore,
    P: ProfileService,
{
    pub fn new(
        records: R,
        blobs: B,
        cold: C,
        profiles: P,
        results_bucket: impl Into<String>,
    ) -> Self {
        Self {
            records,
            blobs,
            cold,
            profiles,
            results_bucket: results_bucket.into(),
        }
    }

    fn archive(&self, notice: &CompletionNotice) -> HandlerOutcome {
        let record = match self.records.get(notice.job_id) {
            Ok(Some(record)) => record,
            // The record is created at submission; not seeing it yet is a
            // consistency lag, not bad data.
            Ok(None) => return HandlerOutcome::Retry(format!("no record for {}", notice.job_id)),
            Err(e) => return HandlerOutcome::Retry(format!("record fetch failed: {e}")),
        };

        if record.is_archived() {
            debug!(job_id = %notice.job_id, "already archived; redelivery is a no-op");
            return HandlerOutcome::Ack;
        }

        let profile = match self.profiles.get_profile(notice.user_id) {
            Ok(profile) => profile,
            Err(e) => return HandlerOutcome::Retry(format!("profile lookup failed: {e}")),
        };

        if !profile.plan.archives_results() {
            debug!(job_id = %notice.job_id, "plan keeps results hot; nothing to archive");
            return HandlerOutcome::Ack;
        }

        let hot = BlobLocation::new(&self.results_bucket, &notice.results_file);
        let bytes = match self.blobs.get(&hot) {
            Ok(bytes) => bytes,
            Err(e) => return HandlerOutcome::Retry(format!("result fetch failed: {e}")),
        };

        let archive_id = match self.cold.archive(bytes) {
            Ok(id) => id,
            Err(e) => return HandlerOutcome::Retry(format!("cold write failed: {e}")),
        };

        // Cold copy exists from here on; losing the race to delete or to
        // record the id duplicates data, never loses it.
        match self.blobs.delete(&hot) {
            Ok(()) | Err(BlobStoreError::NotFound(_)) => {}
            Err(e) => return HandlerOutcome::Retry(format!("hot delete failed: {e}")),
        }

        match self.records.set_archive_id(notice.job_id, archive_id.clone()) {
            Ok(()) => {}
            // A restore began in between; the record refuses the marker.
            // Permanent for this notice, so do not spin on it.
            Err(RecordStoreError::InvariantViolation(e)) => {
                return HandlerOutcome::Drop(format!("archive id refused: {e}"));
            }
            Err(e) => return HandlerOutcome::Retry(format!("recording archive id failed: {e}")),
        }

        info!(job_id = %notice.job_id, archive_id = %archive_id, "result migrated to cold tier");
        HandlerOutcome::Ack
    }
}

impl<R, B, C, P> MessageHandler for ArchiveWorker<R, B, C, P>
where
    R: RecordStore + Send,
    B: BlobStore + Send,
    C: ColdStore + Send,
    P: ProfileService + Send,
{
    fn handle(&mut self, body: &str) -> HandlerOutcome {
        let notice: CompletionNotice = match serde_json::from_str(body) {
            Ok(notice) => notice,
            Err(e) => return HandlerOutcome::Drop(format!("bad completion notice: {e}")),
        };
        self.archive(&notice)
    }
}
