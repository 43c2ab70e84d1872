//! Thaw worker: finished retrieval → result back on the hot tier.
//!
//! Consumes the cold store's retrieval-ready notifications. Each step gates
//! the next: read the retrieval output, upload it to the original hot-tier
//! key, delete the cold artifact, then clear the restore marker on the
//! record (the owning job is re-derived from the key — the notification
//! does not carry it). Everything up to and including the cold delete is
//! idempotent, so redelivery after a crash replays those steps harmlessly.
//! A marker-clear failure after the delete is logged and accepted as a
//! temporary inconsistency rather than retried — retrying would re-run
//! nothing useful, the bytes are already hot.

use tracing::{error, info};

use frostflow_core::{location, BlobLocation};
use frostflow_messaging::RetrievalReady;
use frostflow_storage::{BlobStore, ColdStore, RecordStore};

use crate::runtime::{HandlerOutcome, MessageHandler};

pub struct ThawWorker<R, B, C> {
    records: R,
    blobs: B,
    cold: C,
    results_bucket: String,
}

impl<R, B, C> ThawWorker<R, B, C>
where
    R: RecordStore,
    B: BlobStore,
    C: ColdStore,
{
    pub fn new(records: R, blobs: B, cold: C, results_bucket: impl Into<String>) -> Self {
        Self {
            records,
            blobs,
            cold,
            results_bucket: results_bucket.into(),
        }
    }

    fn thaw(&self, msg: &RetrievalReady) -> HandlerOutcome {
        // (a) fetch the retrieved bytes
        let bytes = match self.cold.retrieval_output(msg.retrieval_id) {
            Ok(bytes) => bytes,
            Err(e) => return HandlerOutcome::Retry(format!("retrieval output: {e}")),
        };

        // (b) back to the hot tier at the original key
        let hot = BlobLocation::new(&self.results_bucket, &msg.description);
        if let Err(e) = self.blobs.put(&hot, bytes) {
            return HandlerOutcome::Retry(format!("hot upload failed: {e}"));
        }

        // (c) drop the cold copy — the point of no return; idempotent if a
        // previous attempt already got this far
        if let Err(e) = self.cold.delete_archive(&msg.archive_id) {
            return HandlerOutcome::Retry(format!("cold delete failed: {e}"));
        }

        // (d) clear the marker. Past the point of no return: failures here
        // leave a stale marker, bounded by eventual consistency, and must
        // not push the message back for a full replay.
        match location::job_id_from_result_key(&msg.description) {
            Ok(job_id) => {
                if let Err(e) = self.records.clear_restore_marker(job_id) {
                    error!(
                        job_id = %job_id,
                        error = %e,
                        "restore marker not cleared; record is stale until repaired"
                    );
                } else {
                    info!(job_id = %job_id, key = %msg.description, "result restored to hot tier");
                }
            }
            Err(e) => {
                error!(
                    key = %msg.description,
                    error = %e,
                    "cannot derive job from key; restore marker left stale"
                );
            }
        }

        HandlerOutcome::Ack
    }
}

impl<R, B, C> MessageHandler for ThawWorker<R, B, C>
where
    R: RecordStore + Send,
    B: BlobStore + Send,
    C: ColdStore + Send,
{
    fn handle(&mut self, body: &str) -> HandlerOutcome {
        let msg: RetrievalReady = match serde_json::from_str(body) {
            Ok(msg) => msg,
            Err(e) => return HandlerOutcome::Drop(format!("bad retrieval notification: {e}")),
        };
        self.thaw(&msg)
    }
}
