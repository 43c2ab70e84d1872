//! Restore-request worker: upgrade event → cold-tier retrievals.
//!
//! When a user upgrades, every archived job of theirs gets a retrieval
//! request: expedited first, one immediate fallback to standard if the cold
//! store refuses the fast tier. Jobs are independent — one failure does not
//! block the rest — but the upgrade message is only acknowledged once every
//! archived job has a retrieval in flight. Jobs already carrying a restore
//! marker are skipped, which is what makes a redelivered upgrade safe.

use tracing::{debug, info, warn};

use frostflow_core::{JobRecord, RetrievalId, RetrievalTier};
use frostflow_messaging::UpgradeEvent;
use frostflow_storage::{ColdStore, RecordStore, RestoreOutcome};

use crate::runtime::{HandlerOutcome, MessageHandler};

#[derive(Debug, Clone)]
pub struct RestoreConfig {
    /// Human-readable note stored on the record while the retrieval runs.
    pub pending_note: String,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            pending_note: "Restore in progress; the result file will be back shortly".to_string(),
        }
    }
}

pub struct RestoreWorker<R, C> {
    records: R,
    cold: C,
    config: RestoreConfig,
}

impl<R, C> RestoreWorker<R, C>
where
    R: RecordStore,
    C: ColdStore,
{
    pub fn new(records: R, cold: C, config: RestoreConfig) -> Self {
        Self {
            records,
            cold,
            config,
        }
    }

    /// Expedited first; one immediate slow-tier retry on any cold-store
    /// refusal, then give up on this job for this delivery.
    fn request_retrieval(&self, record: &JobRecord, key: &str) -> Option<RetrievalId> {
        let archive_id = record.archive_id.as_ref()?;

        match self
            .cold
            .initiate_retrieval(archive_id, key, RetrievalTier::Expedited)
        {
            Ok(id) => Some(id),
            Err(e) => {
                debug!(
                    job_id = %record.job_id,
                    error = %e,
                    "expedited retrieval refused; falling back to standard"
                );
                match self
                    .cold
                    .initiate_retrieval(archive_id, key, RetrievalTier::Standard)
                {
                    Ok(id) => Some(id),
                    Err(e) => {
                        warn!(job_id = %record.job_id, error = %e, "retrieval request failed");
                        None
                    }
                }
            }
        }
    }

    fn restore_all(&self, event: &UpgradeEvent) -> HandlerOutcome {
        let jobs = match self.records.list_by_user(event.user_id) {
            Ok(jobs) => jobs,
            Err(e) => return HandlerOutcome::Retry(format!("record scan failed: {e}")),
        };

        let mut failed = 0usize;
        for record in jobs.iter().filter(|r| r.is_archived() && !r.is_restoring()) {
            let Some(result_location) = record.result_location.as_ref() else {
                // Archived implies completed; a record without a result
                // pointer cannot be restored, retrying will not grow one.
                warn!(job_id = %record.job_id, "archived record has no result location; skipping");
                continue;
            };

            let Some(retrieval_id) = self.request_retrieval(record, &result_location.key) else {
                failed += 1;
                continue;
            };

            match self
                .records
                .begin_restore(record.job_id, &self.config.pending_note)
            {
                Ok(RestoreOutcome::Begun) => {
                    info!(
                        job_id = %record.job_id,
                        retrieval_id = %retrieval_id,
                        "retrieval requested"
                    );
                }
                // Another instance of this worker got there first; its
                // retrieval is the one that counts.
                Ok(RestoreOutcome::AlreadyRestoring | RestoreOutcome::NotArchived) => {
                    debug!(job_id = %record.job_id, "restore already under way elsewhere");
                }
                Err(e) => {
                    warn!(job_id = %record.job_id, error = %e, "marking restore failed");
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            // Redelivery re-scans; jobs that made it carry a restore marker
            // and are skipped, only the stragglers are retried.
            return HandlerOutcome::Retry(format!("{failed} retrieval(s) not yet submitted"));
        }
        HandlerOutcome::Ack
    }
}

impl<R, C> MessageHandler for RestoreWorker<R, C>
where
    R: RecordStore + Send,
    C: ColdStore + Send,
{
    fn handle(&mut self, body: &str) -> HandlerOutcome {
        let event: UpgradeEvent = match serde_json::from_str(body) {
            Ok(event) => event,
            Err(e) => return HandlerOutcome::Drop(format!("bad upgrade event: {e}")),
        };
        self.restore_all(&event)
    }
}
