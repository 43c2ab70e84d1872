//! Cold-tier archive store.
//!
//! Writes are immediate; reads are not. Getting bytes back out is a
//! two-step, asynchronous affair: initiate a retrieval at some speed tier,
//! then wait for the store to announce readiness (a `RetrievalReady`
//! notification) and read the retrieval's output channel. The output channel
//! outlives the archive itself, so thaw can re-read it after deleting the
//! cold copy.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use frostflow_core::{ArchiveId, RetrievalId, RetrievalTier};
use frostflow_messaging::RetrievalReady;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ColdStoreError {
    /// The requested speed tier was refused (capacity/cost). The caller may
    /// retry on a slower tier; the archive itself is fine.
    #[error("retrieval tier {tier} rejected")]
    TierRejected { tier: RetrievalTier },
    #[error("archive not found: {0}")]
    ArchiveNotFound(ArchiveId),
    #[error("retrieval not found: {0}")]
    RetrievalNotFound(RetrievalId),
    #[error("retrieval {0} not ready yet")]
    RetrievalNotReady(RetrievalId),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Low-cost long-term blob storage with asynchronous, multi-speed retrieval.
pub trait ColdStore: Send + Sync {
    /// Store bytes and get back the store-assigned archive handle.
    fn archive(&self, bytes: Vec<u8>) -> Result<ArchiveId, ColdStoreError>;

    /// Ask for an archive's bytes at the given speed tier. The description
    /// is carried verbatim into the readiness notification (the thaw worker
    /// uses it to find the original hot-tier key).
    fn initiate_retrieval(
        &self,
        archive_id: &ArchiveId,
        description: &str,
        tier: RetrievalTier,
    ) -> Result<RetrievalId, ColdStoreError>;

    /// Read a completed retrieval's output channel.
    fn retrieval_output(&self, retrieval_id: RetrievalId) -> Result<Vec<u8>, ColdStoreError>;

    /// Remove the cold copy. Deleting an archive that is already gone is a
    /// no-op — thaw redelivery repeats this step.
    fn delete_archive(&self, archive_id: &ArchiveId) -> Result<(), ColdStoreError>;
}

impl<C> ColdStore for Arc<C>
where
    C: ColdStore + ?Sized,
{
    fn archive(&self, bytes: Vec<u8>) -> Result<ArchiveId, ColdStoreError> {
        (**self).archive(bytes)
    }

    fn initiate_retrieval(
        &self,
        archive_id: &ArchiveId,
        description: &str,
        tier: RetrievalTier,
    ) -> Result<RetrievalId, ColdStoreError> {
        (**self).initiate_retrieval(archive_id, description, tier)
    }

    fn retrieval_output(&self, retrieval_id: RetrievalId) -> Result<Vec<u8>, ColdStoreError> {
        (**self).retrieval_output(retrieval_id)
    }

    fn delete_archive(&self, archive_id: &ArchiveId) -> Result<(), ColdStoreError> {
        (**self).delete_archive(archive_id)
    }
}

#[derive(Debug)]
enum RetrievalState {
    Pending,
    Ready(Vec<u8>),
}

#[derive(Debug)]
struct Retrieval {
    archive_id: ArchiveId,
    description: String,
    state: RetrievalState,
}

/// In-memory cold store for tests/dev.
///
/// Retrievals complete only when the test drives them (`complete_retrieval`),
/// mirroring the real store's hours-long asynchrony. An optional switch
/// rejects every expedited request to exercise the slow-tier fallback.
#[derive(Debug, Default)]
pub struct InMemoryColdStore {
    archives: RwLock<HashMap<ArchiveId, Vec<u8>>>,
    retrievals: Mutex<HashMap<RetrievalId, Retrieval>>,
    /// Every initiate call, in order, for asserting tier fallback behavior.
    requests: Mutex<Vec<(ArchiveId, RetrievalTier)>>,
    reject_expedited: std::sync::atomic::AtomicBool,
    next_archive: std::sync::atomic::AtomicU64,
}

impl InMemoryColdStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Make every expedited retrieval request fail with `TierRejected`.
    pub fn reject_expedited(&self, reject: bool) {
        self.reject_expedited
            .store(reject, std::sync::atomic::Ordering::SeqCst);
    }

    /// All initiate calls seen so far (archive, tier), in order.
    pub fn retrieval_requests(&self) -> Vec<(ArchiveId, RetrievalTier)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn archive_count(&self) -> usize {
        self.archives.read().unwrap().len()
    }

    /// Finish a pending retrieval and return the notification the cold tier
    /// would publish. Tests forward it to the thaw queue.
    pub fn complete_retrieval(
        &self,
        retrieval_id: RetrievalId,
    ) -> Result<RetrievalReady, ColdStoreError> {
        let mut retrievals = self.retrievals.lock().unwrap();
        let retrieval = retrievals
            .get_mut(&retrieval_id)
            .ok_or(ColdStoreError::RetrievalNotFound(retrieval_id))?;

        if matches!(retrieval.state, RetrievalState::Pending) {
            let archives = self.archives.read().unwrap();
            let bytes = archives
                .get(&retrieval.archive_id)
                .cloned()
                .ok_or_else(|| ColdStoreError::ArchiveNotFound(retrieval.archive_id.clone()))?;
            retrieval.state = RetrievalState::Ready(bytes);
        }

        Ok(RetrievalReady {
            retrieval_id,
            archive_id: retrieval.archive_id.clone(),
            description: retrieval.description.clone(),
        })
    }

    /// Finish every pending retrieval.
    pub fn complete_all_retrievals(&self) -> Vec<RetrievalReady> {
        let ids: Vec<RetrievalId> = self.retrievals.lock().unwrap().keys().copied().collect();
        ids.into_iter()
            .filter_map(|id| self.complete_retrieval(id).ok())
            .collect()
    }
}

impl ColdStore for InMemoryColdStore {
    fn archive(&self, bytes: Vec<u8>) -> Result<ArchiveId, ColdStoreError> {
        let n = self
            .next_archive
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let archive_id = ArchiveId::new(format!("arch-{n:08}"));
        self.archives
            .write()
            .unwrap()
            .insert(archive_id.clone(), bytes);
        Ok(archive_id)
    }

    fn initiate_retrieval(
        &self,
        archive_id: &ArchiveId,
        description: &str,
        tier: RetrievalTier,
    ) -> Result<RetrievalId, ColdStoreError> {
        self.requests
            .lock()
            .unwrap()
            .push((archive_id.clone(), tier));

        if tier == RetrievalTier::Expedited
            && self
                .reject_expedited
                .load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(ColdStoreError::TierRejected { tier });
        }

        let archives = self.archives.read().unwrap();
        if !archives.contains_key(archive_id) {
            return Err(ColdStoreError::ArchiveNotFound(archive_id.clone()));
        }
        drop(archives);

        let retrieval_id = RetrievalId::new();
        self.retrievals.lock().unwrap().insert(
            retrieval_id,
            Retrieval {
                archive_id: archive_id.clone(),
                description: description.to_string(),
                state: RetrievalState::Pending,
            },
        );
        Ok(retrieval_id)
    }

    fn retrieval_output(&self, retrieval_id: RetrievalId) -> Result<Vec<u8>, ColdStoreError> {
        let retrievals = self.retrievals.lock().unwrap();
        let retrieval = retrievals
            .get(&retrieval_id)
            .ok_or(ColdStoreError::RetrievalNotFound(retrieval_id))?;
        match &retrieval.state {
            RetrievalState::Pending => Err(ColdStoreError::RetrievalNotReady(retrieval_id)),
            RetrievalState::Ready(bytes) => Ok(bytes.clone()),
        }
    }

    fn delete_archive(&self, archive_id: &ArchiveId) -> Result<(), ColdStoreError> {
        // Idempotent: a missing archive means a previous attempt already
        // deleted it.
        self.archives.write().unwrap().remove(archive_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_then_retrieve_round_trip() {
        let store = InMemoryColdStore::new();
        let archive_id = store.archive(b"frozen".to_vec()).unwrap();

        let retrieval_id = store
            .initiate_retrieval(&archive_id, "jobs/u/j~f.vcf", RetrievalTier::Expedited)
            .unwrap();

        // Not ready until the store says so.
        assert!(matches!(
            store.retrieval_output(retrieval_id),
            Err(ColdStoreError::RetrievalNotReady(_))
        ));

        let ready = store.complete_retrieval(retrieval_id).unwrap();
        assert_eq!(ready.archive_id, archive_id);
        assert_eq!(ready.description, "jobs/u/j~f.vcf");
        assert_eq!(store.retrieval_output(retrieval_id).unwrap(), b"frozen");
    }

    #[test]
    fn expedited_rejection_leaves_archive_intact() {
        let store = InMemoryColdStore::new();
        store.reject_expedited(true);
        let archive_id = store.archive(b"x".to_vec()).unwrap();

        let err = store
            .initiate_retrieval(&archive_id, "d", RetrievalTier::Expedited)
            .unwrap_err();
        assert!(matches!(err, ColdStoreError::TierRejected { .. }));

        // Standard still works.
        store
            .initiate_retrieval(&archive_id, "d", RetrievalTier::Standard)
            .unwrap();
        assert_eq!(store.archive_count(), 1);
    }

    #[test]
    fn output_survives_archive_deletion() {
        let store = InMemoryColdStore::new();
        let archive_id = store.archive(b"bytes".to_vec()).unwrap();
        let retrieval_id = store
            .initiate_retrieval(&archive_id, "d", RetrievalTier::Standard)
            .unwrap();
        store.complete_retrieval(retrieval_id).unwrap();

        store.delete_archive(&archive_id).unwrap();
        // Redelivered thaw re-reads the output and re-deletes: both fine.
        assert_eq!(store.retrieval_output(retrieval_id).unwrap(), b"bytes");
        store.delete_archive(&archive_id).unwrap();
    }

    #[test]
    fn retrieving_unknown_archive_fails() {
        let store = InMemoryColdStore::new();
        let err = store
            .initiate_retrieval(&ArchiveId::new("nope"), "d", RetrievalTier::Standard)
            .unwrap_err();
        assert!(matches!(err, ColdStoreError::ArchiveNotFound(_)));
    }
}
