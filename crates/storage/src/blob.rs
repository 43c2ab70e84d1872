//! Hot-tier blob store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use frostflow_core::BlobLocation;

#[derive(Debug, Clone, thiserror::Error)]
pub enum BlobStoreError {
    #[error("blob not found: {0}")]
    NotFound(BlobLocation),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Immediately accessible blob storage (bucket + key addressed).
///
/// Hot/cold migration is copy-then-delete, never an atomic rename: callers
/// must tolerate being interrupted between the copy and the delete.
/// Duplicate data is the safe failure direction, lost data is not.
pub trait BlobStore: Send + Sync {
    /// Write (or overwrite) a blob. Overwriting with identical bytes is how
    /// redelivered thaw messages stay idempotent.
    fn put(&self, location: &BlobLocation, bytes: Vec<u8>) -> Result<(), BlobStoreError>;

    fn get(&self, location: &BlobLocation) -> Result<Vec<u8>, BlobStoreError>;

    fn delete(&self, location: &BlobLocation) -> Result<(), BlobStoreError>;

    fn exists(&self, location: &BlobLocation) -> Result<bool, BlobStoreError>;
}

impl<B> BlobStore for Arc<B>
where
    B: BlobStore + ?Sized,
{
    fn put(&self, location: &BlobLocation, bytes: Vec<u8>) -> Result<(), BlobStoreError> {
        (**self).put(location, bytes)
    }

    fn get(&self, location: &BlobLocation) -> Result<Vec<u8>, BlobStoreError> {
        (**self).get(location)
    }

    fn delete(&self, location: &BlobLocation) -> Result<(), BlobStoreError> {
        (**self).delete(location)
    }

    fn exists(&self, location: &BlobLocation) -> Result<bool, BlobStoreError> {
        (**self).exists(location)
    }
}

/// In-memory blob store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<BlobLocation, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl BlobStore for InMemoryBlobStore {
    fn put(&self, location: &BlobLocation, bytes: Vec<u8>) -> Result<(), BlobStoreError> {
        let mut blobs = self.blobs.write().unwrap();
        blobs.insert(location.clone(), bytes);
        Ok(())
    }

    fn get(&self, location: &BlobLocation) -> Result<Vec<u8>, BlobStoreError> {
        let blobs = self.blobs.read().unwrap();
        blobs
            .get(location)
            .cloned()
            .ok_or_else(|| BlobStoreError::NotFound(location.clone()))
    }

    fn delete(&self, location: &BlobLocation) -> Result<(), BlobStoreError> {
        let mut blobs = self.blobs.write().unwrap();
        blobs
            .remove(location)
            .map(|_| ())
            .ok_or_else(|| BlobStoreError::NotFound(location.clone()))
    }

    fn exists(&self, location: &BlobLocation) -> Result<bool, BlobStoreError> {
        let blobs = self.blobs.read().unwrap();
        Ok(blobs.contains_key(location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete() {
        let store = InMemoryBlobStore::new();
        let loc = BlobLocation::new("results", "jobs/u/j~f.vcf");

        store.put(&loc, b"data".to_vec()).unwrap();
        assert_eq!(store.get(&loc).unwrap(), b"data");
        assert!(store.exists(&loc).unwrap());

        store.delete(&loc).unwrap();
        assert!(!store.exists(&loc).unwrap());
        assert!(matches!(store.get(&loc), Err(BlobStoreError::NotFound(_))));
    }

    #[test]
    fn overwrite_with_same_bytes_is_fine() {
        let store = InMemoryBlobStore::new();
        let loc = BlobLocation::new("results", "k");

        store.put(&loc, b"same".to_vec()).unwrap();
        store.put(&loc, b"same".to_vec()).unwrap();
        assert_eq!(store.get(&loc).unwrap(), b"same");
    }
}
