//! `frostflow-storage` — the shared stores every worker coordinates through.
//!
//! Three externally owned services behind narrow client traits:
//!
//! - the **record store** (one consistency-checked row per job, conditional
//!   updates for every write that can race),
//! - the **hot blob store** (immediate read/write),
//! - the **cold store** (cheap archival with asynchronous, multi-speed
//!   retrieval).
//!
//! Each trait ships an in-memory implementation for tests/dev.

pub mod blob;
pub mod cold;
pub mod records;

pub use blob::{BlobStore, BlobStoreError, InMemoryBlobStore};
pub use cold::{ColdStore, ColdStoreError, InMemoryColdStore};
pub use records::{
    CasOutcome, InMemoryRecordStore, RecordStore, RecordStoreError, RestoreOutcome,
};
