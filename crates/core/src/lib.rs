//! `frostflow-core` — domain foundation for the job-lifecycle pipeline.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! typed identifiers, the job record, the status state machine, plan and
//! retrieval tiers, and blob location helpers.

pub mod error;
pub mod id;
pub mod location;
pub mod plan;
pub mod record;
pub mod status;

pub use error::{DomainError, DomainResult};
pub use id::{ArchiveId, JobId, RetrievalId, UserId};
pub use location::BlobLocation;
pub use plan::{PlanTier, RetrievalTier};
pub use record::{CompletionUpdate, JobRecord};
pub use status::JobStatus;
