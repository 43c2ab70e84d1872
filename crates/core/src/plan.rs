//! Account plan and cold-tier retrieval tiers.

use serde::{Deserialize, Serialize};

/// Billing plan of the job owner.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Free,
    Premium,
}

impl PlanTier {
    /// Free accounts get their results migrated to the cold tier after
    /// completion; premium accounts keep results hot.
    pub fn archives_results(self) -> bool {
        matches!(self, PlanTier::Free)
    }
}

/// Cost/latency class of a cold-tier retrieval request.
///
/// The restore worker asks for `Expedited` first and falls back to
/// `Standard` once if the cold store rejects the fast tier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RetrievalTier {
    Expedited,
    Standard,
}

impl core::fmt::Display for RetrievalTier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            RetrievalTier::Expedited => "Expedited",
            RetrievalTier::Standard => "Standard",
        };
        f.write_str(s)
    }
}
