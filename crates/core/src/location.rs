//! Blob locations and the result-key layout.
//!
//! Result and log blobs are written under
//! `{prefix}/{user_id}/{job_id}~{file_name}`. The thaw worker has to recover
//! the owning job from a key alone (retrieval notifications do not carry the
//! job id), so the layout and its parser live here as pure helpers.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{JobId, UserId};

/// Reference to one object in the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobLocation {
    pub bucket: String,
    pub key: String,
}

impl BlobLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl core::fmt::Display for BlobLocation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Key under which a job-scoped file lands in the results bucket.
pub fn result_key(prefix: &str, user_id: UserId, job_id: JobId, file_name: &str) -> String {
    format!("{prefix}/{user_id}/{job_id}~{file_name}")
}

/// Recover the owning job id from a result key.
///
/// Inverse of [`result_key`]: takes the final path segment and reads the
/// job id in front of the `~` delimiter.
pub fn job_id_from_result_key(key: &str) -> DomainResult<JobId> {
    let segment = key
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DomainError::malformed_key(key.to_string()))?;

    let (job_id, _file) = segment
        .split_once('~')
        .ok_or_else(|| DomainError::malformed_key(key.to_string()))?;

    job_id.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_key_round_trips() {
        let user = UserId::new();
        let job = JobId::new();
        let key = result_key("jobs", user, job, "sample.annot.vcf");
        assert_eq!(job_id_from_result_key(&key).unwrap(), job);
    }

    #[test]
    fn key_without_delimiter_is_rejected() {
        let err = job_id_from_result_key("jobs/u/no-delimiter.vcf").unwrap_err();
        assert!(matches!(err, DomainError::MalformedKey(_)));
    }

    #[test]
    fn key_with_garbage_job_id_is_rejected() {
        let err = job_id_from_result_key("jobs/u/nope~file.vcf").unwrap_err();
        assert!(matches!(err, DomainError::InvalidId(_)));
    }
}
