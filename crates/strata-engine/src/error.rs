use strata_model::ModelError;
use strata_store::StoreError;
use strata_types::{ContentKey, Hash};
use thiserror::Error;

/// Errors surfaced by adapter operations.
///
/// `InvalidArgument` indicates a bug in the caller and never triggers
/// retries; `ReferenceConflict` covers expected-HEAD mismatches, key-level
/// merge/transplant conflicts, and exhausted CAS retries. Store failures
/// pass through unchanged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterError {
    #[error("{0}")]
    ReferenceNotFound(String),

    #[error("reference '{0}' already exists")]
    ReferenceAlreadyExists(String),

    #[error("{0}")]
    ReferenceConflict(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("ref-log entry '{0}' not found")]
    RefLogNotFound(Hash),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias for adapter results.
pub type AdapterResult<T> = Result<T, AdapterError>;

impl From<ModelError> for AdapterError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Serialization(msg) => AdapterError::Serialization(msg),
        }
    }
}

impl AdapterError {
    pub(crate) fn ref_not_found(name: &str) -> Self {
        AdapterError::ReferenceNotFound(format!("named reference '{name}' not found"))
    }

    pub(crate) fn commit_not_found(hash: Hash) -> Self {
        AdapterError::ReferenceNotFound(format!("commit '{hash}' not found"))
    }

    pub(crate) fn hash_not_reachable(name: &str, hash: Hash) -> Self {
        AdapterError::ReferenceNotFound(format!(
            "commit '{hash}' is not reachable from reference '{name}'"
        ))
    }

    pub(crate) fn repo_not_initialized() -> Self {
        AdapterError::ReferenceNotFound("repository is not initialized".into())
    }

    pub(crate) fn expected_head_mismatch(name: &str, expected: Hash) -> Self {
        AdapterError::ReferenceConflict(format!(
            "named reference '{name}' is not at expected hash '{expected}'"
        ))
    }

    /// Key-level conflict, listing the conflicting keys sorted and
    /// dot-joined.
    pub(crate) fn key_conflicts(keys: &[ContentKey]) -> Self {
        let rendered: Vec<String> = keys.iter().map(|k| format!("'{k}'")).collect();
        AdapterError::ReferenceConflict(format!(
            "The following keys have been changed in conflict: {}",
            rendered.join(", ")
        ))
    }

    pub(crate) fn retries_exhausted(operation: &str, name: &str, retries: u32) -> Self {
        AdapterError::ReferenceConflict(format!(
            "could not apply {operation} on reference '{name}' after {retries} retries"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_conflict_message_lists_quoted_keys() {
        let keys = vec![
            ContentKey::of(&["key", "0"]).unwrap(),
            ContentKey::of(&["key", "1"]).unwrap(),
        ];
        let err = AdapterError::key_conflicts(&keys);
        assert_eq!(
            err.to_string(),
            "The following keys have been changed in conflict: 'key.0', 'key.1'"
        );
    }

    #[test]
    fn store_errors_pass_through_unchanged() {
        let err: AdapterError = StoreError::Unavailable("connection reset".into()).into();
        assert_eq!(err.to_string(), "store unavailable: connection reset");
    }
}
