use thiserror::Error;

/// Errors produced by store operations.
///
/// Store failures are transient infrastructure conditions. The engine never
/// remaps them to user-level conflicts and never retries them beyond its
/// CAS loop; they surface to the caller as-is.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias for store results.
pub type StoreResult<T> = Result<T, StoreError>;
