use strata_engine::AdapterError;
use thiserror::Error;

/// Errors produced by garbage-collection walks.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GcError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("incompatible bloom filter parameters: {0}")]
    IncompatibleFilters(String),
}

/// Convenience alias for GC results.
pub type GcResult<T> = Result<T, GcError>;
