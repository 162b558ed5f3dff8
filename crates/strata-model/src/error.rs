use thiserror::Error;

/// Errors produced by record serialization and hashing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("serialization error: {0}")]
    Serialization(String),
}
