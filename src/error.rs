//! patmem error types

use thiserror::Error;

/// patmem error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The persisted store does not exist or is empty
    #[error("Store missing or empty: {0}")]
    MissingOrEmptyStore(String),

    /// The persisted store exists but cannot be parsed
    #[error("Corrupt store: {0}")]
    CorruptStore(String),

    /// An argument is outside its valid range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A pattern, note or cluster id is absent
    #[error("Not found: {0}")]
    EntityNotFound(String),

    /// One step of a multi-step computation failed
    #[error("Partial computation failure: {0}")]
    PartialComputationFailure(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error is a recoverable store condition rather than a fatal one
    pub fn is_recoverable_store(&self) -> bool {
        matches!(self, Error::MissingOrEmptyStore(_) | Error::CorruptStore(_))
    }
}

/// Result type alias for patmem operations
pub type Result<T> = std::result::Result<T, Error>;
