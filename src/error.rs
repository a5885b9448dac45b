//! Error types for the authorization engine

use thiserror::Error;

/// Authorization engine errors
#[derive(Debug, Error)]
pub enum ShieldError {
    /// A permission map or role table is malformed. Raised at shield
    /// construction, never at request time.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A referenced identifier could not be parsed
    #[error("Malformed reference: {0}")]
    MalformedReference(String),

    /// A required argument is missing or has the wrong shape
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Persistence collaborator failure
    #[error("Store error: {0}")]
    Store(String),
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, ShieldError>;
