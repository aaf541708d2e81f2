//! Error types for viewgate

/// The main error type for viewgate operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Effective access fell short at some required scope. Carries no detail
    /// about which scope failed.
    #[error("forbidden")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid: {0}")]
    Invalid(String),
    #[error("storage: {0}")]
    Storage(String),
}

/// Result type alias for viewgate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Convert any storage or serialization error into an `Error`
pub fn err<E: std::error::Error>(e: E) -> Error {
    Error::Storage(e.to_string())
}
