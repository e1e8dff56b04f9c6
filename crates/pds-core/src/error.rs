//! Error types for the personal data store

use thiserror::Error;

/// Result type alias using PdsError
pub type Result<T> = std::result::Result<T, PdsError>;

/// Errors that can occur anywhere in the PDS and exchange layers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PdsError {
    /// Unresolvable identifier, exchange record or connection reference
    #[error("Not found: {0}")]
    NotFound(String),

    /// No active backend selected, or an unregistered backend referenced
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Exchange record is not in the state the operation requires
    #[error("Invalid exchange state: expected '{expected}', got '{actual}'")]
    InvalidState { expected: String, actual: String },

    /// Caller does not hold the role the operation requires
    #[error("Invalid exchange role: expected '{expected}', got '{actual}'")]
    InvalidRole { expected: String, actual: String },

    /// Transition is not part of the protocol's transition table
    #[error("Invalid transition: '{from}' -> '{to}'")]
    InvalidTransition { from: String, to: String },

    /// A remote backend could not be reached
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Bad key or shape in caller-supplied input
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Persistence layer failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Issuer, holder or transport collaborator failed
    #[error("Collaborator error: {0}")]
    Collaborator(String),
}

impl PdsError {
    /// Shorthand for a not-found error
    pub fn not_found(what: impl Into<String>) -> Self {
        PdsError::NotFound(what.into())
    }

    /// Shorthand for a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        PdsError::Configuration(msg.into())
    }

    /// Whether this error is a protocol guard rejection
    pub fn is_guard_rejection(&self) -> bool {
        matches!(
            self,
            PdsError::InvalidState { .. }
                | PdsError::InvalidRole { .. }
                | PdsError::InvalidTransition { .. }
        )
    }
}

impl From<serde_json::Error> for PdsError {
    fn from(err: serde_json::Error) -> Self {
        PdsError::Serialization(err.to_string())
    }
}
