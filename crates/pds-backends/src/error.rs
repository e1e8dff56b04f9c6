//! Error types for storage backends

use pds_core::PdsError;
use thiserror::Error;

use crate::backend::Capability;

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors that can occur inside a storage backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Backend does not implement an optional capability
    #[error("Capability not supported by this backend: {0}")]
    Unsupported(Capability),

    /// Remote backend could not be reached
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Remote backend answered with an error status
    #[error("HTTP error: {0}")]
    Http(String),

    /// Remote backend answered with something we could not interpret
    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),

    /// Backend is missing a required setting
    #[error("Backend not configured: {0}")]
    NotConfigured(String),

    /// No backend registered under this type name
    #[error("No backend registered for type: {0}")]
    NotRegistered(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            BackendError::Unavailable(err.to_string())
        } else if err.is_decode() {
            BackendError::InvalidResponse(err.to_string())
        } else {
            BackendError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::InvalidResponse(err.to_string())
    }
}

impl From<BackendError> for PdsError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unsupported(_)
            | BackendError::NotConfigured(_)
            | BackendError::NotRegistered(_) => PdsError::Configuration(err.to_string()),
            BackendError::Unavailable(_) | BackendError::Http(_) | BackendError::InvalidResponse(_) => {
                PdsError::BackendUnavailable(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_into_taxonomy() {
        let err: PdsError = BackendError::Unsupported(Capability::Link).into();
        assert!(matches!(err, PdsError::Configuration(_)));

        let err: PdsError = BackendError::NotRegistered("s3".into()).into();
        assert!(matches!(err, PdsError::Configuration(_)));

        let err: PdsError = BackendError::Unavailable("connection refused".into()).into();
        assert!(matches!(err, PdsError::BackendUnavailable(_)));
    }

    #[test]
    fn test_unsupported_message_names_capability() {
        let err = BackendError::Unsupported(Capability::UsagePolicy);
        assert_eq!(err.to_string(), "Capability not supported by this backend: usage_policy");
    }
}
