//! Vault error types using thiserror 2.0.
//!
//! Provides Key Vault-specific errors with retryability classification.
//! This crate never retries on its own; the classification is for callers
//! that layer their own policy on top.

use thiserror::Error;

/// Errors produced by Key Vault operations.
#[derive(Error, Debug)]
pub enum VaultError {
    /// Caller supplied an empty or malformed identifier
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The named resource does not exist in the vault
    #[error("{kind} not found: {name}")]
    NotFound {
        /// Resource kind ("secret", "key", "certificate")
        kind: &'static str,
        /// The requested resource name
        name: String,
    },

    /// Vault rejected the request (401/403)
    #[error("Access forbidden: {0}")]
    Forbidden(String),

    /// Rate limited by the vault
    #[error("Rate limited")]
    RateLimited,

    /// Vault server unavailable or returned a server error
    #[error("Vault unavailable: {0}")]
    Unavailable(String),

    /// Token acquisition failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Certificate payload could not be decoded
    #[error("Invalid certificate data: {0}")]
    InvalidCertificate(String),
}

/// Result type for Key Vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

impl VaultError {
    /// Check if the error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::RateLimited | Self::Http(_)
        )
    }

    /// Create an invalid argument error.
    #[must_use]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a not found error for the given resource kind and name.
    #[must_use]
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create an authentication failed error.
    #[must_use]
    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::AuthenticationFailed(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VaultError::unavailable("connection refused");
        assert_eq!(err.to_string(), "Vault unavailable: connection refused");

        let err = VaultError::not_found("secret", "db-password");
        assert_eq!(err.to_string(), "secret not found: db-password");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(VaultError::Unavailable("timeout".to_string()).is_retryable());
        assert!(VaultError::RateLimited.is_retryable());
        assert!(!VaultError::not_found("secret", "name").is_retryable());
        assert!(!VaultError::invalid_argument("empty name").is_retryable());
        assert!(!VaultError::auth_failed("bad credentials").is_retryable());
    }
}
