//! Authentication failure taxonomy

use thiserror::Error;

/// Why a request could not be authenticated.
///
/// The `Display` text is the reason string returned to the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("No authorization header")]
    MissingCredential,

    /// Malformed header, unknown signing key, bad signature, expired token,
    /// wrong issuer or audience.
    #[error("{0}")]
    InvalidCredential(String),

    /// The identity provider could not be reached for signing keys.
    #[error("Identity provider unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl AuthError {
    pub fn malformed_header() -> Self {
        AuthError::InvalidCredential("Invalid authorization header".to_string())
    }

    pub fn key_not_found() -> Self {
        AuthError::InvalidCredential("Public key not found".to_string())
    }

    pub fn expired() -> Self {
        AuthError::InvalidCredential("Token has expired".to_string())
    }

    pub fn invalid_token(reason: impl std::fmt::Display) -> Self {
        AuthError::InvalidCredential(format!("Invalid token: {}", reason))
    }
}
