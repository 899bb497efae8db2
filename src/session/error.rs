use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("cannot {trigger} while {from}")]
    InvalidTransition {
        from: &'static str,
        trigger: &'static str,
    },

    #[error("login state mismatch")]
    StateMismatch,

    #[error("session expired and no usable refresh token; log in again")]
    LoginRequired,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("OAuth flow failed: {0}")]
    OAuthFailed(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("client_credentials grant requires a client secret")]
    MissingClientSecret,

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}
