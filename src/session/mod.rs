//! # Session Module
//!
//! Client side of the login flow:
//! - `OidcClient` talks to the realm's token, auth and logout endpoints
//! - `Session` is an explicit state machine over the resulting tokens,
//!   replacing callback-driven login with named states and triggers

pub mod error;
pub mod oidc;
pub mod state;

pub use error::{ClientError, SessionError};
pub use oidc::{renew_if_needed, OidcClient, TokenResponse};
pub use state::{Session, SessionState, TokenSet};
