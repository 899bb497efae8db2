//! # Auth Module
//!
//! Bearer-token authentication against a Keycloak realm:
//! - Signing keys fetched from the realm's JWKS endpoint and cached
//! - RS256 signature, expiry, issuer and audience verification
//! - `AuthedUser` extractor for protected routes, with realm/client role checks
//! - Health, public and protected demo routes

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod jwks;
pub mod models;
pub mod routes;
pub mod verifier;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::AuthError;
pub use extractors::{bearer_token, AuthedUser};
pub use jwks::{HttpKeySource, JwksCache, KeySource, StaticKeySource};
pub use models::Claims;
pub use routes::{auth_routes, index_routes};
pub use verifier::TokenVerifier;
