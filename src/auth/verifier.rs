//! Access token verification

use jsonwebtoken::{decode, decode_header, errors::ErrorKind, Algorithm, Validation};
use tracing::{debug, warn};

use super::error::AuthError;
use super::jwks::JwksCache;
use super::models::Claims;
use crate::common::safe_token_log;
use crate::config::AuthConfig;

/// Verifies RS256 access tokens issued by one Keycloak realm.
///
/// Stateless apart from the key cache: the same token yields the same
/// outcome until it expires or its key is rotated out.
pub struct TokenVerifier {
    keys: JwksCache,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig, keys: JwksCache) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[config.issuer()]);
        validation.set_audience(&[config.audience.as_str()]);
        validation.leeway = config.leeway;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        // set_issuer/set_audience only check claims that are present
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        Self { keys, validation }
    }

    pub fn keys(&self) -> &JwksCache {
        &self.keys
    }

    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let header = decode_header(token).map_err(|e| {
            debug!(token = %safe_token_log(token), error = %e, "Undecodable token header");
            AuthError::invalid_token(e)
        })?;

        let kid = header
            .kid
            .ok_or_else(|| AuthError::invalid_token("missing key id"))?;
        let key = self.keys.key_for(&kid).await?;

        let data = decode::<Claims>(token, &key, &self.validation).map_err(|e| {
            warn!(kid = %kid, error = %e, "JWT token validation failed");
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::expired(),
                _ => AuthError::invalid_token(e),
            }
        })?;

        debug!(sub = %data.claims.sub, kid = %kid, "Token verified");
        Ok(data.claims)
    }
}
