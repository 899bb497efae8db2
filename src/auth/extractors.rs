//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::error::AuthError;
use super::models::Claims;
use crate::common::{ApiError, AppState};

/// Extracts the token from an `Authorization: Bearer <token>` header.
///
/// The scheme is matched case-insensitively and the value must be exactly two
/// whitespace-separated parts.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?
        .to_str()
        .map_err(|_| AuthError::malformed_header())?;

    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(AuthError::malformed_header()),
    }
}

/// Authenticated caller
///
/// Built from a verified access token; nothing is looked up locally.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub realm_roles: Vec<String>,
    pub client_roles: Vec<String>,
    /// `iat`, `exp` and `iss` of the token the request carried
    pub issued_at: Option<i64>,
    pub expires_at: i64,
    pub issuer: Option<String>,
}

impl AuthedUser {
    pub fn from_claims(claims: Claims, client_id: &str) -> Self {
        let realm_roles = claims.realm_roles().to_vec();
        let client_roles = claims.client_roles(client_id).to_vec();

        Self {
            username: claims
                .preferred_username
                .unwrap_or_else(|| claims.sub.clone()),
            id: claims.sub,
            email: claims.email,
            name: claims.name,
            realm_roles,
            client_roles,
            issued_at: claims.iat,
            expires_at: claims.exp,
            issuer: claims.iss,
        }
    }

    /// Held as either a realm role or a role on the configured client.
    pub fn has_role(&self, role: &str) -> bool {
        self.realm_roles.iter().any(|r| r == role) || self.client_roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role("admin")
    }

    pub fn require_role(&self, role: &str) -> Result<(), ApiError> {
        if self.has_role(role) {
            Ok(())
        } else {
            warn!(user_id = %self.id, role = %role, "Role check failed");
            Err(ApiError::Forbidden(format!("Role {} required", role)))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(state_lock): Extension<Arc<RwLock<AppState>>> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;

        let (verifier, client_id) = {
            let app_state = state_lock.read().await;
            (app_state.verifier.clone(), app_state.auth.client_id.clone())
        };

        let token = bearer_token(&parts.headers).map_err(|e| {
            warn!(reason = %e, "Authentication failed: bad Authorization header");
            ApiError::from(e)
        })?;

        let claims = verifier.verify(token).await?;
        let user = AuthedUser::from_claims(claims, &client_id);

        debug!(
            user_id = %user.id,
            username = %user.username,
            roles = ?user.realm_roles,
            "User authentication successful via extractor"
        );
        Ok(user)
    }
}
