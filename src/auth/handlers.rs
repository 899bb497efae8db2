//! Health, public and protected demo handlers

use axum::extract::{Extension, Json};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use super::extractors::AuthedUser;
use crate::common::{ApiError, AppState};

/// GET /
/// Health check, echoing which realm tokens are verified against
pub async fn index(Extension(state): Extension<Arc<RwLock<AppState>>>) -> Json<Value> {
    let state = state.read().await;

    Json(json!({
        "message": "Protected API with Keycloak JWT validation",
        "keycloak_url": state.auth.keycloak_url,
        "realm": state.auth.realm,
        "endpoints": {
            "GET /api/public": "Public (no auth)",
            "GET /api/protected": "Protected (requires JWT)",
            "GET /api/user-info": "Current user's identity",
            "GET /api/admin": "Requires the admin role",
            "GET /api/todos": "Todos (all for admin, own for users)",
            "POST /api/todos": "Create todo",
            "PUT /api/todos/:id/toggle": "Toggle todo (own only, or admin)",
            "DELETE /api/todos/:id": "Delete todo (own only, or admin)"
        }
    }))
}

/// GET /api/public
pub async fn public() -> Json<Value> {
    Json(json!({
        "message": "This is public data - anyone can access this!"
    }))
}

/// GET /api/protected
///
/// # Response
/// ```json
/// {
///   "message": "...",
///   "sub": "<subject>",
///   "user": "<preferred_username>",
///   "email": "<email or N/A>",
///   "roles": ["..."]
/// }
/// ```
pub async fn protected(user: AuthedUser) -> Json<Value> {
    Json(json!({
        "message": "This is protected data - you are authenticated!",
        "sub": user.id,
        "user": user.username,
        "email": user.email.as_deref().unwrap_or("N/A"),
        "roles": user.realm_roles,
    }))
}

fn rfc3339(timestamp: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).map(|at| at.to_rfc3339())
}

/// GET /api/user-info
///
/// Identity plus when the presented token was issued, when it expires and
/// who issued it.
pub async fn user_info(user: AuthedUser) -> Json<Value> {
    Json(json!({
        "id": user.id,
        "username": user.username,
        "email": user.email,
        "name": user.name,
        "realm_roles": user.realm_roles,
        "client_roles": user.client_roles,
        "token_info": {
            "issued_at": user.issued_at.and_then(rfc3339),
            "expires_at": rfc3339(user.expires_at),
            "issuer": user.issuer,
        },
    }))
}

/// GET /api/admin
pub async fn admin(user: AuthedUser) -> Result<Json<Value>, ApiError> {
    user.require_role("admin")?;
    info!(user_id = %user.id, "Admin endpoint accessed");

    Ok(Json(json!({
        "message": "Admin access granted",
        "user": user.username,
    })))
}
