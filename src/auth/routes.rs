//! Authentication demo routes

use axum::{routing::get, Router};

use super::handlers;

/// `GET /` health check, served outside the CORS-restricted API
pub fn index_routes() -> Router {
    Router::new().route("/", get(handlers::index))
}

/// Creates and returns the public/protected API router
///
/// # Routes
/// - `GET /api/public` - No authentication
/// - `GET /api/protected` - Requires a valid bearer token
/// - `GET /api/user-info` - Identity taken from the token
/// - `GET /api/admin` - Requires the `admin` role
pub fn auth_routes() -> Router {
    Router::new()
        .route("/api/public", get(handlers::public))
        .route("/api/protected", get(handlers::protected))
        .route("/api/user-info", get(handlers::user_info))
        .route("/api/admin", get(handlers::admin))
}
