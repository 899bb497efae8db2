//! Keycloak-protected API service and its command-line client.
//!
//! The `api` binary serves public and bearer-protected routes plus a small
//! per-user todo store. The `api_client` binary logs in against the same
//! realm and calls the API through an explicit session state machine.

pub mod auth;
pub mod common;
pub mod config;
pub mod logging_middleware;
pub mod session;
pub mod todos;

use axum::{extract::Extension, middleware, Router};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use common::AppState;

/// Builds the full application router around a shared state handle.
///
/// `cors` covers the `/api` routes only.
pub fn app_router(state: Arc<RwLock<AppState>>, cors: CorsLayer) -> Router {
    let api = Router::new()
        .merge(auth::auth_routes())
        .merge(todos::todos_routes())
        .layer(cors);

    Router::new()
        .merge(auth::index_routes())
        .merge(api)
        .layer(middleware::from_fn(logging_middleware::log_request_response))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}
