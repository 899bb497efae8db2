// Application state shared across all modules

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::config::AuthConfig;

/// Application state containing the database pool, the token verifier and
/// the provider configuration it was built from.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub auth: AuthConfig,
    pub verifier: Arc<TokenVerifier>,
}
