// src/main.rs
use dotenv::dotenv;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::PathBuf;
use std::{net::SocketAddr, str::FromStr, sync::Arc};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use protected_api::auth::{HttpKeySource, JwksCache, KeySource, StaticKeySource, TokenVerifier};
use protected_api::common::{migrations, AppState};
use protected_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // ========================================================================
    // CONFIGURATION
    // ========================================================================

    let config = AppConfig::from_env();
    info!(
        keycloak_url = %config.auth.keycloak_url,
        realm = %config.auth.realm,
        audience = %config.auth.audience,
        "Protected API with Keycloak JWT validation"
    );
    if config.auth.insecure_tls {
        warn!("INSECURE_TLS=true - provider certificates are not verified");
    }

    // ========================================================================
    // DATABASE SETUP
    // ========================================================================

    if let Some(path_part) = config.database_url.strip_prefix("sqlite://") {
        let path_without_params = path_part.split('?').next().unwrap_or("");
        if !path_without_params.is_empty() && !path_without_params.starts_with(':') {
            let db_path = PathBuf::from(path_without_params);
            if let Some(parent) = db_path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }
    }

    let connect_options =
        SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .connect_with(connect_options)
        .await?;
    migrations::run_migrations(&pool, config.reset_db).await?;

    // ========================================================================
    // TOKEN VERIFICATION
    // ========================================================================

    let key_source: Arc<dyn KeySource> = match &config.auth.jwks_path {
        Some(path) => Arc::new(StaticKeySource::from_file(path).await?),
        None => Arc::new(HttpKeySource::new(&config.auth)?),
    };
    let keys = JwksCache::from_config(key_source, &config.auth);

    match keys.prefetch().await {
        Ok(count) => info!(keys = count, "✓ Successfully fetched Keycloak public keys"),
        Err(e) => warn!(
            error = %e,
            "Could not fetch Keycloak public keys; will retry on first request"
        ),
    }

    let verifier = Arc::new(TokenVerifier::new(&config.auth, keys));

    // ========================================================================
    // APPLICATION STATE AND ROUTER
    // ========================================================================

    let shared = Arc::new(RwLock::new(AppState {
        db: pool,
        auth: config.auth.clone(),
        verifier,
    }));
    let app = protected_api::app_router(shared, config.cors_layer());

    // ========================================================================
    // SERVER STARTUP
    // ========================================================================

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
