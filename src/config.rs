// src/config.rs
//! Startup configuration read once from the environment.
//!
//! Everything downstream receives these structs explicitly; nothing reads
//! environment variables after `AppConfig::from_env` returns.

use axum::http::{header, HeaderValue, Method};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tower_http::cors::CorsLayer;

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:3000";

/// Identity provider settings used by the token verifier.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub keycloak_url: String,
    pub realm: String,
    pub client_id: String,
    pub audience: String,
    /// Clock skew tolerated on `exp`/`nbf`, in seconds.
    pub leeway: u64,
    /// Lifetime of a fetched key set (the provider's key-rotation interval).
    pub jwks_ttl: Duration,
    /// Minimum spacing between refetches triggered by an unknown `kid`.
    pub jwks_min_refresh: Duration,
    /// Key set obtained out-of-band; when set, the provider is never contacted for keys.
    pub jwks_path: Option<PathBuf>,
    /// Accept self-signed provider certificates (staging clusters).
    pub insecure_tls: bool,
}

impl AuthConfig {
    pub fn new(keycloak_url: impl Into<String>, realm: impl Into<String>) -> Self {
        Self {
            keycloak_url: keycloak_url.into().trim_end_matches('/').to_string(),
            realm: realm.into(),
            client_id: "myapp-frontend".to_string(),
            audience: "account".to_string(),
            leeway: 0,
            jwks_ttl: Duration::from_secs(300),
            jwks_min_refresh: Duration::from_secs(10),
            jwks_path: None,
            insecure_tls: false,
        }
    }

    pub fn from_env() -> Self {
        let mut config = Self::new(
            env::var("KEYCLOAK_URL").unwrap_or_else(|_| "http://localhost:8080".to_string()),
            env::var("KEYCLOAK_REALM").unwrap_or_else(|_| "myapp".to_string()),
        );

        if let Ok(client_id) = env::var("KEYCLOAK_CLIENT_ID") {
            config.client_id = client_id;
        }
        if let Ok(audience) = env::var("JWT_AUDIENCE") {
            config.audience = audience;
        }
        if let Some(leeway) = env_parse::<u64>("JWT_LEEWAY") {
            config.leeway = leeway;
        }
        if let Some(ttl) = env_parse::<u64>("JWKS_TTL") {
            config.jwks_ttl = Duration::from_secs(ttl);
        }
        if let Some(min_refresh) = env_parse::<u64>("JWKS_MIN_REFRESH") {
            config.jwks_min_refresh = Duration::from_secs(min_refresh);
        }
        config.jwks_path = env::var("JWKS_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        config.insecure_tls = env_flag("INSECURE_TLS");

        config
    }

    /// `<keycloak_url>/realms/<realm>`, the `iss` claim Keycloak puts in its tokens.
    pub fn issuer(&self) -> String {
        format!("{}/realms/{}", self.keycloak_url, self.realm)
    }

    pub fn certs_url(&self) -> String {
        format!("{}/protocol/openid-connect/certs", self.issuer())
    }

    pub fn token_url(&self) -> String {
        format!("{}/protocol/openid-connect/token", self.issuer())
    }

    pub fn auth_url(&self) -> String {
        format!("{}/protocol/openid-connect/auth", self.issuer())
    }

    pub fn logout_url(&self) -> String {
        format!("{}/protocol/openid-connect/logout", self.issuer())
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub cors_origins: Vec<String>,
    pub reset_db: bool,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Self {
            port: env_parse::<u16>("PORT").unwrap_or(5001),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://todos.db".to_string()),
            cors_origins,
            reset_db: env_flag("RESET_DB"),
            auth: AuthConfig::from_env(),
        }
    }

    /// CORS policy for the browser frontend.
    pub fn cors_layer(&self) -> CorsLayer {
        let origins: Vec<HeaderValue> = self
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
