//! OpenID Connect client for a Keycloak realm

use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::error::{ClientError, SessionError};
use super::state::{Session, TokenSet};
use crate::config::AuthConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub refresh_expires_in: Option<i64>,
    pub token_type: String,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OidcClient {
    http: Client,
    client_id: String,
    client_secret: Option<String>,
    auth_url: String,
    token_url: String,
    logout_url: String,
}

impl OidcClient {
    /// `client_secret` is only needed for confidential clients.
    pub fn new(config: &AuthConfig, client_secret: Option<String>) -> Result<Self, ClientError> {
        let http = Client::builder()
            .danger_accept_invalid_certs(config.insecure_tls)
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| ClientError::RequestFailed(e.to_string()))?;

        Ok(Self {
            http,
            client_id: config.client_id.clone(),
            client_secret,
            auth_url: config.auth_url(),
            token_url: config.token_url(),
            logout_url: config.logout_url(),
        })
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Authorization-code login URL
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode("openid profile email"),
            urlencoding::encode(state)
        )
    }

    /// End-session URL; the provider redirects back to `redirect_uri` afterwards.
    pub fn logout_url(&self, redirect_uri: Option<&str>, id_token_hint: Option<&str>) -> String {
        let mut url = format!(
            "{}?client_id={}",
            self.logout_url,
            urlencoding::encode(&self.client_id)
        );
        if let Some(uri) = redirect_uri {
            url.push_str("&post_logout_redirect_uri=");
            url.push_str(&urlencoding::encode(uri));
        }
        if let Some(hint) = id_token_hint {
            url.push_str("&id_token_hint=");
            url.push_str(&urlencoding::encode(hint));
        }
        url
    }

    /// Exchange authorization code for tokens
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, ClientError> {
        debug!("Exchanging authorization code for tokens");
        self.token_request(vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ])
        .await
    }

    /// Direct access grant with user credentials
    pub async fn password_grant(
        &self,
        username: &str,
        password: &str,
    ) -> Result<TokenResponse, ClientError> {
        debug!(username = %username, "Requesting tokens with password grant");
        self.token_request(vec![
            ("grant_type", "password"),
            ("username", username),
            ("password", password),
            ("scope", "openid"),
        ])
        .await
    }

    /// Service account token for calls made on the client's own behalf.
    pub async fn client_credentials(&self) -> Result<TokenResponse, ClientError> {
        if self.client_secret.is_none() {
            return Err(ClientError::MissingClientSecret);
        }
        debug!(client_id = %self.client_id, "Requesting service token");
        self.token_request(vec![("grant_type", "client_credentials")])
            .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, ClientError> {
        debug!(client_id = %self.client_id, "Refreshing access token");
        self.token_request(vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn token_request<'a>(
        &'a self,
        mut params: Vec<(&'a str, &'a str)>,
    ) -> Result<TokenResponse, ClientError> {
        params.push(("client_id", &self.client_id));
        if let Some(secret) = &self.client_secret {
            params.push(("client_secret", secret));
        }

        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, endpoint = %self.token_url, "Failed to send token request");
                ClientError::RequestFailed(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!(status = %status, error = %error_text, "Token request rejected");
            return Err(ClientError::OAuthFailed(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| ClientError::SerializationError(e.to_string()))
    }
}

/// Refreshes the session's tokens when it is due; returns whether it did.
///
/// A rejected refresh leaves the session Expired so the caller can start a
/// new login.
pub async fn renew_if_needed(
    session: &mut Session,
    client: &OidcClient,
) -> Result<bool, ClientError> {
    let now = Utc::now();
    session.tick(now);
    if !session.needs_renewal(now) {
        return Ok(false);
    }

    let refresh_token = session
        .refresh_token(now)
        .map(str::to_string)
        .ok_or(SessionError::LoginRequired)?;

    match client.refresh(&refresh_token).await {
        Ok(response) => {
            session.authenticated(TokenSet::from_response(response, Utc::now())?);
            info!("Session renewed with refresh token");
            Ok(true)
        }
        Err(ClientError::OAuthFailed(reason)) => {
            warn!(reason = %reason, "Refresh token rejected");
            session.refresh_rejected();
            Err(SessionError::LoginRequired.into())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::{test_auth_config, CLIENT_ID};
    use axum::{extract::Form, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    const SECRET: &str = "s3cret";

    fn config_for(addr: SocketAddr) -> AuthConfig {
        let mut config = AuthConfig::new(format!("http://{}", addr), "myapp");
        config.client_id = CLIENT_ID.to_string();
        config
    }

    /// Realm token endpoint answering `grant_type` requests with `status`/`body`.
    /// Other grants, or a wrong client, get Keycloak's 400.
    async fn token_endpoint(grant_type: &'static str, status: StatusCode, body: Value) -> AuthConfig {
        let app = Router::new().route(
            "/realms/myapp/protocol/openid-connect/token",
            post(move |Form(form): Form<HashMap<String, String>>| {
                let body = body.clone();
                async move {
                    let field = |name: &str| form.get(name).cloned().unwrap_or_default();
                    if field("grant_type") != grant_type || field("client_id") != CLIENT_ID {
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(json!({"error": "unsupported_grant_type"})),
                        );
                    }
                    if grant_type == "client_credentials" && field("client_secret") != SECRET {
                        return (
                            StatusCode::UNAUTHORIZED,
                            Json(json!({"error": "unauthorized_client"})),
                        );
                    }
                    (status, Json(body))
                }
            }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        config_for(addr)
    }

    fn token_body(access_token: &str, refresh_token: Option<&str>) -> Value {
        json!({
            "access_token": access_token,
            "expires_in": 300,
            "refresh_token": refresh_token,
            "refresh_expires_in": 1800,
            "token_type": "Bearer",
            "scope": "openid profile email"
        })
    }

    fn session_expiring_in(secs: i64, refresh_token: Option<&str>) -> Session {
        let mut session = Session::new("http://localhost:3000/");
        session.authenticated(TokenSet {
            access_token: "stale".to_string(),
            access_expires_at: Utc::now() + chrono::Duration::seconds(secs),
            refresh_token: refresh_token.map(str::to_string),
            refresh_expires_at: None,
            id_token: None,
        });
        session
    }

    #[tokio::test]
    async fn test_refresh_renews_session() {
        let config = token_endpoint(
            "refresh_token",
            StatusCode::OK,
            token_body("fresh", Some("r2")),
        )
        .await;
        let client = OidcClient::new(&config, None).unwrap();
        let mut session = session_expiring_in(10, Some("r1"));

        assert!(renew_if_needed(&mut session, &client).await.unwrap());
        assert_eq!(session.state().name(), "authenticated");
        assert_eq!(session.bearer(Utc::now()), Some("fresh"));
        assert_eq!(session.refresh_token(Utc::now()), Some("r2"));
    }

    #[tokio::test]
    async fn test_rejected_refresh_requires_login() {
        let config = token_endpoint(
            "refresh_token",
            StatusCode::BAD_REQUEST,
            json!({"error": "invalid_grant", "error_description": "Token is not active"}),
        )
        .await;
        let client = OidcClient::new(&config, None).unwrap();
        let mut session = session_expiring_in(-1, Some("r1"));

        let err = renew_if_needed(&mut session, &client).await.unwrap_err();
        assert!(matches!(err, ClientError::Session(SessionError::LoginRequired)));
        assert_eq!(session.state().name(), "expired");
        assert_eq!(session.refresh_token(Utc::now()), None);
        assert!(!session.needs_renewal(Utc::now()));
    }

    #[tokio::test]
    async fn test_error_status_maps_to_oauth_failed() {
        let config = token_endpoint(
            "refresh_token",
            StatusCode::BAD_REQUEST,
            json!({"error": "invalid_grant"}),
        )
        .await;
        let client = OidcClient::new(&config, None).unwrap();

        match client.refresh("r1").await {
            Err(ClientError::OAuthFailed(reason)) => {
                assert!(reason.starts_with("HTTP 400 Bad Request: "), "{}", reason);
                assert!(reason.contains("invalid_grant"));
            }
            other => panic!("expected OAuthFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_maps_to_request_failed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = OidcClient::new(&config_for(addr), None).unwrap();
        assert!(matches!(
            client.password_grant("alice", "pw").await,
            Err(ClientError::RequestFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_client_credentials_grant() {
        let config = token_endpoint(
            "client_credentials",
            StatusCode::OK,
            token_body("service", None),
        )
        .await;

        let client = OidcClient::new(&config, Some(SECRET.to_string())).unwrap();
        let response = client.client_credentials().await.unwrap();
        assert_eq!(response.access_token, "service");
        assert_eq!(response.refresh_token, None);

        let wrong = OidcClient::new(&config, Some("nope".to_string())).unwrap();
        assert!(matches!(
            wrong.client_credentials().await,
            Err(ClientError::OAuthFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_client_credentials_requires_secret() {
        let client = OidcClient::new(&test_auth_config(), None).unwrap();
        assert!(matches!(
            client.client_credentials().await,
            Err(ClientError::MissingClientSecret)
        ));
    }

    #[test]
    fn test_authorization_url() {
        let client = OidcClient::new(&test_auth_config(), None).unwrap();
        let url = client.authorization_url("http://localhost:3000/callback", "abc123");

        assert!(url.starts_with("https://keycloak.test/realms/myapp/protocol/openid-connect/auth?"));
        assert!(url.contains("client_id=todo-frontend"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fcallback"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=openid%20profile%20email"));
        assert!(url.contains("state=abc123"));
    }

    #[test]
    fn test_logout_url_without_hint() {
        let client = OidcClient::new(&test_auth_config(), None).unwrap();
        let url = client.logout_url(None, None);

        assert_eq!(
            url,
            "https://keycloak.test/realms/myapp/protocol/openid-connect/logout?client_id=todo-frontend"
        );
    }

    #[test]
    fn test_keycloak_token_response_parses() {
        let body = r#"{
            "access_token": "eyJ...",
            "expires_in": 300,
            "refresh_expires_in": 1800,
            "refresh_token": "eyR...",
            "token_type": "Bearer",
            "not-before-policy": 0,
            "session_state": "4e5b",
            "scope": "openid profile email"
        }"#;

        let response: TokenResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.expires_in, 300);
        assert_eq!(response.refresh_expires_in, Some(1800));
        assert_eq!(response.id_token, None);
    }

    #[tokio::test]
    async fn test_renew_not_needed_for_fresh_session() {
        let client = OidcClient::new(&test_auth_config(), None).unwrap();
        let mut session = Session::new("http://localhost:3000/");
        session.authenticated(TokenSet {
            access_token: "a".to_string(),
            access_expires_at: Utc::now() + chrono::Duration::minutes(5),
            refresh_token: Some("r".to_string()),
            refresh_expires_at: None,
            id_token: None,
        });

        assert!(!renew_if_needed(&mut session, &client).await.unwrap());
    }

    #[tokio::test]
    async fn test_renew_without_refresh_token_requires_login() {
        let client = OidcClient::new(&test_auth_config(), None).unwrap();
        let mut session = Session::new("http://localhost:3000/");
        session.authenticated(TokenSet {
            access_token: "a".to_string(),
            access_expires_at: Utc::now() - chrono::Duration::seconds(1),
            refresh_token: None,
            refresh_expires_at: None,
            id_token: None,
        });

        // nothing to renew with; the session simply expires
        assert!(!renew_if_needed(&mut session, &client).await.unwrap());
        assert_eq!(session.state().name(), "expired");
    }
}
