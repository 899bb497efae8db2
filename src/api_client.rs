// src/api_client.rs
//! Command-line client for the protected API.
//!
//! Logs in against the Keycloak realm, keeps the tokens in a `Session` and
//! calls the API with them as bearer credentials.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use reqwest::Method;
use tracing::info;
use tracing_subscriber::EnvFilter;

use protected_api::config::AuthConfig;
use protected_api::session::{renew_if_needed, OidcClient, Session, TokenSet};

#[derive(Parser, Debug)]
#[command(author, version, about = "Client for the Keycloak-protected API")]
struct Args {
    /// Base URL of the API
    #[arg(long, env = "API_URL", default_value = "http://localhost:5001")]
    api_url: String,

    #[arg(long, env = "KEYCLOAK_URL", default_value = "http://localhost:8080")]
    keycloak_url: String,

    #[arg(long, env = "KEYCLOAK_REALM", default_value = "myapp")]
    realm: String,

    #[arg(long, env = "KEYCLOAK_CLIENT_ID", default_value = "myapp-frontend")]
    client_id: String,

    /// Only for confidential clients; required by `service-token` and `call --service`
    #[arg(long, env = "KEYCLOAK_CLIENT_SECRET")]
    client_secret: Option<String>,

    /// Where the provider sends the browser after login/logout
    #[arg(long, default_value = "http://localhost:3000/")]
    redirect_uri: String,

    /// Accept self-signed provider certificates
    #[arg(long, env = "INSECURE_TLS")]
    insecure: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the browser login URL
    LoginUrl,

    /// Print the provider logout URL
    LogoutUrl,

    /// Obtain a service account token with the client_credentials grant
    ServiceToken,

    /// Log in and call an API path
    Call {
        /// Path to call, e.g. /api/protected
        path: String,

        #[arg(long, default_value = "GET")]
        method: String,

        /// JSON request body
        #[arg(long)]
        data: Option<String>,

        #[arg(long, env = "KEYCLOAK_USERNAME", required_unless_present = "service")]
        username: Option<String>,

        #[arg(long, env = "KEYCLOAK_PASSWORD", required_unless_present = "service")]
        password: Option<String>,

        /// Call as the client's service account; takes precedence over user credentials
        #[arg(long)]
        service: bool,

        /// Number of calls; the session is renewed between them when due
        #[arg(long, default_value_t = 1)]
        repeat: u32,
    },
}

impl Args {
    fn auth_config(&self) -> AuthConfig {
        let mut config = AuthConfig::new(&self.keycloak_url, &self.realm);
        config.client_id = self.client_id.clone();
        config.insecure_tls = self.insecure;
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let client = OidcClient::new(&args.auth_config(), args.client_secret.clone())?;
    let mut session = Session::new(args.redirect_uri.clone());

    match &args.command {
        Command::LoginUrl => {
            println!("{}", session.begin_login(&client)?);
        }
        Command::LogoutUrl => {
            println!("{}", session.logout(&client));
        }
        Command::ServiceToken => {
            let tokens = client
                .client_credentials()
                .await
                .context("service token request failed")?;
            println!("{}", serde_json::to_string_pretty(&tokens)?);
        }
        Command::Call {
            path,
            method,
            data,
            username,
            password,
            service,
            repeat,
        } => {
            let method = Method::from_bytes(method.to_uppercase().as_bytes())
                .with_context(|| format!("invalid HTTP method `{}`", method))?;
            let body = data
                .as_deref()
                .map(serde_json::from_str::<serde_json::Value>)
                .transpose()
                .context("--data must be JSON")?;

            let tokens = match (username, password) {
                _ if *service => client
                    .client_credentials()
                    .await
                    .context("service token request failed")?,
                (Some(username), Some(password)) => {
                    let tokens = client
                        .password_grant(username, password)
                        .await
                        .context("login failed")?;
                    info!(username = %username, "Logged in");
                    tokens
                }
                _ => bail!("--username and --password are required unless --service is given"),
            };
            session.authenticated(TokenSet::from_response(tokens, Utc::now())?);

            let url = format!("{}{}", args.api_url.trim_end_matches('/'), path);
            for _ in 0..*repeat {
                call(&client, &mut session, &method, &url, body.as_ref()).await?;
            }
        }
    }

    Ok(())
}

async fn call(
    client: &OidcClient,
    session: &mut Session,
    method: &Method,
    url: &str,
    body: Option<&serde_json::Value>,
) -> Result<()> {
    renew_if_needed(session, client).await?;
    let Some(token) = session.bearer(Utc::now()) else {
        bail!("session is {}; log in again", session.state().name());
    };

    let mut request = client.http().request(method.clone(), url).bearer_auth(token);
    if let Some(json) = body {
        request = request.json(json);
    }

    let response = request
        .send()
        .await
        .with_context(|| format!("request to {} failed", url))?;
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    println!("{} {}", method, status);
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) if !text.is_empty() => println!("{}", text),
        Err(_) => {}
    }

    if !status.is_success() {
        bail!("API returned {}", status);
    }
    Ok(())
}
