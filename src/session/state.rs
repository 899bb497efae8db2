//! Client-side session state machine
//!
//! ```text
//!                 begin_login                complete_login
//! Unauthenticated ───────────> RedirectingToLogin ───────────> Authenticated
//!        ^                           │ state mismatch               │  tick (past expiry)
//!        │<──────────────────────────┘                              v
//!        │<─────────────── logout (from any state) ───────────── Expired
//!                                                                   │ begin_login / authenticated
//! ```
//!
//! `authenticated` (direct grant or refresh) moves any state to Authenticated.

use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use tracing::{debug, info};

use super::error::{ClientError, SessionError};
use super::oidc::{OidcClient, TokenResponse};

const STATE_LENGTH: usize = 32;

/// Tokens held for an authenticated session, with absolute expiry times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: Option<String>,
    /// `None` when the provider did not bound the refresh token (offline tokens).
    pub refresh_expires_at: Option<DateTime<Utc>>,
    pub id_token: Option<String>,
}

impl TokenSet {
    /// Lifetimes the clock cannot represent are rejected rather than clamped.
    pub fn from_response(response: TokenResponse, now: DateTime<Utc>) -> Result<Self, ClientError> {
        let refresh_expires_at = response
            .refresh_expires_in
            .filter(|secs| *secs > 0)
            .map(|secs| expires_at(now, secs))
            .transpose()?;

        Ok(Self {
            access_expires_at: expires_at(now, response.expires_in)?,
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            refresh_expires_at,
            id_token: response.id_token,
        })
    }

    fn refresh_usable(&self, now: DateTime<Utc>) -> bool {
        self.refresh_token.is_some() && self.refresh_expires_at.map_or(true, |at| now < at)
    }
}

fn expires_at(now: DateTime<Utc>, secs: i64) -> Result<DateTime<Utc>, ClientError> {
    Duration::try_seconds(secs)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| {
            ClientError::SerializationError(format!("token lifetime out of range: {}s", secs))
        })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    RedirectingToLogin { state: String, url: String },
    Authenticated(TokenSet),
    /// The access token lapsed; the refresh token may still be usable.
    Expired(TokenSet),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::RedirectingToLogin { .. } => "redirecting to login",
            SessionState::Authenticated(_) => "authenticated",
            SessionState::Expired(_) => "expired",
        }
    }
}

/// Session for one user of one client.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    redirect_uri: String,
    /// Renew this long before the access token expires.
    renewal_margin: Duration,
}

impl Session {
    pub fn new(redirect_uri: impl Into<String>) -> Self {
        Self {
            state: SessionState::Unauthenticated,
            redirect_uri: redirect_uri.into(),
            renewal_margin: Duration::seconds(30),
        }
    }

    pub fn with_renewal_margin(mut self, margin: Duration) -> Self {
        self.renewal_margin = margin;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Starts the browser redirect flow; returns the provider login URL.
    pub fn begin_login(&mut self, client: &OidcClient) -> Result<String, SessionError> {
        match self.state {
            SessionState::Unauthenticated | SessionState::Expired(_) => {}
            ref other => {
                return Err(SessionError::InvalidTransition {
                    from: other.name(),
                    trigger: "begin login",
                })
            }
        }

        let state: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(STATE_LENGTH)
            .map(char::from)
            .collect();
        let url = client.authorization_url(&self.redirect_uri, &state);
        debug!("Session redirecting to login");

        self.state = SessionState::RedirectingToLogin {
            state,
            url: url.clone(),
        };
        Ok(url)
    }

    /// Finishes the redirect flow with the `state` echoed by the provider.
    ///
    /// A mismatched `state` drops the pending login.
    pub fn complete_login(
        &mut self,
        returned_state: &str,
        tokens: TokenSet,
    ) -> Result<(), SessionError> {
        let expected = match &self.state {
            SessionState::RedirectingToLogin { state, .. } => state,
            other => {
                return Err(SessionError::InvalidTransition {
                    from: other.name(),
                    trigger: "complete login",
                })
            }
        };

        if expected != returned_state {
            self.state = SessionState::Unauthenticated;
            return Err(SessionError::StateMismatch);
        }

        info!(expires_at = %tokens.access_expires_at, "Session authenticated");
        self.state = SessionState::Authenticated(tokens);
        Ok(())
    }

    /// Tokens obtained without a redirect (password or refresh grant).
    pub fn authenticated(&mut self, tokens: TokenSet) {
        debug!(expires_at = %tokens.access_expires_at, "Session tokens replaced");
        self.state = SessionState::Authenticated(tokens);
    }

    /// Applies the passage of time: Authenticated → Expired at access expiry.
    pub fn tick(&mut self, now: DateTime<Utc>) -> &SessionState {
        if let SessionState::Authenticated(tokens) = &self.state {
            if now >= tokens.access_expires_at {
                info!("Session access token expired");
                let tokens = tokens.clone();
                self.state = SessionState::Expired(tokens);
            }
        }
        &self.state
    }

    /// The provider refused the refresh token: expire now and forget it.
    pub fn refresh_rejected(&mut self) {
        if let SessionState::Authenticated(tokens) | SessionState::Expired(tokens) = &self.state {
            let mut tokens = tokens.clone();
            tokens.refresh_token = None;
            self.state = SessionState::Expired(tokens);
        }
    }

    /// True when a refresh should be attempted now.
    pub fn needs_renewal(&self, now: DateTime<Utc>) -> bool {
        match &self.state {
            SessionState::Authenticated(tokens) => {
                now + self.renewal_margin >= tokens.access_expires_at && tokens.refresh_usable(now)
            }
            SessionState::Expired(tokens) => tokens.refresh_usable(now),
            _ => false,
        }
    }

    /// Refresh token, if the session has one that has not lapsed.
    pub fn refresh_token(&self, now: DateTime<Utc>) -> Option<&str> {
        match &self.state {
            SessionState::Authenticated(tokens) | SessionState::Expired(tokens)
                if tokens.refresh_usable(now) =>
            {
                tokens.refresh_token.as_deref()
            }
            _ => None,
        }
    }

    /// Access token to attach as a bearer credential, if still valid.
    pub fn bearer(&self, now: DateTime<Utc>) -> Option<&str> {
        match &self.state {
            SessionState::Authenticated(tokens) if now < tokens.access_expires_at => {
                Some(&tokens.access_token)
            }
            _ => None,
        }
    }

    /// Clears local tokens from any state; returns the provider logout URL.
    pub fn logout(&mut self, client: &OidcClient) -> String {
        let id_token = match &self.state {
            SessionState::Authenticated(tokens) | SessionState::Expired(tokens) => {
                tokens.id_token.clone()
            }
            _ => None,
        };
        self.state = SessionState::Unauthenticated;
        info!("Session logged out");
        client.logout_url(Some(&self.redirect_uri), id_token.as_deref())
    }
}
