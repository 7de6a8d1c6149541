//! Per-session Reddit OAuth lifecycle.
//!
//! A session moves `Disconnected -> PendingAuthorization -> Connected`. The
//! callback is the only place tokens are minted from an authorization code;
//! refresh happens lazily when a token is needed for posting.

use chrono::Utc;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use super::client::{RedditClient, RedditError};
use crate::constants::TOKEN_EXPIRY_SKEW;
use crate::db::{
    begin_session, best_effort, clear_access_token, clear_session_tokens, get_session,
    upsert_session_tokens, Database,
};

/// Generate an opaque session id for clients that did not supply one.
pub fn generate_session_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    PendingAuthorization,
    Connected,
}

/// Response to a connect request.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationStart {
    pub url: String,
    pub session_id: String,
}

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("token exchange failed: {0}")]
    Exchange(#[from] RedditError),
    #[error("failed to store tokens")]
    Store(#[source] anyhow::Error),
}

#[derive(Clone)]
pub struct OAuthSessionManager {
    reddit: RedditClient,
    db: Database,
}

impl OAuthSessionManager {
    #[must_use]
    pub fn new(reddit: RedditClient, db: Database) -> Self {
        Self { reddit, db }
    }

    /// Begin connecting a session, reusing `session_id` when given.
    ///
    /// # Errors
    ///
    /// Fails if the Reddit client id or redirect URI is not configured.
    pub async fn start(&self, session_id: Option<&str>) -> Result<AuthorizationStart, RedditError> {
        let session_id = session_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map_or_else(generate_session_id, ToString::to_string);

        let url = self.reddit.authorization_url(&session_id)?;
        best_effort(
            "record pending session",
            begin_session(self.db.pool(), &session_id).await,
        );
        info!(session_id = %session_id, "Started Reddit authorization");

        Ok(AuthorizationStart { url, session_id })
    }

    /// Handle the provider redirect: exchange `code` and store the tokens under `state`.
    ///
    /// Calling it again for the same `state` overwrites the stored tokens.
    ///
    /// # Errors
    ///
    /// Fails if the exchange is rejected or the tokens cannot be stored.
    pub async fn callback(&self, code: &str, state: &str) -> Result<(), CallbackError> {
        let grant = self.reddit.exchange_code(code).await?;
        let tokens = grant.into_tokens(Utc::now().timestamp());

        upsert_session_tokens(self.db.pool(), state, &tokens)
            .await
            .map_err(CallbackError::Store)?;
        info!(session_id = %state, "Reddit account connected");

        Ok(())
    }

    /// Where `session_id` sits in the connect lifecycle. Store errors read as disconnected.
    pub async fn state(&self, session_id: &str) -> SessionState {
        match get_session(self.db.pool(), session_id).await {
            Ok(Some(session)) if session.has_tokens() => SessionState::Connected,
            Ok(Some(_)) => SessionState::PendingAuthorization,
            Ok(None) => SessionState::Disconnected,
            Err(e) => {
                warn!(session_id = %session_id, "Session lookup failed: {e:#}");
                SessionState::Disconnected
            }
        }
    }

    /// Whether a token record exists for the session. Expiry is checked at use time.
    pub async fn status(&self, session_id: Option<&str>) -> bool {
        match session_id.map(str::trim).filter(|s| !s.is_empty()) {
            Some(session_id) => self.state(session_id).await == SessionState::Connected,
            None => false,
        }
    }

    /// A usable access token for the session, refreshing an expired one.
    ///
    /// `None` means the session must be re-authorized. A session with an
    /// unusable access token and no refresh token, or whose refresh token
    /// Reddit rejects, drops back to pending. Transient refresh failures
    /// keep the stored tokens.
    pub async fn resolve_access_token(&self, session_id: &str) -> Option<String> {
        let session = match get_session(self.db.pool(), session_id).await {
            Ok(Some(session)) => session,
            Ok(None) => return None,
            Err(e) => {
                warn!(session_id = %session_id, "Session lookup failed: {e:#}");
                return None;
            }
        };

        let now = Utc::now().timestamp();
        let skew = i64::try_from(TOKEN_EXPIRY_SKEW.as_secs()).unwrap_or(0);
        if let Some(token) = session.usable_access_token(now, skew) {
            return Some(token.to_string());
        }

        let Some(refresh_token) = session.refresh_token() else {
            if session.access_token.is_some() {
                best_effort(
                    "clear stale access token",
                    clear_access_token(self.db.pool(), session_id).await,
                );
            }
            return None;
        };

        match self.reddit.refresh(refresh_token).await {
            Ok(grant) => {
                let tokens = grant.into_tokens(now);
                best_effort(
                    "store refreshed tokens",
                    upsert_session_tokens(self.db.pool(), session_id, &tokens).await,
                );
                info!(session_id = %session_id, "Refreshed Reddit access token");
                Some(tokens.access_token)
            }
            Err(e) if e.is_revoked_grant() => {
                warn!(session_id = %session_id, "Refresh token rejected, session needs re-authorization: {e}");
                best_effort(
                    "clear revoked tokens",
                    clear_session_tokens(self.db.pool(), session_id).await,
                );
                None
            }
            Err(e) => {
                warn!(session_id = %session_id, "Token refresh failed: {e}");
                None
            }
        }
    }

    /// Fresh authorization URL for a session that needs to reconnect.
    ///
    /// # Errors
    ///
    /// Fails if the Reddit client id or redirect URI is not configured.
    pub fn reauthorize_url(&self, session_id: &str) -> Result<String, RedditError> {
        self.reddit.authorization_url(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_session_id() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
