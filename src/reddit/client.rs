//! Reddit OAuth and submission API client.

use anyhow::Context;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::{Config, ConfigError, RedditConfig};
use crate::db::NewSessionTokens;

#[derive(Debug, Error)]
pub enum RedditError {
    #[error(transparent)]
    NotConfigured(#[from] ConfigError),
    #[error("invalid Reddit endpoint URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("request to Reddit failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Reddit returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Reddit rejected the request: {0}")]
    Rejected(String),
}

impl RedditError {
    /// Whether Reddit refused the grant itself, as opposed to a transport
    /// failure or a server-side error worth retrying later.
    #[must_use]
    pub fn is_revoked_grant(&self) -> bool {
        match self {
            Self::Rejected(_) => true,
            Self::Status { status, .. } => (400..500).contains(status) && *status != 429,
            Self::NotConfigured(_) | Self::Url(_) | Self::Http(_) => false,
        }
    }
}

/// Tokens minted by the token endpoint.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub expires_in: Option<i64>,
}

impl TokenGrant {
    /// Storable form, with expiry made absolute against `now` (unix seconds).
    #[must_use]
    pub fn into_tokens(self, now: i64) -> NewSessionTokens {
        NewSessionTokens {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            scope: self.scope,
            expires_at: self.expires_in.map(|secs| now + secs),
        }
    }
}

/// Token endpoint body. Reddit reports some failures with a 200 and an `error` field.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    error: Option<String>,
}

/// A self (text) post to submit.
#[derive(Debug, Clone, Copy)]
pub struct Submission<'a> {
    pub subreddit: &'a str,
    pub title: &'a str,
    pub text: &'a str,
}

/// Reddit's acknowledgement of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedPost {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    json: SubmitJson,
}

#[derive(Debug, Deserialize)]
struct SubmitJson {
    #[serde(default)]
    errors: Vec<serde_json::Value>,
    #[serde(default)]
    data: Option<SubmitData>,
}

#[derive(Debug, Deserialize)]
struct SubmitData {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Reddit API client.
#[derive(Clone)]
pub struct RedditClient {
    http: Client,
    config: RedditConfig,
}

impl RedditClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(config.reddit.user_agent.clone())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            config: config.reddit.clone(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &RedditConfig {
        &self.config
    }

    /// Authorization URL for the consent screen, with `state` echoed back on redirect.
    ///
    /// # Errors
    ///
    /// Fails if the client id or redirect URI is not configured.
    pub fn authorization_url(&self, state: &str) -> Result<String, RedditError> {
        let (client_id, redirect_uri) = self.config.authorize_credentials()?;
        let mut url = Url::parse(&format!(
            "{}/api/v1/authorize",
            self.config.auth_base_url.trim_end_matches('/')
        ))?;
        url.query_pairs_mut()
            .append_pair("client_id", client_id)
            .append_pair("response_type", "code")
            .append_pair("state", state)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("duration", "permanent")
            .append_pair("scope", &self.config.scopes.join(" "));
        Ok(url.into())
    }

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Fails on missing credentials, transport errors or a rejected code.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant, RedditError> {
        let (_, redirect_uri) = self.config.authorize_credentials()?;
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ])
        .await
    }

    /// Mint a new access token from a refresh token.
    ///
    /// # Errors
    ///
    /// Fails on missing credentials, transport errors or a revoked token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, RedditError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenGrant, RedditError> {
        let (client_id, client_secret) = self.config.client_credentials()?;
        let url = format!(
            "{}/api/v1/access_token",
            self.config.auth_base_url.trim_end_matches('/')
        );

        let response = self
            .http
            .post(&url)
            .basic_auth(client_id, Some(client_secret))
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(response).await);
        }

        let body: TokenResponse = response.json().await?;
        if let Some(error) = body.error {
            return Err(RedditError::Rejected(error));
        }
        let access_token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RedditError::Rejected("token response had no access_token".to_string()))?;

        Ok(TokenGrant {
            access_token,
            refresh_token: body.refresh_token.filter(|t| !t.is_empty()),
            scope: body.scope,
            expires_in: body.expires_in,
        })
    }

    /// Submit a self post on behalf of the token's owner.
    ///
    /// # Errors
    ///
    /// Fails on a non-success status, validation errors reported by Reddit,
    /// or a response without a post id.
    pub async fn submit_self_post(
        &self,
        access_token: &str,
        submission: &Submission<'_>,
    ) -> Result<SubmittedPost, RedditError> {
        let url = format!("{}/api/submit", self.config.api_base_url.trim_end_matches('/'));
        debug!(subreddit = %submission.subreddit, "Submitting self post");

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .form(&[
                ("api_type", "json"),
                ("kind", "self"),
                ("sr", submission.subreddit),
                ("title", submission.title),
                ("text", submission.text),
                ("resubmit", "true"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(response).await);
        }

        let body: SubmitResponse = response.json().await?;
        if !body.json.errors.is_empty() {
            return Err(RedditError::Rejected(describe_errors(&body.json.errors)));
        }
        let data = body
            .json
            .data
            .ok_or_else(|| RedditError::Rejected("submission response had no data".to_string()))?;
        let id = data
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| RedditError::Rejected("submission response had no post id".to_string()))?;

        Ok(SubmittedPost { id, url: data.url })
    }
}

async fn status_error(response: reqwest::Response) -> RedditError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown".to_string());
    RedditError::Status {
        status,
        body: body.chars().take(500).collect(),
    }
}

/// Flatten `[["CODE", "message", "field"], ...]` into `CODE: message; ...`.
fn describe_errors(errors: &[serde_json::Value]) -> String {
    errors
        .iter()
        .map(|e| match e.as_array() {
            Some(parts) => {
                let parts: Vec<&str> = parts.iter().filter_map(serde_json::Value::as_str).take(2).collect();
                parts.join(": ")
            }
            None => e.to_string(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}
