//! Manual sharing and consented auto-posting of generated posts.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::client::{RedditClient, RedditError, Submission};
use super::oauth::OAuthSessionManager;
use crate::config::ConfigError;
use crate::constants::{MANUAL_POST_FOOTER, REDDIT_WEB_URL};
use crate::db::{best_effort, get_generated_post, mark_post_submitted, Database};

/// Body of a post request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostRequest {
    #[serde(default)]
    pub post_id: String,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub auto_post_toggle: bool,
    #[serde(default)]
    pub consent: bool,
    pub title: Option<String>,
    pub content: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostOutcome {
    /// Copy/paste content plus a pre-filled submit link.
    Manual {
        formatted_content: String,
        instructions: String,
        subreddit_url: String,
    },
    /// The session has no usable token; the client should reconnect or
    /// fall back to `manual_option`.
    OauthRequired {
        oauth_url: String,
        message: String,
        manual_option: ManualOption,
    },
    Posted {
        reddit_post_id: String,
        message: String,
        url: Option<String>,
    },
}

/// Copy/paste fallback offered alongside a reconnect prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManualOption {
    pub formatted_content: String,
    pub subreddit_url: String,
}

impl ManualOption {
    #[must_use]
    pub fn new(subreddit: &str, title: &str, content: &str) -> Self {
        Self {
            formatted_content: format!("**{title}**\n\n{content}\n\n{MANUAL_POST_FOOTER}"),
            subreddit_url: format!(
                "{REDDIT_WEB_URL}/r/{subreddit}/submit?selftext=true&title={}&text={}",
                urlencoding::encode(title),
                urlencoding::encode(content)
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum PostError {
    #[error("Consent required for auto-posting")]
    ConsentRequired,
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Reddit API credentials not configured. Please use manual posting.")]
    NotConfigured(#[source] ConfigError),
    #[error("could not build Reddit authorization URL: {0}")]
    Authorization(#[source] RedditError),
    #[error("Reddit submission failed: {0}. Please use manual posting instead.")]
    Submission(#[source] RedditError),
}

#[derive(Clone)]
pub struct PostingService {
    reddit: RedditClient,
    sessions: OAuthSessionManager,
    db: Database,
}

impl PostingService {
    #[must_use]
    pub fn new(reddit: RedditClient, sessions: OAuthSessionManager, db: Database) -> Self {
        Self {
            reddit,
            sessions,
            db,
        }
    }

    /// Share or submit a generated post.
    ///
    /// At most one submission is attempted; failures are not retried.
    ///
    /// # Errors
    ///
    /// Fails on missing consent or fields, missing Reddit credentials, or a
    /// submission Reddit rejects. A missing token is not an error: it yields
    /// [`PostOutcome::OauthRequired`].
    pub async fn post(&self, request: &PostRequest) -> Result<PostOutcome, PostError> {
        if request.auto_post_toggle && !request.consent {
            return Err(PostError::ConsentRequired);
        }

        let subreddit = normalize_subreddit(&request.subreddit);
        if subreddit.is_empty() {
            return Err(PostError::InvalidRequest("subreddit is required".to_string()));
        }
        let (title, content) = self.resolve_content(request).await;

        if !request.auto_post_toggle {
            return Ok(manual_outcome(subreddit, &title, &content));
        }

        let session_id = request
            .session_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                PostError::InvalidRequest("session_id is required for auto-posting".to_string())
            })?;
        let config = self.reddit.config();
        config.client_credentials().map_err(PostError::NotConfigured)?;
        config.authorize_credentials().map_err(PostError::NotConfigured)?;
        if title.trim().is_empty() {
            return Err(PostError::InvalidRequest(
                "title is required for auto-posting".to_string(),
            ));
        }

        let Some(access_token) = self.sessions.resolve_access_token(session_id).await else {
            let oauth_url = self
                .sessions
                .reauthorize_url(session_id)
                .map_err(PostError::Authorization)?;
            info!(session_id = %session_id, "Auto-post needs Reddit authorization");
            return Ok(PostOutcome::OauthRequired {
                oauth_url,
                message: "Connect your Reddit account to enable auto-posting.".to_string(),
                manual_option: ManualOption::new(subreddit, &title, &content),
            });
        };

        let submission = Submission {
            subreddit,
            title: &title,
            text: &content,
        };
        let submitted = self
            .reddit
            .submit_self_post(&access_token, &submission)
            .await
            .map_err(|e| {
                warn!(post_id = %request.post_id, subreddit = %subreddit, "Submission failed: {e}");
                PostError::Submission(e)
            })?;
        info!(
            post_id = %request.post_id,
            subreddit = %subreddit,
            reddit_post_id = %submitted.id,
            "Posted to Reddit"
        );

        if !request.post_id.is_empty() {
            let updated = best_effort(
                "mark post submitted",
                mark_post_submitted(self.db.pool(), &request.post_id, subreddit, &submitted.id).await,
            );
            if updated == Some(false) {
                warn!(post_id = %request.post_id, "Posted content has no stored record");
            }
        }

        Ok(PostOutcome::Posted {
            message: format!("Posted to r/{subreddit}"),
            reddit_post_id: submitted.id,
            url: submitted.url,
        })
    }

    /// Title and body from the request, falling back to the stored post.
    async fn resolve_content(&self, request: &PostRequest) -> (String, String) {
        if let (Some(title), Some(content)) = (&request.title, &request.content) {
            return (title.clone(), content.clone());
        }

        let stored = if request.post_id.is_empty() {
            None
        } else {
            best_effort(
                "load generated post",
                get_generated_post(self.db.pool(), &request.post_id).await,
            )
            .flatten()
        };

        let title = request
            .title
            .clone()
            .or_else(|| stored.as_ref().map(|p| p.title.clone()))
            .unwrap_or_default();
        let content = request
            .content
            .clone()
            .or_else(|| stored.map(|p| p.body))
            .unwrap_or_default();
        (title, content)
    }
}

/// Copy/paste block and deep link. Never touches the network.
#[must_use]
pub fn manual_outcome(subreddit: &str, title: &str, content: &str) -> PostOutcome {
    let ManualOption {
        formatted_content,
        subreddit_url,
    } = ManualOption::new(subreddit, title, content);
    PostOutcome::Manual {
        formatted_content,
        instructions: format!("Copy the content above and manually post to r/{subreddit}"),
        subreddit_url,
    }
}

/// `r/rust`, `/r/rust/` and `rust` all name the same subreddit.
#[must_use]
pub fn normalize_subreddit(name: &str) -> &str {
    let name = name.trim().trim_matches('/');
    name.strip_prefix("r/").unwrap_or(name).trim()
}
