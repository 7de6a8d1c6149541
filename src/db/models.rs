use serde::{Deserialize, Serialize};

/// A stored AI-generated post.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GeneratedPostRecord {
    pub id: String,
    pub title: String,
    pub body: String,
    pub topic: String,
    pub tone: Option<String>,
    pub content_type: Option<String>,
    pub subreddit_hint: Option<String>,
    /// JSON array of niche names.
    pub niches: String,
    pub model: String,
    pub virality_score: f64,
    pub predicted_engagement: String,
    pub media_rec: Option<String>,
    pub posted_flag: bool,
    pub subreddit: Option<String>,
    pub reddit_post_id: Option<String>,
    pub posted_at: Option<String>,
    pub created_at: String,
}

impl GeneratedPostRecord {
    /// Decoded niche list; malformed JSON yields an empty list.
    #[must_use]
    pub fn niche_list(&self) -> Vec<String> {
        serde_json::from_str(&self.niches).unwrap_or_default()
    }
}

/// Data for inserting a generated post.
#[derive(Debug, Clone)]
pub struct NewGeneratedPost {
    pub id: String,
    pub title: String,
    pub body: String,
    pub topic: String,
    pub tone: Option<String>,
    pub content_type: Option<String>,
    pub subreddit_hint: Option<String>,
    pub niches: Vec<String>,
    pub model: String,
    pub virality_score: f64,
    pub predicted_engagement: String,
    pub media_rec: Option<String>,
}

/// OAuth credentials bound to one client session.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RedditSession {
    pub session_id: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    /// Unix seconds; `None` when the provider did not report an expiry.
    pub expires_at: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl RedditSession {
    /// Whether any token has been minted for this session.
    #[must_use]
    pub fn has_tokens(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
            || self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// The access token, unless missing or expiring within `skew_secs` of `now`.
    #[must_use]
    pub fn usable_access_token(&self, now: i64, skew_secs: i64) -> Option<&str> {
        let token = self.access_token.as_deref().filter(|t| !t.is_empty())?;
        match self.expires_at {
            Some(expires_at) if expires_at <= now + skew_secs => None,
            _ => Some(token),
        }
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Token pair written after a code exchange or refresh.
#[derive(Debug, Clone)]
pub struct NewSessionTokens {
    pub access_token: String,
    /// `None` keeps the previously stored refresh token.
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub expires_at: Option<i64>,
}

/// Data for a usage/cost log entry.
#[derive(Debug, Clone)]
pub struct NewUsageLog {
    pub api_type: String,
    pub model: String,
    pub tokens_used: i64,
    pub cost_estimate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(access: Option<&str>, refresh: Option<&str>, expires_at: Option<i64>) -> RedditSession {
        RedditSession {
            session_id: "s".to_string(),
            access_token: access.map(ToString::to_string),
            refresh_token: refresh.map(ToString::to_string),
            scope: None,
            expires_at,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_usable_access_token() {
        assert_eq!(session(Some("a"), None, None).usable_access_token(1_000, 60), Some("a"));
        assert_eq!(session(Some("a"), None, Some(2_000)).usable_access_token(1_000, 60), Some("a"));
        // Inside the skew window
        assert_eq!(session(Some("a"), None, Some(1_030)).usable_access_token(1_000, 60), None);
        assert_eq!(session(Some(""), None, None).usable_access_token(1_000, 60), None);
        assert_eq!(session(None, Some("r"), None).usable_access_token(1_000, 60), None);
    }

    #[test]
    fn test_has_tokens() {
        assert!(!session(None, None, None).has_tokens());
        assert!(session(None, Some("r"), None).has_tokens());
        assert!(session(Some("a"), None, None).has_tokens());
    }
}
