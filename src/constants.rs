//! Shared constants used across the application.

use std::time::Duration;

/// User agent sent to Reddit. Reddit rejects generic agents on its OAuth API.
pub const DEFAULT_USER_AGENT: &str = "web:reddit-autoposter:v0.1.0 (by /u/reddit-autoposter)";

/// Generative Language API host.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Candidate generation models, tried in order. Newest and cheapest first,
/// the oldest general-purpose model last.
pub const DEFAULT_GENERATION_MODELS: &[&str] = &[
    "gemini-2.0-flash-lite",
    "gemini-2.0-flash",
    "gemini-1.5-flash",
    "gemini-1.5-pro",
    "gemini-pro",
];

/// Host serving the OAuth authorize and token endpoints.
pub const REDDIT_AUTH_BASE_URL: &str = "https://www.reddit.com";

/// Host serving authenticated API calls (bearer token).
pub const REDDIT_API_BASE_URL: &str = "https://oauth.reddit.com";

/// Public site used for manual-posting deep links.
pub const REDDIT_WEB_URL: &str = "https://reddit.com";

/// OAuth scopes requested when connecting an account.
pub const REDDIT_SCOPES: &[&str] = &["submit", "identity"];

/// Access tokens this close to expiry are refreshed before use.
pub const TOKEN_EXPIRY_SKEW: Duration = Duration::from_secs(60);

/// Flat per-generation cost estimate reported to the dashboard.
pub const GENERATION_COST_ESTIMATE: f64 = 0.02;

/// Footer appended to manually shared posts.
pub const MANUAL_POST_FOOTER: &str = "---\n*Generated with AI*";

/// Trend stream cadence.
pub const TREND_INTERVAL: Duration = Duration::from_secs(5);
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);
pub const STREAM_LIFETIME: Duration = Duration::from_secs(5 * 60);
