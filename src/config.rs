use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::constants::{
    DEFAULT_GENERATION_MODELS, DEFAULT_USER_AGENT, GEMINI_BASE_URL, KEEP_ALIVE_INTERVAL,
    REDDIT_API_BASE_URL, REDDIT_AUTH_BASE_URL, REDDIT_SCOPES, STREAM_LIFETIME, TREND_INTERVAL,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Application configuration loaded from environment variables.
///
/// Built once at startup and shared read-only; nothing downstream touches the
/// process environment.
#[derive(Debug, Clone)]
pub struct Config {
    // Generation
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub generation_models: Vec<String>,

    // Reddit OAuth
    pub reddit: RedditConfig,

    // Database
    pub database_path: PathBuf,

    // Web Server
    pub web_host: String,
    pub web_port: u16,

    // Outbound HTTP
    pub http_timeout: Duration,

    // Trend stream
    pub trend_interval: Duration,
    pub keep_alive_interval: Duration,
    pub stream_lifetime: Duration,
}

/// Reddit application credentials and endpoints.
#[derive(Clone)]
pub struct RedditConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub auth_base_url: String,
    pub api_base_url: String,
    pub user_agent: String,
    pub scopes: Vec<String>,
}

impl fmt::Debug for RedditConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedditConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("redirect_uri", &self.redirect_uri)
            .field("auth_base_url", &self.auth_base_url)
            .field("api_base_url", &self.api_base_url)
            .field("user_agent", &self.user_agent)
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable holds an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Generation
            gemini_api_key: optional_env("GEMINI_API_KEY"),
            gemini_base_url: env_or_default("GEMINI_BASE_URL", GEMINI_BASE_URL),
            generation_models: optional_env("GENERATION_MODELS")
                .map_or_else(default_models, |v| parse_list(&v)),

            // Reddit OAuth
            reddit: RedditConfig {
                client_id: optional_env("REDDIT_CLIENT_ID"),
                client_secret: optional_env("REDDIT_CLIENT_SECRET"),
                redirect_uri: optional_env("REDDIT_REDIRECT_URI"),
                auth_base_url: env_or_default("REDDIT_AUTH_BASE_URL", REDDIT_AUTH_BASE_URL),
                api_base_url: env_or_default("REDDIT_API_BASE_URL", REDDIT_API_BASE_URL),
                user_agent: env_or_default("REDDIT_USER_AGENT", DEFAULT_USER_AGENT),
                scopes: REDDIT_SCOPES.iter().map(ToString::to_string).collect(),
            },

            // Database
            database_path: PathBuf::from(env_or_default(
                "DATABASE_PATH",
                "./data/autoposter.sqlite",
            )),

            // Web Server
            web_host: env_or_default("WEB_HOST", "0.0.0.0"),
            web_port: parse_env_u16("WEB_PORT", 8080)?,

            // Outbound HTTP
            http_timeout: Duration::from_secs(parse_env_u64("HTTP_TIMEOUT_SECS", 30)?),

            // Trend stream
            trend_interval: Duration::from_secs(parse_env_u64(
                "TREND_INTERVAL_SECS",
                TREND_INTERVAL.as_secs(),
            )?),
            keep_alive_interval: Duration::from_secs(parse_env_u64(
                "KEEP_ALIVE_INTERVAL_SECS",
                KEEP_ALIVE_INTERVAL.as_secs(),
            )?),
            stream_lifetime: Duration::from_secs(parse_env_u64(
                "STREAM_LIFETIME_SECS",
                STREAM_LIFETIME.as_secs(),
            )?),
        })
    }

    /// Configuration with local defaults and no credentials, for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            gemini_api_key: Some("test-key".to_string()),
            gemini_base_url: "http://127.0.0.1:9".to_string(),
            generation_models: default_models(),
            reddit: RedditConfig {
                client_id: Some("test-client".to_string()),
                client_secret: Some("test-secret".to_string()),
                redirect_uri: Some("http://localhost:8080/reddit-auth".to_string()),
                auth_base_url: "http://127.0.0.1:9".to_string(),
                api_base_url: "http://127.0.0.1:9".to_string(),
                user_agent: DEFAULT_USER_AGENT.to_string(),
                scopes: REDDIT_SCOPES.iter().map(ToString::to_string).collect(),
            },
            database_path: PathBuf::from(":memory:"),
            web_host: "127.0.0.1".to_string(),
            web_port: 8080,
            http_timeout: Duration::from_secs(5),
            trend_interval: TREND_INTERVAL,
            keep_alive_interval: KEEP_ALIVE_INTERVAL,
            stream_lifetime: STREAM_LIFETIME,
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation_models.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "GENERATION_MODELS".to_string(),
                message: "must list at least one model".to_string(),
            });
        }
        if self.web_port == 0 {
            return Err(ConfigError::InvalidValue {
                name: "WEB_PORT".to_string(),
                message: "must be non-zero".to_string(),
            });
        }
        for (name, value) in [
            ("HTTP_TIMEOUT_SECS", self.http_timeout),
            ("TREND_INTERVAL_SECS", self.trend_interval),
            ("KEEP_ALIVE_INTERVAL_SECS", self.keep_alive_interval),
            ("STREAM_LIFETIME_SECS", self.stream_lifetime),
        ] {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
        }
        Ok(())
    }
}

impl RedditConfig {
    /// Client id and redirect URI, needed to build an authorization URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] naming the first absent setting.
    pub fn authorize_credentials(&self) -> Result<(&str, &str), ConfigError> {
        let client_id = present(self.client_id.as_deref(), "REDDIT_CLIENT_ID")?;
        let redirect_uri = present(self.redirect_uri.as_deref(), "REDDIT_REDIRECT_URI")?;
        Ok((client_id, redirect_uri))
    }

    /// Client id and secret, needed for every call to the token endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] naming the first absent setting.
    pub fn client_credentials(&self) -> Result<(&str, &str), ConfigError> {
        let client_id = present(self.client_id.as_deref(), "REDDIT_CLIENT_ID")?;
        let secret = present(self.client_secret.as_deref(), "REDDIT_CLIENT_SECRET")?;
        Ok((client_id, secret))
    }
}

fn present<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, ConfigError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn default_models() -> Vec<String> {
    DEFAULT_GENERATION_MODELS
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        assert_eq!(
            parse_list("gemini-2.0-flash, gemini-pro,,"),
            vec!["gemini-2.0-flash".to_string(), "gemini-pro".to_string()]
        );
        assert!(parse_list(" , ").is_empty());
    }

    #[test]
    fn test_parse_u64_default() {
        assert_eq!(parse_env_u64("NONEXISTENT_VAR_U64", 42).unwrap(), 42);
    }

    #[test]
    fn test_validate_rejects_empty_model_list() {
        let config = Config {
            generation_models: Vec::new(),
            ..Config::for_testing()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { name, .. }) if name == "GENERATION_MODELS"
        ));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = Config {
            trend_interval: Duration::ZERO,
            ..Config::for_testing()
        };
        assert!(config.validate().is_err());
        assert!(Config::for_testing().validate().is_ok());
    }

    #[test]
    fn test_missing_reddit_credentials() {
        let mut reddit = Config::for_testing().reddit;
        reddit.client_secret = None;
        assert!(reddit.authorize_credentials().is_ok());
        assert!(matches!(
            reddit.client_credentials(),
            Err(ConfigError::MissingEnvVar(name)) if name == "REDDIT_CLIENT_SECRET"
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", Config::for_testing().reddit);
        assert!(!rendered.contains("test-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
