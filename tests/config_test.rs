//! Configuration loading from the process environment.

use std::time::Duration;

use reddit_autoposter::config::{Config, ConfigError};
use serial_test::serial;

const VARS: &[&str] = &[
    "GEMINI_API_KEY",
    "GENERATION_MODELS",
    "REDDIT_CLIENT_ID",
    "REDDIT_CLIENT_SECRET",
    "REDDIT_REDIRECT_URI",
    "WEB_PORT",
    "TREND_INTERVAL_SECS",
    "STREAM_LIFETIME_SECS",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_defaults_without_credentials() {
    clear_env();

    let config = Config::from_env().unwrap();

    assert!(config.gemini_api_key.is_none());
    assert_eq!(config.generation_models[0], "gemini-2.0-flash-lite");
    assert_eq!(config.generation_models.len(), 5);
    assert_eq!(config.web_port, 8080);
    assert_eq!(config.trend_interval, Duration::from_secs(5));
    assert_eq!(config.keep_alive_interval, Duration::from_secs(15));
    assert_eq!(config.stream_lifetime, Duration::from_secs(300));
    assert!(matches!(
        config.reddit.client_credentials(),
        Err(ConfigError::MissingEnvVar(ref name)) if name == "REDDIT_CLIENT_ID"
    ));
    config.validate().unwrap();
}

#[test]
#[serial]
fn test_reads_credentials_and_overrides() {
    clear_env();
    std::env::set_var("GEMINI_API_KEY", "key-123");
    std::env::set_var("GENERATION_MODELS", "model-a, model-b,,");
    std::env::set_var("REDDIT_CLIENT_ID", "client");
    std::env::set_var("REDDIT_CLIENT_SECRET", "secret");
    std::env::set_var("REDDIT_REDIRECT_URI", "https://app.example.com/reddit-auth");
    std::env::set_var("TREND_INTERVAL_SECS", "2");

    let config = Config::from_env().unwrap();
    clear_env();

    assert_eq!(config.gemini_api_key.as_deref(), Some("key-123"));
    assert_eq!(config.generation_models, vec!["model-a", "model-b"]);
    assert_eq!(config.trend_interval, Duration::from_secs(2));
    assert_eq!(
        config.reddit.authorize_credentials().unwrap(),
        ("client", "https://app.example.com/reddit-auth")
    );
    assert_eq!(
        config.reddit.client_credentials().unwrap(),
        ("client", "secret")
    );
    assert!(!format!("{config:?}").contains("\"secret\""));
}

#[test]
#[serial]
fn test_invalid_number() {
    clear_env();
    std::env::set_var("WEB_PORT", "not-a-port");

    let result = Config::from_env();
    clear_env();

    assert!(matches!(
        result,
        Err(ConfigError::ParseInt { ref name, .. }) if name == "WEB_PORT"
    ));
}

#[test]
#[serial]
fn test_zero_lifetime_fails_validation() {
    clear_env();
    std::env::set_var("STREAM_LIFETIME_SECS", "0");

    let config = Config::from_env().unwrap();
    clear_env();

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidValue { ref name, .. }) if name == "STREAM_LIFETIME_SECS"
    ));
}
