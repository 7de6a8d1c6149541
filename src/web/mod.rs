mod error;
mod routes;
pub mod templates;

pub use error::ApiError;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::HeaderName;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::db::Database;
use crate::generation::{GeminiClient, GenerationService, TextGenerator};
use crate::reddit::{OAuthSessionManager, PostingService, RedditClient};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub generation: Arc<GenerationService>,
    pub sessions: OAuthSessionManager,
    pub posting: PostingService,
    /// Cancelled on server shutdown; open streams watch a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wire services around the given text generator.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(
        config: Config,
        db: Database,
        generator: Arc<dyn TextGenerator>,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let reddit = RedditClient::new(&config)?;
        let sessions = OAuthSessionManager::new(reddit.clone(), db.clone());
        let posting = PostingService::new(reddit, sessions.clone(), db.clone());
        let generation =
            GenerationService::new(generator, config.generation_models.clone(), db.clone());

        Ok(Self {
            db,
            config: Arc::new(config),
            generation: Arc::new(generation),
            sessions,
            posting,
            shutdown,
        })
    }

    /// Wire services with the Gemini generator from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn from_config(config: Config, db: Database, shutdown: CancellationToken) -> Result<Self> {
        let generator = Arc::new(GeminiClient::new(&config)?);
        Self::new(config, db, generator, shutdown)
    }
}

/// Start the web server; returns once `state.shutdown` is cancelled and
/// in-flight requests have finished.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn serve(state: AppState) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", state.config.web_host, state.config.web_port)
        .parse()
        .context("Invalid web server address")?;
    let shutdown = state.shutdown.clone();

    let app = create_app(state);

    info!(addr = %addr, "Starting HTTP web server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind web server")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Web server error")?;

    Ok(())
}

/// Create the main application router.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(routes::router())
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Any origin may call the API; preflights are answered with an empty body.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ])
}
