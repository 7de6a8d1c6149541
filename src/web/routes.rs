use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{Stream, StreamExt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::error::ApiError;
use super::templates;
use super::AppState;
use crate::db::{list_generated_posts, GeneratedPostRecord};
use crate::generation::{GenerateRequest, GeneratedPost};
use crate::reddit::{CallbackError, PostOutcome, PostRequest, RedditError};
use crate::trends::{self, StreamCadence, TrendFrame, TrendSnapshot, TrendTicker, TrendsRequest};

/// Create the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate", post(generate))
        .route("/post", post(submit_post))
        .route("/reddit-auth", get(reddit_auth_callback).post(reddit_auth_action))
        .route("/trends-stream", get(trends_stream))
        .route("/trends", post(trends_snapshot))
        .route("/history", post(history))
        .route("/healthz", get(health))
}

// ========== Generation & posting ==========

async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GeneratedPost>, ApiError> {
    let Json(request) = payload?;
    let post = state.generation.generate(&request).await?;
    Ok(Json(post))
}

async fn submit_post(
    State(state): State<AppState>,
    payload: Result<Json<PostRequest>, JsonRejection>,
) -> Result<Json<PostOutcome>, ApiError> {
    let Json(request) = payload?;
    info!(
        post_id = %request.post_id,
        subreddit = %request.subreddit,
        auto_post = request.auto_post_toggle,
        consent = request.consent,
        "Post request"
    );
    let outcome = state.posting.post(&request).await?;
    Ok(Json(outcome))
}

// ========== Reddit OAuth ==========

#[derive(Debug, Deserialize)]
struct AuthAction {
    #[serde(default)]
    action: String,
    session_id: Option<String>,
}

async fn reddit_auth_action(
    State(state): State<AppState>,
    payload: Result<Json<AuthAction>, JsonRejection>,
) -> Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => return ApiError::from(rejection).into_response(),
    };

    match body.action.as_str() {
        "start" => match state.sessions.start(body.session_id.as_deref()).await {
            Ok(start) => Json(start).into_response(),
            Err(RedditError::NotConfigured(e)) => {
                warn!("Cannot start Reddit authorization: {e}");
                ApiError::bad_request("Reddit credentials not configured").into_response()
            }
            Err(e) => ApiError::internal(e.to_string()).into_response(),
        },
        "status" => {
            let connected = state.sessions.status(body.session_id.as_deref()).await;
            Json(json!({ "connected": connected })).into_response()
        }
        _ => ApiError::bad_request("Unknown action").into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// OAuth redirect target. Renders HTML for the popup window.
async fn reddit_auth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(error) = params.error {
        warn!(error = %error, "Reddit authorization denied");
        return (
            StatusCode::BAD_REQUEST,
            templates::render_failed(&format!("Reddit reported: {error}")),
        )
            .into_response();
    }

    let (Some(code), Some(session_id)) = (
        params.code.filter(|c| !c.is_empty()),
        params.state.filter(|s| !s.is_empty()),
    ) else {
        return (StatusCode::BAD_REQUEST, "Missing code or state").into_response();
    };

    match state.sessions.callback(&code, &session_id).await {
        Ok(()) => templates::render_connected().into_response(),
        Err(CallbackError::Exchange(RedditError::NotConfigured(e))) => {
            warn!("Cannot complete Reddit authorization: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Reddit credentials not configured",
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(session_id = %session_id, "Reddit OAuth callback failed: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                templates::render_failed("OAuth failed."),
            )
                .into_response()
        }
    }
}

// ========== Trends ==========

async fn trends_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let ticker = TrendTicker::new(
        StreamCadence::from(state.config.as_ref()),
        state.shutdown.child_token(),
        StdRng::from_entropy(),
    );
    info!("Trend stream opened");
    Sse::new(ticker.into_stream().map(frame_to_event))
}

fn frame_to_event(frame: TrendFrame) -> Result<Event, axum::Error> {
    match frame {
        TrendFrame::Event(event) => Event::default().json_data(&event),
        TrendFrame::KeepAlive => Ok(Event::default().comment("keep-alive")),
    }
}

async fn trends_snapshot(payload: Option<Json<TrendsRequest>>) -> Json<TrendSnapshot> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    let snapshot = trends::snapshot(&request, chrono::Utc::now(), &mut StdRng::from_entropy());
    Json(snapshot)
}

// ========== History ==========

#[derive(Debug, Default, Deserialize)]
struct HistoryRequest {
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
struct HistoryEntry {
    id: String,
    title: String,
    content: String,
    topic: String,
    tone: Option<String>,
    content_type: Option<String>,
    niches: Vec<String>,
    model: String,
    virality_score: f64,
    predicted_engagement: String,
    media_rec: Option<String>,
    posted_flag: bool,
    subreddit: Option<String>,
    reddit_post_id: Option<String>,
    posted_at: Option<String>,
    created_at: String,
}

impl From<GeneratedPostRecord> for HistoryEntry {
    fn from(post: GeneratedPostRecord) -> Self {
        Self {
            niches: post.niche_list(),
            id: post.id,
            title: post.title,
            content: post.body,
            topic: post.topic,
            tone: post.tone,
            content_type: post.content_type,
            model: post.model,
            virality_score: post.virality_score,
            predicted_engagement: post.predicted_engagement,
            media_rec: post.media_rec,
            posted_flag: post.posted_flag,
            subreddit: post.subreddit,
            reddit_post_id: post.reddit_post_id,
            posted_at: post.posted_at,
            created_at: post.created_at,
        }
    }
}

async fn history(
    State(state): State<AppState>,
    payload: Option<Json<HistoryRequest>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let limit = payload
        .and_then(|Json(r)| r.limit)
        .unwrap_or(50)
        .clamp(1, 500);

    let posts = list_generated_posts(state.db.pool(), limit)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load post history: {e:#}");
            ApiError::internal("Failed to load post history")
        })?;
    let posts: Vec<HistoryEntry> = posts.into_iter().map(HistoryEntry::from).collect();

    Ok(Json(json!({ "total": posts.len(), "posts": posts })))
}

async fn health() -> &'static str {
    "OK"
}
