use anyhow::{Context, Result};
use sqlx::SqlitePool;

use super::models::{
    GeneratedPostRecord, NewGeneratedPost, NewSessionTokens, NewUsageLog, RedditSession,
};

// ========== Generated posts ==========

/// Insert a freshly generated post. `posted_flag` starts false.
pub async fn insert_generated_post(pool: &SqlitePool, post: &NewGeneratedPost) -> Result<()> {
    let niches = serde_json::to_string(&post.niches).context("Failed to encode niches")?;

    sqlx::query(
        r"
        INSERT INTO generated_posts
            (id, title, body, topic, tone, content_type, subreddit_hint, niches, model,
             virality_score, predicted_engagement, media_rec)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(&post.id)
    .bind(&post.title)
    .bind(&post.body)
    .bind(&post.topic)
    .bind(&post.tone)
    .bind(&post.content_type)
    .bind(&post.subreddit_hint)
    .bind(niches)
    .bind(&post.model)
    .bind(post.virality_score)
    .bind(&post.predicted_engagement)
    .bind(&post.media_rec)
    .execute(pool)
    .await
    .context("Failed to insert generated post")?;

    Ok(())
}

/// Get a generated post by id.
pub async fn get_generated_post(pool: &SqlitePool, id: &str) -> Result<Option<GeneratedPostRecord>> {
    sqlx::query_as("SELECT * FROM generated_posts WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch generated post")
}

/// Most recent generated posts, newest first.
pub async fn list_generated_posts(pool: &SqlitePool, limit: i64) -> Result<Vec<GeneratedPostRecord>> {
    sqlx::query_as("SELECT * FROM generated_posts ORDER BY created_at DESC, rowid DESC LIMIT ?")
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to list generated posts")
}

/// Record a confirmed Reddit submission.
///
/// Returns `false` when no post with that id exists.
pub async fn mark_post_submitted(
    pool: &SqlitePool,
    id: &str,
    subreddit: &str,
    reddit_post_id: &str,
) -> Result<bool> {
    let result = sqlx::query(
        r"
        UPDATE generated_posts
        SET posted_flag = 1, subreddit = ?, reddit_post_id = ?, posted_at = datetime('now')
        WHERE id = ?
        ",
    )
    .bind(subreddit)
    .bind(reddit_post_id)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to mark post as submitted")?;

    Ok(result.rows_affected() > 0)
}

// ========== Usage logs ==========

pub async fn insert_usage_log(pool: &SqlitePool, log: &NewUsageLog) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO usage_logs (id, api_type, model, tokens_used, cost_estimate)
        VALUES (?, ?, ?, ?, ?)
        ",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(&log.api_type)
    .bind(&log.model)
    .bind(log.tokens_used)
    .bind(log.cost_estimate)
    .execute(pool)
    .await
    .context("Failed to insert usage log")?;

    Ok(())
}

// ========== Reddit sessions ==========

/// Record a session awaiting authorization. Existing rows are left alone.
pub async fn begin_session(pool: &SqlitePool, session_id: &str) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO reddit_sessions (session_id) VALUES (?)")
        .bind(session_id)
        .execute(pool)
        .await
        .context("Failed to record pending session")?;
    Ok(())
}

/// Insert or overwrite the tokens for a session.
pub async fn upsert_session_tokens(
    pool: &SqlitePool,
    session_id: &str,
    tokens: &NewSessionTokens,
) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO reddit_sessions (session_id, access_token, refresh_token, scope, expires_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(session_id) DO UPDATE SET
            access_token = excluded.access_token,
            refresh_token = COALESCE(excluded.refresh_token, reddit_sessions.refresh_token),
            scope = COALESCE(excluded.scope, reddit_sessions.scope),
            expires_at = excluded.expires_at,
            updated_at = datetime('now')
        ",
    )
    .bind(session_id)
    .bind(&tokens.access_token)
    .bind(&tokens.refresh_token)
    .bind(&tokens.scope)
    .bind(tokens.expires_at)
    .execute(pool)
    .await
    .context("Failed to store session tokens")?;

    Ok(())
}

pub async fn get_session(pool: &SqlitePool, session_id: &str) -> Result<Option<RedditSession>> {
    sqlx::query_as("SELECT * FROM reddit_sessions WHERE session_id = ?")
        .bind(session_id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch session")
}

/// Drop an unusable access token so the session reads as awaiting authorization.
pub async fn clear_access_token(pool: &SqlitePool, session_id: &str) -> Result<()> {
    sqlx::query(
        r"
        UPDATE reddit_sessions
        SET access_token = NULL, expires_at = NULL, updated_at = datetime('now')
        WHERE session_id = ?
        ",
    )
    .bind(session_id)
    .execute(pool)
    .await
    .context("Failed to clear access token")?;

    Ok(())
}

/// Drop every token for a session whose refresh token was revoked.
pub async fn clear_session_tokens(pool: &SqlitePool, session_id: &str) -> Result<()> {
    sqlx::query(
        r"
        UPDATE reddit_sessions
        SET access_token = NULL, refresh_token = NULL, expires_at = NULL,
            updated_at = datetime('now')
        WHERE session_id = ?
        ",
    )
    .bind(session_id)
    .execute(pool)
    .await
    .context("Failed to clear session tokens")?;

    Ok(())
}
