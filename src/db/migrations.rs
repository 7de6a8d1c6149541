use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

/// Run all pending migrations.
pub async fn run(pool: &SqlitePool) -> Result<()> {
    create_migration_table(pool).await?;
    let current_version = get_schema_version(pool).await?;

    if current_version < 1 {
        debug!("Running migration v1");
        run_migration_v1(pool).await?;
        set_schema_version(pool, 1).await?;
    }

    Ok(())
}

async fn create_migration_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS _schema_version (
            version INTEGER PRIMARY KEY
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create schema version table")?;

    Ok(())
}

async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT version FROM _schema_version LIMIT 1")
        .fetch_optional(pool)
        .await
        .context("Failed to get schema version")?;

    Ok(row.map_or(0, |(v,)| v))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("DELETE FROM _schema_version")
        .execute(pool)
        .await?;
    sqlx::query("INSERT INTO _schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

async fn run_migration_v1(pool: &SqlitePool) -> Result<()> {
    debug!("Running migration v1: creating initial schema");

    // Generated posts. A post only counts as posted once Reddit has given it an id.
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS generated_posts (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            topic TEXT NOT NULL,
            tone TEXT,
            content_type TEXT,
            subreddit_hint TEXT,
            niches TEXT NOT NULL DEFAULT '[]',
            model TEXT NOT NULL,
            virality_score REAL NOT NULL,
            predicted_engagement TEXT NOT NULL,
            media_rec TEXT,
            posted_flag INTEGER NOT NULL DEFAULT 0,
            subreddit TEXT,
            reddit_post_id TEXT,
            posted_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            CHECK (posted_flag = 0 OR reddit_post_id IS NOT NULL)
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create generated_posts table")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_generated_posts_created ON generated_posts(created_at)",
    )
    .execute(pool)
    .await?;

    // One row per client session, upserted on every authorization or refresh
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS reddit_sessions (
            session_id TEXT PRIMARY KEY,
            access_token TEXT,
            refresh_token TEXT,
            scope TEXT,
            expires_at INTEGER,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create reddit_sessions table")?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS usage_logs (
            id TEXT PRIMARY KEY,
            api_type TEXT NOT NULL,
            model TEXT NOT NULL,
            tokens_used INTEGER NOT NULL,
            cost_estimate REAL NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create usage_logs table")?;

    Ok(())
}
