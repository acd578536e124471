//! Database initialization
//!
//! Creates the database on first run, applies the schema idempotently and
//! seeds default settings. Safe to call on every startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use sqlite options to create database if it doesn't exist
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL mode allows concurrent readers with one writer, which covers the
    // concurrent-voting access pattern (many readers, short write bursts)
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    // Set busy timeout so contending vote transactions wait instead of failing
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Initialize an in-memory database with the full schema (tests, tooling)
///
/// The pool is capped at one connection: every connection to
/// `sqlite::memory:` gets its own private database, so a larger pool would
/// hand out empty databases.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Apply the full schema: tables, indexes, migrations, default settings
///
/// Idempotent - safe to call multiple times.
async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_users_table(pool).await?;
    create_settings_table(pool).await?;
    create_votables_table(pool).await?;
    create_votes_table(pool).await?;

    // Manual migrations run after CREATE TABLE IF NOT EXISTS
    crate::db::migrations::run_migrations(pool).await?;

    // Seed default settings last so migrations may adjust them first
    crate::db::settings::init_default_settings(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            guid TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            preferred_name TEXT,
            is_live INTEGER NOT NULL DEFAULT 1,
            last_seen_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_is_live ON users(is_live)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_last_seen ON users(last_seen_at)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores application configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the votables table
///
/// One table for all votable kinds (tagged union). Kind-specific payload
/// lives in the nullable `label` / `body` / `answer_type` columns. The
/// cached tally columns are a materialized view of the votes table and are
/// rewritten on every recompute.
pub async fn create_votables_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS votables (
            guid TEXT PRIMARY KEY,
            kind TEXT NOT NULL CHECK (kind IN ('keyword', 'definition', 'question', 'question_tag', 'answer_binary')),
            creator_id TEXT NOT NULL REFERENCES users(guid),
            status TEXT NOT NULL DEFAULT 'Proposed' CHECK (status IN ('Proposed', 'Approved', 'Rejected', 'Alternative')),
            parent_id TEXT REFERENCES votables(guid),
            label TEXT,
            body TEXT,
            answer_type TEXT CHECK (answer_type IS NULL OR answer_type IN ('BINARY', 'SCALE_DECIMAL', 'SCALE_INT')),
            approve_threshold INTEGER NOT NULL DEFAULT 50,
            reject_threshold INTEGER NOT NULL DEFAULT 50,
            participation_threshold INTEGER NOT NULL DEFAULT 0,
            participation_percentage INTEGER NOT NULL DEFAULT 0,
            approval_percentage INTEGER NOT NULL DEFAULT 0,
            total_votes INTEGER NOT NULL DEFAULT 0,
            total_approve_votes INTEGER NOT NULL DEFAULT 0,
            total_reject_votes INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (approve_threshold >= 0 AND approve_threshold <= 100),
            CHECK (reject_threshold >= 0 AND reject_threshold <= 100),
            CHECK (participation_threshold >= 0 AND participation_threshold <= 100),
            CHECK (total_votes >= 0),
            CHECK (total_approve_votes >= 0),
            CHECK (total_reject_votes >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_votables_kind_label ON votables(kind, label)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_votables_parent ON votables(parent_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_votables_status ON votables(status)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the votes table
///
/// One row per (voter, votable); NO_VOTE is represented by row absence.
pub async fn create_votes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS votes (
            voter_id TEXT NOT NULL REFERENCES users(guid),
            votable_kind TEXT NOT NULL,
            votable_id TEXT NOT NULL REFERENCES votables(guid),
            value INTEGER NOT NULL CHECK (value IN (-1, 1)),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (voter_id, votable_kind, votable_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_votes_votable ON votes(votable_kind, votable_id)")
        .execute(pool)
        .await?;

    Ok(())
}
