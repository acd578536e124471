//! Database schema migrations
//!
//! Versioned, idempotent migrations tracked in the schema_version table.
//! Guidelines: never modify an existing migration, add a new one for each
//! schema change, prefer ALTER TABLE over DROP/CREATE to preserve data.

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

/// Set schema version in database
async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        warn!("This may indicate a downgrade. Proceeding with caution.");
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    // Run migrations sequentially
    if current_version < 1 {
        // v1 is the baseline schema created by init::create_schema
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed (baseline schema)");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("✓ Migration v2 completed");
    }

    Ok(())
}

/// Migration v2: add the participation gate threshold
///
/// Databases created before the participation gate existed carry only the
/// approve/reject thresholds. Default 0 keeps the gate disabled, which
/// matches the old evaluation behavior exactly.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    let has_column: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('votables') WHERE name = 'participation_threshold'",
    )
    .fetch_one(pool)
    .await?;

    if has_column == 0 {
        sqlx::query(
            "ALTER TABLE votables ADD COLUMN participation_threshold INTEGER NOT NULL DEFAULT 0",
        )
        .execute(pool)
        .await?;
        info!("Migration v2: Added participation_threshold to votables table");
    }

    Ok(())
}
