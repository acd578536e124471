//! Settings database access
//!
//! Read/write settings from the settings table (key-value store).
//! All settings are global/system-wide (not user-specific).

use crate::{Error, Result};
use sqlx::{Pool, Sqlite, SqlitePool};
use std::str::FromStr;
use tracing::info;

/// Default approve threshold percentage for new votables
pub const DEFAULT_APPROVE_THRESHOLD: i64 = 50;
/// Default reject threshold percentage for new votables
pub const DEFAULT_REJECT_THRESHOLD: i64 = 50;
/// Default participation gate (0 = disabled)
pub const DEFAULT_PARTICIPATION_THRESHOLD: i64 = 0;
/// Days without a visit before a user stops counting as live
pub const DEFAULT_USER_INACTIVE_PERIOD_DAYS: i64 = 365;

/// Initialize or update default settings
///
/// Ensures all required settings exist with default values. Existing
/// non-NULL values are left alone.
pub async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, "default_approve_threshold", &DEFAULT_APPROVE_THRESHOLD.to_string()).await?;
    ensure_setting(pool, "default_reject_threshold", &DEFAULT_REJECT_THRESHOLD.to_string()).await?;
    ensure_setting(
        pool,
        "default_participation_threshold",
        &DEFAULT_PARTICIPATION_THRESHOLD.to_string(),
    )
    .await?;
    ensure_setting(
        pool,
        "user_inactive_period_days",
        &DEFAULT_USER_INACTIVE_PERIOD_DAYS.to_string(),
    )
    .await?;

    Ok(())
}

/// Ensure a setting exists with the specified default value
///
/// If the setting doesn't exist, it will be created with the default.
/// If the setting exists but has a NULL value, it will be reset to the default.
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM settings WHERE key = ?)")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if !exists {
        // INSERT OR IGNORE handles concurrent initialization race conditions:
        // multiple connections may pass the exists check simultaneously
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(default_value)
            .execute(pool)
            .await?;

        info!("Initialized setting '{}' with default value: {}", key, default_value);
        return Ok(());
    }

    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if value.is_none() {
        sqlx::query("UPDATE settings SET value = ? WHERE key = ?")
            .bind(default_value)
            .bind(key)
            .execute(pool)
            .await?;
    }

    Ok(())
}

/// Generic setting getter
///
/// Returns None if key doesn't exist in database.
/// Parses value from string using FromStr trait.
pub async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match value {
        Some(s) => match s.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::Config(format!(
                "Failed to parse setting '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

/// Generic setting setter
///
/// Inserts or updates setting in database.
pub async fn set_setting<T: ToString>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()> {
    let value_str = value.to_string();

    sqlx::query(
        r#"
        INSERT INTO settings (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value_str)
    .execute(db)
    .await?;

    Ok(())
}

/// Get the inactivity window used by the liveness sweep
pub async fn user_inactive_period_days(db: &Pool<Sqlite>) -> Result<i64> {
    Ok(get_setting::<i64>(db, "user_inactive_period_days")
        .await?
        .unwrap_or(DEFAULT_USER_INACTIVE_PERIOD_DAYS))
}
