//! User liveness queries
//!
//! The voting core consumes the live-population count as the participation
//! denominator. Liveness itself is maintained by two explicit calls made
//! from outside the core: `touch_last_seen` (login collaborator) and
//! `sweep_liveness` (the agora-sweep job). The core never drives either.

use crate::db::models::User;
use crate::{Error, Result};
use chrono::{Duration, Utc};
use sqlx::{Sqlite, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

/// Outcome of one liveness sweep run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Total users examined
    pub total_users: i64,
    /// Users flipped live -> inactive this run
    pub marked_inactive: i64,
    /// Users flipped inactive -> live this run
    pub marked_live: i64,
}

/// Count users currently considered live (the participation denominator)
///
/// Takes any executor so the tally engine can read the snapshot inside its
/// vote transaction.
pub async fn live_population<'e, E>(executor: E) -> Result<i64>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_live = 1")
        .fetch_one(executor)
        .await?;

    Ok(count)
}

/// Create a user record
pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    preferred_name: Option<&str>,
) -> Result<User> {
    let guid = Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO users (guid, username, preferred_name, is_live, last_seen_at, created_at, updated_at)
        VALUES (?, ?, ?, 1, ?, ?, ?)
        "#,
    )
    .bind(&guid)
    .bind(username)
    .bind(preferred_name)
    .bind(now)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get_user(pool, &guid).await
}

/// Fetch a user by guid
pub async fn get_user(pool: &SqlitePool, guid: &str) -> Result<User> {
    sqlx::query_as::<_, User>(
        "SELECT guid, username, preferred_name, is_live, last_seen_at, created_at FROM users WHERE guid = ?",
    )
    .bind(guid)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("user {}", guid)))
}

/// Record a visit: refresh last_seen_at and mark the user live
///
/// This is the explicit call the login collaborator makes, replacing the
/// login-signal side effect of earlier designs.
pub async fn touch_last_seen(pool: &SqlitePool, user_guid: &str) -> Result<()> {
    let result = sqlx::query(
        "UPDATE users SET last_seen_at = ?, is_live = 1, updated_at = ? WHERE guid = ?",
    )
    .bind(Utc::now())
    .bind(Utc::now())
    .bind(user_guid)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("user {}", user_guid)));
    }

    debug!("Touched last_seen for user {}", user_guid);
    Ok(())
}

/// Mark users inactive/live based on their last visit
///
/// Users unseen for more than `window_days` become inactive; anyone seen
/// within the window becomes live again. Idempotent: a second run over the
/// same data changes nothing.
pub async fn sweep_liveness(pool: &SqlitePool, window_days: i64) -> Result<SweepReport> {
    let cutoff = Utc::now() - Duration::days(window_days);

    let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    let marked_inactive = sqlx::query(
        "UPDATE users SET is_live = 0, updated_at = ? WHERE is_live = 1 AND last_seen_at < ?",
    )
    .bind(Utc::now())
    .bind(cutoff)
    .execute(pool)
    .await?
    .rows_affected() as i64;

    let marked_live = sqlx::query(
        "UPDATE users SET is_live = 1, updated_at = ? WHERE is_live = 0 AND last_seen_at >= ?",
    )
    .bind(Utc::now())
    .bind(cutoff)
    .execute(pool)
    .await?
    .rows_affected() as i64;

    let report = SweepReport {
        total_users,
        marked_inactive,
        marked_live,
    };

    info!(
        "Liveness sweep: {} users, {} marked inactive, {} marked live (window {} days)",
        report.total_users, report.marked_inactive, report.marked_live, window_days
    );

    Ok(report)
}

/// Preview what a sweep would change, without writing
pub async fn sweep_liveness_dry_run(pool: &SqlitePool, window_days: i64) -> Result<SweepReport> {
    let cutoff = Utc::now() - Duration::days(window_days);

    let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    let marked_inactive: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM users WHERE is_live = 1 AND last_seen_at < ?",
    )
    .bind(cutoff)
    .fetch_one(pool)
    .await?;

    let marked_live: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM users WHERE is_live = 0 AND last_seen_at >= ?",
    )
    .bind(cutoff)
    .fetch_one(pool)
    .await?;

    Ok(SweepReport {
        total_users,
        marked_inactive,
        marked_live,
    })
}
