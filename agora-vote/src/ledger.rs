//! Vote ledger
//!
//! One row per (voter, votable). Casting upserts, NO_VOTE retracts by
//! deleting the row, and every successful cast recomputes the target's
//! cached tally before returning - all inside one transaction, so the
//! ledger and the cache commit together or not at all.

use agora_common::db::models::Vote;
use agora_common::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqlitePool};
use tracing::debug;

use crate::registry::{self, VotableKind};
use crate::status::Status;
use crate::tally::{self, Tally};

/// A voter's stance on one votable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteValue {
    Approve,
    Reject,
    /// Retraction: removes any existing vote
    NoVote,
}

impl VoteValue {
    /// Parse the wire domain {-1, 0, +1, absent}; absent means NO_VOTE
    ///
    /// Anything else is rejected before any ledger mutation.
    pub fn from_raw(raw: Option<i64>) -> Result<VoteValue> {
        match raw {
            Some(1) => Ok(VoteValue::Approve),
            Some(-1) => Ok(VoteValue::Reject),
            Some(0) | None => Ok(VoteValue::NoVote),
            Some(other) => Err(Error::InvalidVoteValue(other)),
        }
    }

    pub fn as_i64(&self) -> i64 {
        match self {
            VoteValue::Approve => 1,
            VoteValue::Reject => -1,
            VoteValue::NoVote => 0,
        }
    }
}

/// Result of a cast: the resulting vote row (None after retraction) plus
/// the fresh tally and status written in the same transaction
#[derive(Debug, Clone)]
pub struct CastOutcome {
    pub vote: Option<Vote>,
    pub tally: Tally,
    pub status: Status,
}

/// Cast, change or retract a vote
///
/// The target is validated before any mutation; unknown (kind, id) fails
/// with NotFound and leaves the ledger untouched. Re-voting overwrites the
/// value in place and PRESERVES the original created_at - the row records
/// when the voter first took a position, not when they last changed it.
/// Retracting when no vote exists is an idempotent no-op (the recompute
/// still runs, and still yields the same numbers).
pub async fn cast(
    pool: &SqlitePool,
    voter_id: &str,
    kind: VotableKind,
    votable_id: &str,
    value: VoteValue,
) -> Result<CastOutcome> {
    // Validate target exists before touching the ledger
    let votable = registry::resolve(pool, kind, votable_id).await?;

    let mut tx = pool.begin().await?;

    match value {
        VoteValue::NoVote => {
            sqlx::query(
                "DELETE FROM votes WHERE voter_id = ? AND votable_kind = ? AND votable_id = ?",
            )
            .bind(voter_id)
            .bind(kind.as_str())
            .bind(votable_id)
            .execute(&mut *tx)
            .await?;
        }
        VoteValue::Approve | VoteValue::Reject => {
            // Upsert absorbs the (voter, votable) uniqueness constraint:
            // a second cast updates the value and keeps created_at, so the
            // timestamp only applies on first insert
            let now = Utc::now();
            sqlx::query(
                r#"
                INSERT INTO votes (voter_id, votable_kind, votable_id, value, created_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(voter_id, votable_kind, votable_id)
                DO UPDATE SET value = excluded.value
                "#,
            )
            .bind(voter_id)
            .bind(kind.as_str())
            .bind(votable_id)
            .bind(value.as_i64())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
    }

    let (tally, status) = tally::recompute(&mut tx, &votable).await?;

    let vote = fetch_vote(&mut *tx, voter_id, kind, votable_id).await?;

    tx.commit().await?;

    debug!(
        voter = voter_id,
        kind = kind.as_str(),
        id = votable_id,
        value = value.as_i64(),
        "Vote cast"
    );

    Ok(CastOutcome {
        vote,
        tally,
        status,
    })
}

/// All live votes for one votable; ordering irrelevant
pub async fn votes_for(pool: &SqlitePool, kind: VotableKind, votable_id: &str) -> Result<Vec<Vote>> {
    let votes = sqlx::query_as::<_, Vote>(
        r#"
        SELECT voter_id, votable_kind, votable_id, value, created_at
        FROM votes
        WHERE votable_kind = ? AND votable_id = ?
        "#,
    )
    .bind(kind.as_str())
    .bind(votable_id)
    .fetch_all(pool)
    .await?;

    Ok(votes)
}

/// One voter's live vote for one votable, None when retracted or never cast
pub async fn vote_by(
    pool: &SqlitePool,
    voter_id: &str,
    kind: VotableKind,
    votable_id: &str,
) -> Result<Option<Vote>> {
    fetch_vote(pool, voter_id, kind, votable_id).await
}

async fn fetch_vote<'e, E>(
    executor: E,
    voter_id: &str,
    kind: VotableKind,
    votable_id: &str,
) -> Result<Option<Vote>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let vote = sqlx::query_as::<_, Vote>(
        r#"
        SELECT voter_id, votable_kind, votable_id, value, created_at
        FROM votes
        WHERE voter_id = ? AND votable_kind = ? AND votable_id = ?
        "#,
    )
    .bind(voter_id)
    .bind(kind.as_str())
    .bind(votable_id)
    .fetch_optional(executor)
    .await?;

    Ok(vote)
}
