//! Tally recomputation
//!
//! A tally is a pure function of the ledger contents and the live user
//! population at read time. The cached columns on the votables table are a
//! materialized view of it: `recompute` rewrites them on every ledger
//! mutation inside the same transaction, so a stale cache is never
//! observable. Concurrent recomputes of the same votable are last-writer-
//! wins; the overwrite self-heals on the next vote because the computation
//! is deterministic.

use agora_common::db::models::Votable;
use agora_common::db::users::live_population;
use agora_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, Transaction};
use tracing::debug;

use crate::registry::VotableKind;
use crate::status::{self, Status, Thresholds};

/// Aggregated vote counts and derived percentages for one votable
///
/// Percentages are integer-valued. `participation_percentage` can exceed
/// 100 when voters have since gone inactive; it never goes negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub total_votes: i64,
    pub total_approve_votes: i64,
    pub total_reject_votes: i64,
    pub approval_percentage: i64,
    pub rejection_percentage: i64,
    pub participation_percentage: i64,
}

impl Tally {
    /// Compute a tally from raw counts and the live population size
    ///
    /// Zero votes and zero live users are ordinary values: both percentages
    /// degrade to 0 rather than dividing by zero.
    pub fn compute(total_approve_votes: i64, total_reject_votes: i64, live_users: i64) -> Tally {
        let total_votes = total_approve_votes + total_reject_votes;

        let participation_percentage = if live_users > 0 {
            100 * total_votes / live_users
        } else {
            0
        };
        let approval_percentage = if total_votes > 0 {
            100 * total_approve_votes / total_votes
        } else {
            0
        };
        let rejection_percentage = if total_votes > 0 {
            100 - approval_percentage
        } else {
            0
        };

        Tally {
            total_votes,
            total_approve_votes,
            total_reject_votes,
            approval_percentage,
            rejection_percentage,
            participation_percentage,
        }
    }

    /// Rebuild a tally from the cached columns of a votable row (no ledger
    /// read, no recompute)
    pub fn from_cached(votable: &Votable) -> Tally {
        Tally {
            total_votes: votable.total_votes,
            total_approve_votes: votable.total_approve_votes,
            total_reject_votes: votable.total_reject_votes,
            approval_percentage: votable.approval_percentage,
            rejection_percentage: if votable.total_votes > 0 {
                100 - votable.approval_percentage
            } else {
                0
            },
            participation_percentage: votable.participation_percentage,
        }
    }
}

/// Recompute the tally for one votable and persist it
///
/// Counts the live ledger rows, snapshots the live population, evaluates
/// the status machine and rewrites the cached columns, all through the
/// caller's transaction. Returns the fresh tally and the (possibly
/// unchanged) status.
pub async fn recompute(
    tx: &mut Transaction<'_, Sqlite>,
    votable: &Votable,
) -> Result<(Tally, Status)> {
    let kind: VotableKind = votable.kind.parse()?;

    // Re-read status and thresholds through the transaction. The caller's
    // snapshot may predate a concurrent administrative status change, and
    // evaluating against a stale Proposed would overwrite a committed
    // Alternative - the one state the evaluator must never touch.
    let row = crate::registry::fetch_votable(&mut **tx, kind, &votable.guid)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{} {}", kind, votable.guid)))?;

    let (approves, rejects): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COALESCE(SUM(CASE WHEN value = 1 THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN value = -1 THEN 1 ELSE 0 END), 0)
        FROM votes
        WHERE votable_kind = ? AND votable_id = ?
        "#,
    )
    .bind(&votable.kind)
    .bind(&votable.guid)
    .fetch_one(&mut **tx)
    .await?;

    // Snapshot, not transactionally joined to the vote: a user going
    // inactive mid-vote shifts the denominator by one either way
    let live_users = live_population(&mut **tx).await?;

    let tally = Tally::compute(approves, rejects, live_users);

    let current: Status = row.status.parse()?;
    let thresholds = Thresholds {
        approve: row.approve_threshold,
        reject: row.reject_threshold,
        participation: row.participation_threshold,
    };
    let next = status::evaluate(current, &tally, &thresholds);

    sqlx::query(
        r#"
        UPDATE votables
        SET participation_percentage = ?,
            approval_percentage = ?,
            total_votes = ?,
            total_approve_votes = ?,
            total_reject_votes = ?,
            status = ?,
            updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(tally.participation_percentage)
    .bind(tally.approval_percentage)
    .bind(tally.total_votes)
    .bind(tally.total_approve_votes)
    .bind(tally.total_reject_votes)
    .bind(next.as_str())
    .bind(chrono::Utc::now())
    .bind(&votable.guid)
    .execute(&mut **tx)
    .await?;

    debug!(
        kind = votable.kind.as_str(),
        id = votable.guid.as_str(),
        total = tally.total_votes,
        approval = tally.approval_percentage,
        participation = tally.participation_percentage,
        status = next.as_str(),
        "Recomputed tally"
    );

    Ok((tally, next))
}

/// Recompute outside of a vote submission (administrative repair, tests)
pub async fn recompute_standalone(
    pool: &sqlx::SqlitePool,
    kind: VotableKind,
    votable_id: &str,
) -> Result<(Tally, Status)> {
    let votable = crate::registry::resolve(pool, kind, votable_id).await?;
    let mut tx = pool.begin().await?;
    let result = recompute(&mut tx, &votable).await?;
    tx.commit().await?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentages_within_bounds() {
        for (a, r, live) in [(0, 0, 0), (0, 0, 5), (3, 1, 4), (1, 3, 4), (7, 7, 2), (1, 0, 1)] {
            let t = Tally::compute(a, r, live);
            assert!((0..=100).contains(&t.approval_percentage), "{:?}", t);
            assert!(t.participation_percentage >= 0, "{:?}", t);
            if t.total_votes > 0 {
                assert_eq!(t.approval_percentage + t.rejection_percentage, 100);
            } else {
                assert_eq!(t.approval_percentage, 0);
                assert_eq!(t.rejection_percentage, 0);
            }
        }
    }

    #[test]
    fn zero_votes_is_all_zeros() {
        let t = Tally::compute(0, 0, 10);
        assert_eq!(t.total_votes, 0);
        assert_eq!(t.approval_percentage, 0);
        assert_eq!(t.rejection_percentage, 0);
        assert_eq!(t.participation_percentage, 0);
    }

    #[test]
    fn zero_population_never_divides() {
        let t = Tally::compute(3, 2, 0);
        assert_eq!(t.total_votes, 5);
        assert_eq!(t.participation_percentage, 0);
        assert_eq!(t.approval_percentage, 60);
    }

    #[test]
    fn participation_can_exceed_one_hundred() {
        // 5 votes but only 2 users still live
        let t = Tally::compute(3, 2, 2);
        assert_eq!(t.participation_percentage, 250);
    }

    #[test]
    fn integer_percentages_truncate() {
        // 2/3 approval = 66 (truncated), rejection takes the remainder
        let t = Tally::compute(2, 1, 10);
        assert_eq!(t.approval_percentage, 66);
        assert_eq!(t.rejection_percentage, 34);
    }

    #[tokio::test]
    async fn recompute_with_stale_snapshot_keeps_sticky_alternative() {
        use crate::registry::{create_votable, resolve, set_status, NewVotable};
        use agora_common::db::init::init_memory_database;
        use agora_common::db::users::create_user;
        use chrono::Utc;

        let pool = init_memory_database().await.unwrap();
        let user = create_user(&pool, "ada", None).await.unwrap();
        let votable = create_votable(
            &pool,
            NewVotable::new(VotableKind::Keyword, &user.guid).label("entropy"),
        )
        .await
        .unwrap();

        // Snapshot taken while still Proposed, as cast() does before its
        // transaction opens
        let snapshot = resolve(&pool, VotableKind::Keyword, &votable.guid).await.unwrap();
        assert_eq!(snapshot.status, "Proposed");

        // A vote that would evaluate to Approved against the snapshot
        sqlx::query(
            "INSERT INTO votes (voter_id, votable_kind, votable_id, value, created_at) VALUES (?, 'keyword', ?, 1, ?)",
        )
        .bind(&user.guid)
        .bind(&votable.guid)
        .bind(Utc::now())
        .execute(&pool)
        .await
        .unwrap();

        // Administrative override commits between the snapshot and the
        // recompute transaction
        set_status(&pool, VotableKind::Keyword, &votable.guid, Status::Alternative)
            .await
            .unwrap();

        let mut tx = pool.begin().await.unwrap();
        let (tally, status) = recompute(&mut tx, &snapshot).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(tally.total_votes, 1);
        assert_eq!(status, Status::Alternative);

        let after = resolve(&pool, VotableKind::Keyword, &votable.guid).await.unwrap();
        assert_eq!(after.status, "Alternative");
    }
}
