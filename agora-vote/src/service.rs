//! Operations surface for external collaborators
//!
//! The web layer (out of scope here) calls these three operations and
//! renders the results. Shapes mirror what it serializes to the browser:
//! a vote receipt with the fresh tally plus the caller's own vote label.

use agora_common::Result;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::fmt;

use crate::ledger::{self, VoteValue};
use crate::registry::{self, VotableKind};
use crate::status::Status;
use crate::tally::Tally;

/// A voter's stance as displayed to them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteLabel {
    #[serde(rename = "Approve")]
    Approve,
    #[serde(rename = "Reject")]
    Reject,
    #[serde(rename = "No Vote")]
    NoVote,
}

impl VoteLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteLabel::Approve => "Approve",
            VoteLabel::Reject => "Reject",
            VoteLabel::NoVote => "No Vote",
        }
    }

    fn from_value(value: i64) -> VoteLabel {
        match value {
            1 => VoteLabel::Approve,
            -1 => VoteLabel::Reject,
            _ => VoteLabel::NoVote,
        }
    }
}

impl fmt::Display for VoteLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot returned to the caller after a vote submission
#[derive(Debug, Clone, Serialize)]
pub struct VoteReceipt {
    pub status: Status,
    #[serde(flatten)]
    pub tally: Tally,
    pub user_vote: VoteLabel,
}

/// Cast a vote on behalf of a user
///
/// `raw_value` uses the wire domain: +1 approve, -1 reject, 0 or absent
/// retracts. Validation happens before any mutation; the returned receipt
/// reflects the committed state, so the caller never needs a follow-up
/// read.
pub async fn cast_vote(
    pool: &SqlitePool,
    acting_user: &str,
    kind: VotableKind,
    votable_id: &str,
    raw_value: Option<i64>,
) -> Result<VoteReceipt> {
    let value = VoteValue::from_raw(raw_value)?;
    let outcome = ledger::cast(pool, acting_user, kind, votable_id, value).await?;

    let user_vote = match &outcome.vote {
        Some(vote) => VoteLabel::from_value(vote.value),
        None => VoteLabel::NoVote,
    };

    Ok(VoteReceipt {
        status: outcome.status,
        tally: outcome.tally,
        user_vote,
    })
}

/// Read the cached tally fields; no recompute
pub async fn get_tally(pool: &SqlitePool, kind: VotableKind, votable_id: &str) -> Result<Tally> {
    let votable = registry::resolve(pool, kind, votable_id).await?;
    Ok(Tally::from_cached(&votable))
}

/// Read one user's own vote label
pub async fn get_user_vote(
    pool: &SqlitePool,
    acting_user: &str,
    kind: VotableKind,
    votable_id: &str,
) -> Result<VoteLabel> {
    // Resolve first so an unknown target surfaces as NotFound, not "No Vote"
    registry::resolve(pool, kind, votable_id).await?;

    let label = match ledger::vote_by(pool, acting_user, kind, votable_id).await? {
        Some(vote) => VoteLabel::from_value(vote.value),
        None => VoteLabel::NoVote,
    };

    Ok(label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{create_votable, NewVotable};
    use agora_common::db::init::init_memory_database;
    use agora_common::db::users::create_user;
    use agora_common::Error;

    #[tokio::test]
    async fn receipt_serializes_with_flat_tally_and_label() {
        let pool = init_memory_database().await.unwrap();
        let user = create_user(&pool, "ada", None).await.unwrap();
        let votable = create_votable(
            &pool,
            NewVotable::new(VotableKind::Keyword, &user.guid).label("entropy"),
        )
        .await
        .unwrap();

        let receipt = cast_vote(&pool, &user.guid, VotableKind::Keyword, &votable.guid, Some(1))
            .await
            .unwrap();

        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["user_vote"], "Approve");
        assert_eq!(json["total_votes"], 1);
        assert_eq!(json["approval_percentage"], 100);
        assert_eq!(json["status"], "Approved");
    }

    #[tokio::test]
    async fn invalid_value_is_rejected_before_mutation() {
        let pool = init_memory_database().await.unwrap();
        let user = create_user(&pool, "ada", None).await.unwrap();
        let votable = create_votable(
            &pool,
            NewVotable::new(VotableKind::Keyword, &user.guid).label("entropy"),
        )
        .await
        .unwrap();

        let result = cast_vote(&pool, &user.guid, VotableKind::Keyword, &votable.guid, Some(5)).await;
        assert!(matches!(result, Err(Error::InvalidVoteValue(5))));

        let tally = get_tally(&pool, VotableKind::Keyword, &votable.guid).await.unwrap();
        assert_eq!(tally.total_votes, 0);
    }

    #[tokio::test]
    async fn get_user_vote_labels() {
        let pool = init_memory_database().await.unwrap();
        let user = create_user(&pool, "ada", None).await.unwrap();
        let votable = create_votable(
            &pool,
            NewVotable::new(VotableKind::Keyword, &user.guid).label("entropy"),
        )
        .await
        .unwrap();

        assert_eq!(
            get_user_vote(&pool, &user.guid, VotableKind::Keyword, &votable.guid).await.unwrap(),
            VoteLabel::NoVote
        );

        cast_vote(&pool, &user.guid, VotableKind::Keyword, &votable.guid, Some(-1))
            .await
            .unwrap();
        assert_eq!(
            get_user_vote(&pool, &user.guid, VotableKind::Keyword, &votable.guid).await.unwrap(),
            VoteLabel::Reject
        );

        assert!(matches!(
            get_user_vote(&pool, &user.guid, VotableKind::Keyword, "missing").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn get_tally_reads_cache_without_recompute() {
        let pool = init_memory_database().await.unwrap();
        let user = create_user(&pool, "ada", None).await.unwrap();
        let votable = create_votable(
            &pool,
            NewVotable::new(VotableKind::Keyword, &user.guid).label("entropy"),
        )
        .await
        .unwrap();

        cast_vote(&pool, &user.guid, VotableKind::Keyword, &votable.guid, Some(1))
            .await
            .unwrap();

        // Poison the cache directly; get_tally must report the poisoned
        // numbers, proving it does not recompute
        sqlx::query("UPDATE votables SET total_votes = 42, total_approve_votes = 42 WHERE guid = ?")
            .bind(&votable.guid)
            .execute(&pool)
            .await
            .unwrap();

        let tally = get_tally(&pool, VotableKind::Keyword, &votable.guid).await.unwrap();
        assert_eq!(tally.total_votes, 42);
    }
}
