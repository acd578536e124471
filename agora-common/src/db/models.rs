//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user: voter identity and liveness record
///
/// Authentication and profile editing live outside this core. Users matter
/// here as vote authors and as the live-population denominator.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub guid: String,
    pub username: String,
    pub preferred_name: Option<String>,
    pub is_live: bool,
    pub last_seen_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// One votable entity (keyword, definition, question, question tag or
/// binary answer)
///
/// `kind` and `status` are stored as their canonical string tags; the typed
/// views live in the voting crate. The percentage/count columns are a cache
/// rewritten by every tally recompute - recomputable from the votes table
/// and never treated as a source of truth.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Votable {
    pub guid: String,
    pub kind: String,
    pub creator_id: String,
    pub status: String,
    pub parent_id: Option<String>,
    /// Keyword word or tag display label
    pub label: Option<String>,
    /// Definition text or question text
    pub body: Option<String>,
    pub answer_type: Option<String>,
    pub approve_threshold: i64,
    pub reject_threshold: i64,
    pub participation_threshold: i64,
    pub participation_percentage: i64,
    pub approval_percentage: i64,
    pub total_votes: i64,
    pub total_approve_votes: i64,
    pub total_reject_votes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One live vote: row absence means "No Vote"
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vote {
    pub voter_id: String,
    pub votable_kind: String,
    pub votable_id: String,
    /// +1 approve, -1 reject
    pub value: i64,
    pub created_at: DateTime<Utc>,
}
