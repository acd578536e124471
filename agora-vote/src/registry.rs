//! Entity registry
//!
//! The single dispatch point over votable kinds. Everything downstream
//! (ledger, tally, status) works against the one votables table and never
//! special-cases a kind; the registry owns the kind tags, default
//! thresholds and creation/resolution.

use agora_common::db::models::Votable;
use agora_common::db::settings::{
    get_setting, DEFAULT_APPROVE_THRESHOLD, DEFAULT_PARTICIPATION_THRESHOLD,
    DEFAULT_REJECT_THRESHOLD,
};
use agora_common::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqlitePool};
use std::fmt;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use crate::status::{Status, Thresholds};

/// The votable content kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotableKind {
    Keyword,
    Definition,
    Question,
    QuestionTag,
    AnswerBinary,
}

impl VotableKind {
    /// Canonical database tag
    pub fn as_str(&self) -> &'static str {
        match self {
            VotableKind::Keyword => "keyword",
            VotableKind::Definition => "definition",
            VotableKind::Question => "question",
            VotableKind::QuestionTag => "question_tag",
            VotableKind::AnswerBinary => "answer_binary",
        }
    }

    /// All kinds, registry order
    pub fn all() -> [VotableKind; 5] {
        [
            VotableKind::Keyword,
            VotableKind::Definition,
            VotableKind::Question,
            VotableKind::QuestionTag,
            VotableKind::AnswerBinary,
        ]
    }
}

impl fmt::Display for VotableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VotableKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "keyword" => Ok(VotableKind::Keyword),
            "definition" => Ok(VotableKind::Definition),
            "question" => Ok(VotableKind::Question),
            "question_tag" => Ok(VotableKind::QuestionTag),
            "answer_binary" => Ok(VotableKind::AnswerBinary),
            other => Err(Error::InvalidInput(format!("unknown votable kind: {}", other))),
        }
    }
}

/// Parameters for creating a votable
#[derive(Debug, Clone)]
pub struct NewVotable {
    pub kind: VotableKind,
    pub creator_id: String,
    /// Keyword word or tag display label
    pub label: Option<String>,
    /// Definition text or question text
    pub body: Option<String>,
    /// Questions only; defaults to BINARY when absent
    pub answer_type: Option<String>,
    pub parent_id: Option<String>,
    /// Per-votable override; kind defaults from settings when None
    pub thresholds: Option<Thresholds>,
}

impl NewVotable {
    pub fn new(kind: VotableKind, creator_id: impl Into<String>) -> Self {
        Self {
            kind,
            creator_id: creator_id.into(),
            label: None,
            body: None,
            answer_type: None,
            parent_id: None,
            thresholds: None,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = Some(thresholds);
        self
    }
}

pub(crate) const VOTABLE_COLUMNS: &str = "guid, kind, creator_id, status, parent_id, label, body, answer_type, \
     approve_threshold, reject_threshold, participation_threshold, \
     participation_percentage, approval_percentage, total_votes, \
     total_approve_votes, total_reject_votes, created_at, updated_at";

/// Fetch a votable row through any executor, None when absent
pub(crate) async fn fetch_votable<'e, E>(
    executor: E,
    kind: VotableKind,
    id: &str,
) -> Result<Option<Votable>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let votable = sqlx::query_as::<_, Votable>(&format!(
        "SELECT {} FROM votables WHERE kind = ? AND guid = ?",
        VOTABLE_COLUMNS
    ))
    .bind(kind.as_str())
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(votable)
}

/// Resolve a (kind, id) pair to its votable
///
/// `Error::NotFound` when no row matches; never silently defaulted.
pub async fn resolve(pool: &SqlitePool, kind: VotableKind, id: &str) -> Result<Votable> {
    fetch_votable(pool, kind, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{} {}", kind, id)))
}

/// Default thresholds for a kind
///
/// All kinds currently share the global settings values; this is the one
/// place to diverge a kind from the defaults.
pub async fn default_thresholds(pool: &SqlitePool, _kind: VotableKind) -> Result<Thresholds> {
    let approve = get_setting::<i64>(pool, "default_approve_threshold")
        .await?
        .unwrap_or(DEFAULT_APPROVE_THRESHOLD);
    let reject = get_setting::<i64>(pool, "default_reject_threshold")
        .await?
        .unwrap_or(DEFAULT_REJECT_THRESHOLD);
    let participation = get_setting::<i64>(pool, "default_participation_threshold")
        .await?
        .unwrap_or(DEFAULT_PARTICIPATION_THRESHOLD);

    Ok(Thresholds {
        approve,
        reject,
        participation,
    })
}

/// Create a votable in status Proposed
///
/// The parent link (if any) is validated before insert: it must exist,
/// carry the same kind, and not close a cycle.
pub async fn create_votable(pool: &SqlitePool, new: NewVotable) -> Result<Votable> {
    if let Some(parent_id) = &new.parent_id {
        crate::hierarchy::validate_parent_link(pool, new.kind, None, parent_id).await?;
    }

    let thresholds = match new.thresholds {
        Some(t) => t,
        None => default_thresholds(pool, new.kind).await?,
    };

    let answer_type = match new.kind {
        VotableKind::Question => Some(new.answer_type.unwrap_or_else(|| "BINARY".to_string())),
        _ => new.answer_type,
    };

    let guid = Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO votables (
            guid, kind, creator_id, status, parent_id, label, body, answer_type,
            approve_threshold, reject_threshold, participation_threshold,
            created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&guid)
    .bind(new.kind.as_str())
    .bind(&new.creator_id)
    .bind(Status::Proposed.as_str())
    .bind(&new.parent_id)
    .bind(&new.label)
    .bind(&new.body)
    .bind(&answer_type)
    .bind(thresholds.approve)
    .bind(thresholds.reject)
    .bind(thresholds.participation)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    info!("Created {} {} by user {}", new.kind, guid, new.creator_id);

    resolve(pool, new.kind, &guid).await
}

/// Administrative status override
///
/// The only path to Alternative. Also the way back out of it: automatic
/// evaluation will resume re-deriving status on the next recompute once
/// the votable leaves Alternative.
pub async fn set_status(
    pool: &SqlitePool,
    kind: VotableKind,
    id: &str,
    status: Status,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE votables SET status = ?, updated_at = ? WHERE kind = ? AND guid = ?",
    )
    .bind(status.as_str())
    .bind(Utc::now())
    .bind(kind.as_str())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("{} {}", kind, id)));
    }

    info!("Status of {} {} set to {} (administrative)", kind, id, status);
    Ok(())
}
