//! Hierarchy tracker
//!
//! Parent/child links among votables of the same kind form a forest used
//! for breadcrumb paths and tree export. Earlier designs accepted any
//! parent pointer and could loop forever on a corrupted chain; here every
//! parent assignment is checked with a walk-up before it is accepted, and
//! the read paths carry a visited-set guard as a second line of defense.

use agora_common::db::models::Votable;
use agora_common::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};

use crate::registry::{self, VotableKind};
use crate::status::Status;

/// One node of the exported tree: a single finite JSON document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    pub name: String,
    pub children: Vec<TreeNode>,
    pub text: String,
}

/// Breadcrumb path from the root down to (and including) the votable
///
/// Walks parent pointers to the root, then reverses. A revisited guid
/// means the chain is corrupted and yields `Error::ParentCycle` instead of
/// an infinite walk.
pub async fn path_to_root(
    pool: &SqlitePool,
    kind: VotableKind,
    id: &str,
) -> Result<Vec<Votable>> {
    let mut path = Vec::new();
    let mut visited = HashSet::new();
    let mut current = Some(registry::resolve(pool, kind, id).await?);

    while let Some(votable) = current {
        if !visited.insert(votable.guid.clone()) {
            return Err(Error::ParentCycle(votable.guid));
        }
        let parent_id = votable.parent_id.clone();
        path.push(votable);
        current = match parent_id {
            Some(pid) => Some(registry::resolve(pool, kind, &pid).await?),
            None => None,
        };
    }

    path.reverse();
    Ok(path)
}

/// Validate a prospective parent link before it is written
///
/// The parent must exist under the same kind, and when the child already
/// exists the walk-up from the parent must not pass through the child -
/// that assignment would close a cycle.
pub async fn validate_parent_link(
    pool: &SqlitePool,
    kind: VotableKind,
    child_id: Option<&str>,
    parent_id: &str,
) -> Result<()> {
    if child_id == Some(parent_id) {
        return Err(Error::ParentCycle(parent_id.to_string()));
    }

    let parent = registry::resolve(pool, kind, parent_id).await?;

    let Some(child_id) = child_id else {
        // A not-yet-inserted child cannot be on anyone's ancestor chain
        return Ok(());
    };

    let mut visited = HashSet::new();
    let mut cursor = Some(parent);
    while let Some(votable) = cursor {
        if votable.guid == child_id {
            return Err(Error::ParentCycle(child_id.to_string()));
        }
        if !visited.insert(votable.guid.clone()) {
            return Err(Error::ParentCycle(votable.guid));
        }
        cursor = match votable.parent_id {
            Some(pid) => Some(registry::resolve(pool, kind, &pid).await?),
            None => None,
        };
    }

    Ok(())
}

/// Re-point (or clear) a votable's parent link
pub async fn set_parent(
    pool: &SqlitePool,
    kind: VotableKind,
    id: &str,
    parent_id: Option<&str>,
) -> Result<()> {
    // Confirm the child exists first so NotFound names the right entity
    registry::resolve(pool, kind, id).await?;

    if let Some(parent_id) = parent_id {
        validate_parent_link(pool, kind, Some(id), parent_id).await?;
    }

    sqlx::query("UPDATE votables SET parent_id = ?, updated_at = ? WHERE kind = ? AND guid = ?")
        .bind(parent_id)
        .bind(Utc::now())
        .bind(kind.as_str())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Direct children of a votable, creation order
pub async fn children_of(pool: &SqlitePool, kind: VotableKind, id: &str) -> Result<Vec<Votable>> {
    let children = sqlx::query_as::<_, Votable>(&format!(
        "SELECT {} FROM votables WHERE kind = ? AND parent_id = ? ORDER BY created_at",
        registry::VOTABLE_COLUMNS
    ))
    .bind(kind.as_str())
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(children)
}

/// Children in status Alternative (competing proposals parked under this
/// votable)
pub async fn alternatives_of(
    pool: &SqlitePool,
    kind: VotableKind,
    id: &str,
) -> Result<Vec<Votable>> {
    let children = sqlx::query_as::<_, Votable>(&format!(
        "SELECT {} FROM votables WHERE kind = ? AND parent_id = ? AND status = ? ORDER BY created_at",
        registry::VOTABLE_COLUMNS
    ))
    .bind(kind.as_str())
    .bind(id)
    .bind(Status::Alternative.as_str())
    .fetch_all(pool)
    .await?;

    Ok(children)
}

/// Export the tree rooted at a votable as one JSON-serializable document
///
/// `name` comes from the label, `text` from the body; both degrade to the
/// empty string. All rows of the kind are loaded once and assembled in
/// memory, so export cost is bounded by the size of the forest, not its
/// depth.
pub async fn export_tree(pool: &SqlitePool, kind: VotableKind, root_id: &str) -> Result<TreeNode> {
    let root = registry::resolve(pool, kind, root_id).await?;

    let rows = sqlx::query_as::<_, Votable>(&format!(
        "SELECT {} FROM votables WHERE kind = ? ORDER BY created_at",
        registry::VOTABLE_COLUMNS
    ))
    .bind(kind.as_str())
    .fetch_all(pool)
    .await?;

    let mut children_by_parent: HashMap<String, Vec<&Votable>> = HashMap::new();
    for row in &rows {
        if let Some(parent_id) = &row.parent_id {
            children_by_parent.entry(parent_id.clone()).or_default().push(row);
        }
    }

    let mut visited = HashSet::new();
    build_node(&root, &children_by_parent, &mut visited)
}

fn build_node(
    votable: &Votable,
    children_by_parent: &HashMap<String, Vec<&Votable>>,
    visited: &mut HashSet<String>,
) -> Result<TreeNode> {
    if !visited.insert(votable.guid.clone()) {
        return Err(Error::ParentCycle(votable.guid.clone()));
    }

    let mut children = Vec::new();
    if let Some(child_rows) = children_by_parent.get(&votable.guid) {
        for child in child_rows {
            children.push(build_node(child, children_by_parent, visited)?);
        }
    }

    Ok(TreeNode {
        name: votable.label.clone().unwrap_or_default(),
        children,
        text: votable.body.clone().unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{create_votable, NewVotable};
    use agora_common::db::init::init_memory_database;
    use agora_common::db::users::create_user;

    async fn chain() -> (SqlitePool, String, Votable, Votable, Votable) {
        // C (root) <- B <- A
        let pool = init_memory_database().await.unwrap();
        let user = create_user(&pool, "ada", None).await.unwrap();
        let c = create_votable(
            &pool,
            NewVotable::new(VotableKind::Question, &user.guid)
                .label("c")
                .body("root question"),
        )
        .await
        .unwrap();
        let b = create_votable(
            &pool,
            NewVotable::new(VotableKind::Question, &user.guid)
                .label("b")
                .body("middle question")
                .parent(&c.guid),
        )
        .await
        .unwrap();
        let a = create_votable(
            &pool,
            NewVotable::new(VotableKind::Question, &user.guid)
                .label("a")
                .body("leaf question")
                .parent(&b.guid),
        )
        .await
        .unwrap();
        (pool, user.guid, a, b, c)
    }

    #[tokio::test]
    async fn path_to_root_is_root_first() {
        let (pool, _, a, b, c) = chain().await;

        let path = path_to_root(&pool, VotableKind::Question, &a.guid).await.unwrap();
        let guids: Vec<&str> = path.iter().map(|v| v.guid.as_str()).collect();
        assert_eq!(guids, vec![c.guid.as_str(), b.guid.as_str(), a.guid.as_str()]);
    }

    #[tokio::test]
    async fn path_of_root_is_itself() {
        let (pool, _, _, _, c) = chain().await;
        let path = path_to_root(&pool, VotableKind::Question, &c.guid).await.unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].guid, c.guid);
    }

    #[tokio::test]
    async fn reparenting_under_a_descendant_is_rejected() {
        let (pool, _, a, _, c) = chain().await;

        // c is the root of the chain containing a; pointing c below a
        // would close the loop
        let result = set_parent(&pool, VotableKind::Question, &c.guid, Some(&a.guid)).await;
        assert!(matches!(result, Err(Error::ParentCycle(_))));
    }

    #[tokio::test]
    async fn self_parent_is_rejected() {
        let (pool, _, a, _, _) = chain().await;
        let result = set_parent(&pool, VotableKind::Question, &a.guid, Some(&a.guid)).await;
        assert!(matches!(result, Err(Error::ParentCycle(_))));
    }

    #[tokio::test]
    async fn valid_reparent_and_clear() {
        let (pool, _, a, _, c) = chain().await;

        // Flatten: a directly under the root
        set_parent(&pool, VotableKind::Question, &a.guid, Some(&c.guid)).await.unwrap();
        let path = path_to_root(&pool, VotableKind::Question, &a.guid).await.unwrap();
        assert_eq!(path.len(), 2);

        set_parent(&pool, VotableKind::Question, &a.guid, None).await.unwrap();
        let path = path_to_root(&pool, VotableKind::Question, &a.guid).await.unwrap();
        assert_eq!(path.len(), 1);
    }

    #[tokio::test]
    async fn parent_must_exist_and_match_kind() {
        let pool = init_memory_database().await.unwrap();
        let user = create_user(&pool, "ada", None).await.unwrap();
        let keyword = create_votable(
            &pool,
            NewVotable::new(VotableKind::Keyword, &user.guid).label("entropy"),
        )
        .await
        .unwrap();

        // Question parented on a keyword: the kinds don't match
        let result = create_votable(
            &pool,
            NewVotable::new(VotableKind::Question, &user.guid)
                .body("orphan")
                .parent(&keyword.guid),
        )
        .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn export_tree_matches_structure() {
        let (pool, user, _, b, c) = chain().await;

        // Second child under the root
        create_votable(
            &pool,
            NewVotable::new(VotableKind::Question, &user)
                .label("d")
                .body("sibling question")
                .parent(&c.guid),
        )
        .await
        .unwrap();

        let tree = export_tree(&pool, VotableKind::Question, &c.guid).await.unwrap();
        assert_eq!(tree.name, "c");
        assert_eq!(tree.text, "root question");
        assert_eq!(tree.children.len(), 2);

        let b_node = tree.children.iter().find(|n| n.name == "b").unwrap();
        assert_eq!(b_node.children.len(), 1);
        assert_eq!(b_node.children[0].name, "a");

        // Whole export is a single JSON document
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["children"][0]["name"], b.label.clone().unwrap());
        assert!(json["children"][0]["children"].is_array());
    }

    #[tokio::test]
    async fn alternatives_are_the_alternative_children() {
        let (pool, user, _a, b, c) = chain().await;

        // Park a competing proposal under the root
        let alt = create_votable(
            &pool,
            NewVotable::new(VotableKind::Question, &user)
                .label("c-alt")
                .body("alternative root question")
                .parent(&c.guid),
        )
        .await
        .unwrap();
        crate::registry::set_status(&pool, VotableKind::Question, &alt.guid, Status::Alternative)
            .await
            .unwrap();

        let children = children_of(&pool, VotableKind::Question, &c.guid).await.unwrap();
        assert_eq!(children.len(), 2);

        let alternatives = alternatives_of(&pool, VotableKind::Question, &c.guid).await.unwrap();
        assert_eq!(alternatives.len(), 1);
        assert_eq!(alternatives[0].guid, alt.guid);

        // b is a plain Proposed child, not an alternative
        assert!(alternatives.iter().all(|v| v.guid != b.guid));
    }

    #[tokio::test]
    async fn corrupted_chain_yields_cycle_error() {
        let (pool, _, a, _, c) = chain().await;

        // Bypass the guard to simulate pre-guard data
        sqlx::query("UPDATE votables SET parent_id = ? WHERE guid = ?")
            .bind(&a.guid)
            .bind(&c.guid)
            .execute(&pool)
            .await
            .unwrap();

        let result = path_to_root(&pool, VotableKind::Question, &a.guid).await;
        assert!(matches!(result, Err(Error::ParentCycle(_))));

        let export = export_tree(&pool, VotableKind::Question, &c.guid).await;
        assert!(matches!(export, Err(Error::ParentCycle(_))));
    }
}
