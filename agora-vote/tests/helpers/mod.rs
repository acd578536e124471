//! Shared fixtures for integration tests
#![allow(dead_code)]

use agora_common::db::init::init_memory_database;
use agora_common::db::models::{User, Votable};
use agora_common::db::users::create_user;
use agora_vote::registry::{create_votable, NewVotable};
use agora_vote::{Thresholds, VotableKind};
use sqlx::SqlitePool;

/// Fresh in-memory database with `n` live users
pub async fn pool_with_users(n: usize) -> (SqlitePool, Vec<User>) {
    let pool = init_memory_database().await.expect("init db");
    let mut users = Vec::with_capacity(n);
    for i in 0..n {
        let user = create_user(&pool, &format!("user{}", i), None)
            .await
            .expect("create user");
        users.push(user);
    }
    (pool, users)
}

/// A proposed keyword with default thresholds, created by the first user
pub async fn proposed_keyword(pool: &SqlitePool, creator: &User, word: &str) -> Votable {
    create_votable(pool, NewVotable::new(VotableKind::Keyword, &creator.guid).label(word))
        .await
        .expect("create keyword")
}

/// A proposed keyword with explicit thresholds
pub async fn keyword_with_thresholds(
    pool: &SqlitePool,
    creator: &User,
    word: &str,
    thresholds: Thresholds,
) -> Votable {
    create_votable(
        pool,
        NewVotable::new(VotableKind::Keyword, &creator.guid)
            .label(word)
            .thresholds(thresholds),
    )
    .await
    .expect("create keyword")
}
