//! # Agora Common Library
//!
//! Shared code for the Agora moderation platform core:
//! - Error type used across all workspace members
//! - Database bootstrap (pool init, schema, migrations, default settings)
//! - Row models for users, votables and votes
//! - User liveness queries (live population, last-seen touch, sweep)
//! - Configuration loading and root folder resolution

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
