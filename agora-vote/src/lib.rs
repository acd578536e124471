//! # Agora Voting Core
//!
//! The generic votable/approval engine behind the Agora moderation
//! platform. Arbitrary content kinds (keywords, definitions, questions,
//! question tags, binary answers) receive community votes through one
//! shared mechanism:
//!
//! - [`registry`] resolves a (kind, id) pair to a concrete votable and
//!   owns creation, default thresholds and administrative status overrides
//! - [`ledger`] stores one vote per (voter, votable) with upsert and
//!   retraction semantics, and keeps the cached tally synchronously
//!   consistent with every mutation
//! - [`tally`] recomputes counts and percentages against the live user
//!   population
//! - [`status`] evaluates the lifecycle state machine
//!   (Proposed/Approved/Rejected/Alternative) on every recompute
//! - [`hierarchy`] tracks parent/child links for tree-shaped content,
//!   with cycle protection, breadcrumb paths and JSON tree export
//! - [`service`] is the operations surface the (out-of-scope) web layer
//!   calls: cast a vote, read a tally, read a user's own vote label
//!
//! Every vote submission commits the ledger mutation, the tally recompute
//! and the status write in a single transaction; callers never observe a
//! window where the ledger and the cached tally disagree.

pub mod hierarchy;
pub mod ledger;
pub mod registry;
pub mod service;
pub mod status;
pub mod tally;

pub use hierarchy::TreeNode;
pub use ledger::{CastOutcome, VoteValue};
pub use registry::{NewVotable, VotableKind};
pub use service::{VoteLabel, VoteReceipt};
pub use status::{Status, Thresholds};
pub use tally::Tally;
