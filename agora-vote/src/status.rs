//! Lifecycle status evaluation
//!
//! A votable moves between Proposed, Approved and Rejected automatically as
//! its tally crosses thresholds. Alternative is reachable only through an
//! administrative override and is sticky: once set, automatic evaluation
//! leaves it alone until an administrator changes it back.

use agora_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::tally::Tally;

/// Lifecycle state of a votable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Proposed,
    Approved,
    Rejected,
    Alternative,
}

impl Status {
    /// Canonical database string
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Proposed => "Proposed",
            Status::Approved => "Approved",
            Status::Rejected => "Rejected",
            Status::Alternative => "Alternative",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Proposed" => Ok(Status::Proposed),
            "Approved" => Ok(Status::Approved),
            "Rejected" => Ok(Status::Rejected),
            "Alternative" => Ok(Status::Alternative),
            other => Err(Error::InvalidInput(format!("unknown status: {}", other))),
        }
    }
}

/// Threshold configuration for one votable, percentages 0-100
///
/// `participation` gates the automatic transitions: while participation is
/// at or below it, the votable stays Proposed no matter how lopsided the
/// votes are. 0 disables the gate, which reproduces the evaluation that
/// looks at approval/rejection alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub approve: i64,
    pub reject: i64,
    pub participation: i64,
}

/// Derive the status implied by a tally
///
/// Memoryless re-derivation apart from the sticky Alternative rule: an
/// Approved votable swings back to Proposed or on to Rejected if later
/// votes move the percentages. Approval is checked before rejection, so a
/// tally clearing both thresholds resolves to Approved.
pub fn evaluate(current: Status, tally: &Tally, thresholds: &Thresholds) -> Status {
    if current == Status::Alternative {
        return Status::Alternative;
    }

    if thresholds.participation > 0
        && tally.participation_percentage <= thresholds.participation
    {
        return Status::Proposed;
    }

    if tally.approval_percentage > thresholds.approve {
        Status::Approved
    } else if tally.rejection_percentage > thresholds.reject {
        Status::Rejected
    } else {
        Status::Proposed
    }
}
