//! Manual-review flags
//!
//! A member is flagged when no commission could be written for it without
//! guessing. Flags surface only in admin/audit views; enrollment is never
//! blocked by them.

use crate::models::member::MemberId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a member needs manual commission assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewReason {
    /// Plan tier/coverage/add-on had no rate
    MissingRate { detail: String },

    /// Enrolling agent did not resolve and house attribution is disabled
    UnresolvedAgent { reference: Option<String> },
}

impl fmt::Display for ReviewReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewReason::MissingRate { detail } => write!(f, "missing rate: {}", detail),
            ReviewReason::UnresolvedAgent { reference: Some(r) } => {
                write!(f, "unresolved agent '{}'", r)
            }
            ReviewReason::UnresolvedAgent { reference: None } => f.write_str("no enrolling agent"),
        }
    }
}

/// A member waiting for manual commission assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewFlag {
    pub member_id: MemberId,
    pub reason: ReviewReason,
    pub flagged_at: DateTime<Utc>,
}
