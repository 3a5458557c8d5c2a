//! Commission storage
//!
//! The store is the concurrency control point of the subsystem: the
//! uniqueness constraint on member id is what turns at-least-once delivery
//! from the enrollment side into exactly-once commission rows.
//!
//! # Critical Invariants
//!
//! 1. **One row per member**: `insert_unique` never stores a second row for a
//!    member id; the existing row is returned instead
//! 2. **Atomic check-and-insert**: the uniqueness check and the insert happen
//!    under one lock, so concurrent writers cannot both win
//! 3. **Immutable amounts**: no store method rewrites `amount`
//! 4. **Whole-set repoint**: `repoint_agent` rewrites every matching row or
//!    none

pub mod memory;

pub use memory::InMemoryCommissionStore;

use crate::models::commission::{Commission, PaymentStatus, TransitionError};
use crate::models::member::{Member, MemberId};
use crate::models::review::ReviewFlag;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors raised by storage backends
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Commission not found: {0}")]
    CommissionNotFound(String),

    #[error("Duplicate commission id {0}")]
    DuplicateCommissionId(String),

    #[error("Member {0} has more than one commission")]
    DuplicateMember(MemberId),

    #[error("Transition error: {0}")]
    Transition(#[from] TransitionError),
}

/// Result of an insert guarded by the member uniqueness constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Row stored
    Inserted(Commission),

    /// A row for this member already existed; nothing was stored
    Duplicate(Commission),
}

/// Ledger storage for commission rows and review flags
///
/// Methods take `&self`: implementations provide their own interior
/// locking so one store can serve concurrent writers.
pub trait CommissionStore: Send + Sync {
    /// Insert unless a row for the same member already exists
    fn insert_unique(&self, commission: Commission) -> Result<InsertOutcome, StoreError>;

    fn get(&self, commission_id: &str) -> Result<Option<Commission>, StoreError>;

    fn get_by_member(&self, member_id: MemberId) -> Result<Option<Commission>, StoreError>;

    /// Member ids that already have a commission
    fn recorded_member_ids(&self) -> Result<BTreeSet<MemberId>, StoreError>;

    /// Every row, ordered by creation time then member id
    fn list(&self) -> Result<Vec<Commission>, StoreError>;

    /// Rewrite the internal id of every row held by `retired_id`
    ///
    /// Returns the number of rows repointed. Agent numbers are untouched.
    fn repoint_agent(&self, retired_id: &str, survivor_id: &str) -> Result<usize, StoreError>;

    fn approve(&self, commission_id: &str) -> Result<Commission, StoreError>;

    fn set_payment_status(
        &self,
        commission_id: &str,
        status: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<Commission, StoreError>;

    /// Record (or replace) the review flag for a member
    fn flag_for_review(&self, flag: ReviewFlag) -> Result<(), StoreError>;

    /// Remove a member's review flag, returning whether one existed
    fn clear_review_flag(&self, member_id: MemberId) -> Result<bool, StoreError>;

    fn review_flags(&self) -> Result<Vec<ReviewFlag>, StoreError>;
}

impl<S: CommissionStore + ?Sized> CommissionStore for &S {
    fn insert_unique(&self, commission: Commission) -> Result<InsertOutcome, StoreError> {
        (**self).insert_unique(commission)
    }

    fn get(&self, commission_id: &str) -> Result<Option<Commission>, StoreError> {
        (**self).get(commission_id)
    }

    fn get_by_member(&self, member_id: MemberId) -> Result<Option<Commission>, StoreError> {
        (**self).get_by_member(member_id)
    }

    fn recorded_member_ids(&self) -> Result<BTreeSet<MemberId>, StoreError> {
        (**self).recorded_member_ids()
    }

    fn list(&self) -> Result<Vec<Commission>, StoreError> {
        (**self).list()
    }

    fn repoint_agent(&self, retired_id: &str, survivor_id: &str) -> Result<usize, StoreError> {
        (**self).repoint_agent(retired_id, survivor_id)
    }

    fn approve(&self, commission_id: &str) -> Result<Commission, StoreError> {
        (**self).approve(commission_id)
    }

    fn set_payment_status(
        &self,
        commission_id: &str,
        status: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<Commission, StoreError> {
        (**self).set_payment_status(commission_id, status, at)
    }

    fn flag_for_review(&self, flag: ReviewFlag) -> Result<(), StoreError> {
        (**self).flag_for_review(flag)
    }

    fn clear_review_flag(&self, member_id: MemberId) -> Result<bool, StoreError> {
        (**self).clear_review_flag(member_id)
    }

    fn review_flags(&self) -> Result<Vec<ReviewFlag>, StoreError> {
        (**self).review_flags()
    }
}

/// The enrollment system's member table, as seen by reconciliation
pub trait EnrollmentSource {
    fn members(&self) -> Result<Vec<Member>, StoreError>;
}

impl EnrollmentSource for Vec<Member> {
    fn members(&self) -> Result<Vec<Member>, StoreError> {
        Ok(self.clone())
    }
}

impl EnrollmentSource for [Member] {
    fn members(&self) -> Result<Vec<Member>, StoreError> {
        Ok(self.to_vec())
    }
}
