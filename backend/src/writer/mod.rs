//! Commission Writer
//!
//! Writes the commission for one enrollment, exactly once.
//!
//! # Write Flow
//!
//! ```text
//! Member ──► snapshot enrolled plan ──► Rate Table ──► Resolver ──► insert_unique
//!                                          │              │              │
//!                                   NotFound: flag   Unknown: house   Duplicate:
//!                                   for review                        no-op success
//! ```
//!
//! # Critical Invariants
//!
//! - **Idempotence**: member id is the idempotency key; retries and
//!   concurrent calls for one member store exactly one row
//! - **No guessing**: a missing rate never produces a row
//! - **Enrollment never fails**: rate and identity problems become review
//!   flags or house attribution, only storage failures are errors

use crate::core::clock::Clock;
use crate::identity::{AgentDirectory, ResolveError, ResolvedAgent};
use crate::models::commission::Commission;
use crate::models::member::{Member, MemberId};
use crate::models::review::{ReviewFlag, ReviewReason};
use crate::rates::RateTable;
use crate::store::{CommissionStore, InsertOutcome, StoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur while writing a commission
///
/// Only storage failures are errors; every other problem is an outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WriteError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// How to attribute enrollments whose agent does not resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionPolicy {
    /// Attribute to the house identity (true) or flag for review (false)
    #[serde(default = "default_house_fallback")]
    pub house_fallback: bool,
}

fn default_house_fallback() -> bool {
    true
}

impl Default for AttributionPolicy {
    fn default() -> Self {
        Self {
            house_fallback: true,
        }
    }
}

/// Result of a write attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// New commission stored
    Recorded(Commission),

    /// Member already had a commission (retry or lost race)
    AlreadyRecorded(Commission),

    /// No commission written; member flagged for manual assignment
    NeedsReview {
        member_id: MemberId,
        reason: ReviewReason,
    },
}

impl WriteOutcome {
    /// The stored commission, if there is one
    pub fn commission(&self) -> Option<&Commission> {
        match self {
            WriteOutcome::Recorded(c) | WriteOutcome::AlreadyRecorded(c) => Some(c),
            WriteOutcome::NeedsReview { .. } => None,
        }
    }

    pub fn is_recorded(&self) -> bool {
        matches!(self, WriteOutcome::Recorded(_))
    }
}

/// Commission writer over borrowed ledger components
///
/// The writer holds only shared references, so one writer can be used from
/// several threads at once; the store's uniqueness constraint arbitrates.
pub struct CommissionWriter<'a, S: CommissionStore, C: Clock> {
    rates: &'a RateTable,
    directory: &'a AgentDirectory,
    store: &'a S,
    clock: &'a C,
    policy: AttributionPolicy,
}

impl<'a, S: CommissionStore, C: Clock> CommissionWriter<'a, S, C> {
    pub fn new(
        rates: &'a RateTable,
        directory: &'a AgentDirectory,
        store: &'a S,
        clock: &'a C,
        policy: AttributionPolicy,
    ) -> Self {
        Self {
            rates,
            directory,
            store,
            clock,
            policy,
        }
    }

    /// Write the commission for `member`
    ///
    /// Safe to call any number of times for the same member.
    pub fn write(&self, member: &Member) -> Result<WriteOutcome, WriteError> {
        if let Some(existing) = self.store.get_by_member(member.id())? {
            debug!(
                member_id = member.id(),
                commission_id = existing.id(),
                "commission already recorded"
            );
            self.clear_flag(member.id());
            return Ok(WriteOutcome::AlreadyRecorded(existing));
        }

        // Amount is fixed from the plan as enrolled, not the current plan
        let quoted = self
            .rates
            .snapshot(member.enrolled_plan())
            .and_then(|snapshot| self.rates.quote(&snapshot).map(|quote| (snapshot, quote)));
        let (snapshot, quote) = match quoted {
            Ok(pair) => pair,
            Err(err) => {
                return self.flag(
                    member.id(),
                    ReviewReason::MissingRate {
                        detail: err.to_string(),
                    },
                );
            }
        };

        let agent = match self.attribute(member) {
            Some(agent) => agent,
            None => {
                return self.flag(
                    member.id(),
                    ReviewReason::UnresolvedAgent {
                        reference: member.enrolling_agent_ref().map(str::to_string),
                    },
                );
            }
        };

        let commission = Commission::new(
            member.id(),
            agent.internal_id,
            agent.agent_number,
            quote.amount,
            snapshot,
            member.enrolled_at(),
            self.clock.now(),
        )
        .with_house_attribution(agent.house);

        match self.store.insert_unique(commission)? {
            InsertOutcome::Inserted(commission) => {
                info!(
                    member_id = commission.member_id(),
                    commission_id = commission.id(),
                    agent_number = %commission.agent_number(),
                    amount = commission.amount(),
                    "commission recorded"
                );
                self.clear_flag(member.id());
                Ok(WriteOutcome::Recorded(commission))
            }
            InsertOutcome::Duplicate(existing) => {
                debug!(
                    member_id = existing.member_id(),
                    commission_id = existing.id(),
                    "lost insert race, keeping existing commission"
                );
                self.clear_flag(member.id());
                Ok(WriteOutcome::AlreadyRecorded(existing))
            }
        }
    }

    /// Resolve the enrolling agent, applying the house fallback policy
    fn attribute(&self, member: &Member) -> Option<ResolvedAgent> {
        match self.directory.resolve_agent(member.enrolling_agent_ref()) {
            Ok(resolved) => Some(resolved),
            Err(err) if self.policy.house_fallback => {
                self.log_house_attribution(member, &err);
                Some(self.directory.house_attribution())
            }
            Err(err) => {
                warn!(member_id = member.id(), error = %err, "enrolling agent unresolved");
                None
            }
        }
    }

    fn log_house_attribution(&self, member: &Member, err: &ResolveError) {
        match err {
            ResolveError::Missing => {
                info!(member_id = member.id(), "no enrolling agent, attributing to house")
            }
            other => warn!(
                member_id = member.id(),
                error = %other,
                "enrolling agent unresolved, attributing to house"
            ),
        }
    }

    /// A member with a stored commission no longer needs review
    fn clear_flag(&self, member_id: MemberId) {
        if let Err(err) = self.store.clear_review_flag(member_id) {
            warn!(member_id, error = %err, "could not clear review flag");
        }
    }

    fn flag(&self, member_id: MemberId, reason: ReviewReason) -> Result<WriteOutcome, WriteError> {
        warn!(member_id, reason = %reason, "member flagged for manual commission review");
        self.store.flag_for_review(ReviewFlag {
            member_id,
            reason: reason.clone(),
            flagged_at: self.clock.now(),
        })?;
        Ok(WriteOutcome::NeedsReview { member_id, reason })
    }
}
