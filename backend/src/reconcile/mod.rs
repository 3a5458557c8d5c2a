//! Reconciliation Job
//!
//! Finds enrollments without a commission (left behind when enrollment and
//! commission writes did not complete together) and backfills them through
//! the same writer used on the live path.
//!
//! # Algorithm
//!
//! ```text
//! members  = enrollment source
//! recorded = member ids with a commission
//! for m in members \ recorded:
//!     writer.write(m)        // as-enrolled plan, same uniqueness constraint
//! ```
//!
//! # Critical Invariants
//!
//! - **Convergence**: a second run with no new members creates nothing
//! - **Race tolerance**: a member reconciled by live traffic between the scan
//!   and the insert is an `AlreadyRecorded` skip, not a duplicate
//! - **Partial failure**: a storage error on one member skips that member;
//!   the batch continues

use crate::core::clock::Clock;
use crate::models::member::MemberId;
use crate::models::review::ReviewReason;
use crate::store::{CommissionStore, EnrollmentSource, StoreError};
use crate::writer::{CommissionWriter, WriteOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// Why a member was not backfilled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkipReason {
    /// Plan had no rate; member flagged for review
    MissingRate,
    /// Agent unresolved and house attribution disabled
    NoAgent,
    /// Commission appeared between scan and insert
    AlreadyRecorded,
    /// Storage error on this member
    StorageFailure,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SkipReason::MissingRate => "missing rate",
            SkipReason::NoAgent => "no agent",
            SkipReason::AlreadyRecorded => "already recorded",
            SkipReason::StorageFailure => "storage failure",
        };
        f.write_str(label)
    }
}

/// One member the run did not backfill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedMember {
    pub member_id: MemberId,
    pub reason: SkipReason,
    pub detail: String,
}

/// A commission written by a reconciliation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfilledCommission {
    pub member_id: MemberId,
    pub commission_id: String,
    pub agent_number: String,
    pub amount: i64,
    pub house: bool,
}

/// Summary of a reconciliation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Members read from the enrollment source
    pub scanned: usize,

    /// Members that already had a commission at scan time
    pub already_recorded: usize,

    /// Commissions written by this run
    pub created: usize,

    /// Of `created`, how many went to the house identity
    pub attributed_to_house: usize,

    pub backfilled: Vec<BackfilledCommission>,

    pub skipped: Vec<SkippedMember>,
}

impl ReconciliationReport {
    fn new(run_id: String, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            started_at,
            finished_at: started_at,
            scanned: 0,
            already_recorded: 0,
            created: 0,
            attributed_to_house: 0,
            backfilled: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Members skipped for `reason`
    pub fn skipped_count(&self, reason: SkipReason) -> usize {
        self.skipped.iter().filter(|s| s.reason == reason).count()
    }

    /// Members skipped for any reason
    pub fn total_skipped(&self) -> usize {
        self.skipped.len()
    }

    fn skip(&mut self, member_id: MemberId, reason: SkipReason, detail: String) {
        self.skipped.push(SkippedMember {
            member_id,
            reason,
            detail,
        });
    }
}

/// Run one reconciliation pass
///
/// Fails only when the member list or the recorded-member index cannot be
/// read at all; per-member failures are reported in the result.
pub fn reconcile<S, C, E>(
    writer: &CommissionWriter<'_, S, C>,
    store: &S,
    clock: &C,
    source: &E,
) -> Result<ReconciliationReport, StoreError>
where
    S: CommissionStore,
    C: Clock,
    E: EnrollmentSource + ?Sized,
{
    let mut report = ReconciliationReport::new(uuid::Uuid::new_v4().to_string(), clock.now());

    let mut members = source.members()?;
    members.sort_by_key(|m| m.id());
    let recorded = store.recorded_member_ids()?;

    report.scanned = members.len();

    for member in members {
        if recorded.contains(&member.id()) {
            report.already_recorded += 1;
            continue;
        }

        match writer.write(&member) {
            Ok(WriteOutcome::Recorded(commission)) => {
                report.created += 1;
                if commission.is_house() {
                    report.attributed_to_house += 1;
                }
                report.backfilled.push(BackfilledCommission {
                    member_id: commission.member_id(),
                    commission_id: commission.id().to_string(),
                    agent_number: commission.agent_number().to_string(),
                    amount: commission.amount(),
                    house: commission.is_house(),
                });
            }
            Ok(WriteOutcome::AlreadyRecorded(existing)) => {
                report.skip(
                    member.id(),
                    SkipReason::AlreadyRecorded,
                    format!("commission {} written concurrently", existing.id()),
                );
            }
            Ok(WriteOutcome::NeedsReview { reason, .. }) => {
                let skip_reason = match reason {
                    ReviewReason::MissingRate { .. } => SkipReason::MissingRate,
                    ReviewReason::UnresolvedAgent { .. } => SkipReason::NoAgent,
                };
                report.skip(member.id(), skip_reason, reason.to_string());
            }
            Err(err) => {
                warn!(member_id = member.id(), error = %err, "reconciliation skipped member");
                report.skip(member.id(), SkipReason::StorageFailure, err.to_string());
            }
        }
    }

    report.finished_at = clock.now();
    info!(
        run_id = %report.run_id,
        scanned = report.scanned,
        already_recorded = report.already_recorded,
        created = report.created,
        attributed_to_house = report.attributed_to_house,
        missing_rate = report.skipped_count(SkipReason::MissingRate),
        no_agent = report.skipped_count(SkipReason::NoAgent),
        raced = report.skipped_count(SkipReason::AlreadyRecorded),
        failed = report.skipped_count(SkipReason::StorageFailure),
        "reconciliation complete"
    );
    Ok(report)
}
