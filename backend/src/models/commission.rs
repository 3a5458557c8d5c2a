//! Commission model
//!
//! One commission row per member enrollment. Each row carries:
//! - Member id (unique across the ledger)
//! - Agent internal id (rewritten on agent merge) and agent number (never
//!   rewritten)
//! - Amount (i64 cents), fixed at creation
//! - The plan snapshot the amount was computed from
//! - Lifecycle status (Pending, Approved, Paid) and payment status
//!   (Unpaid, Pending, Paid)
//!
//! CRITICAL: All money values are i64 (cents)

use crate::models::agent::AgentNumber;
use crate::models::member::MemberId;
use crate::models::plan::PlanSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Commission lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommissionStatus {
    /// Written, awaiting admin review
    Pending,
    /// Approved for payout
    Approved,
    /// Paid out
    Paid,
}

impl fmt::Display for CommissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CommissionStatus::Pending => "pending",
            CommissionStatus::Approved => "approved",
            CommissionStatus::Paid => "paid",
        };
        f.write_str(label)
    }
}

/// Payout status, driven by the payout collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PaymentStatus {
    Unpaid,
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "unpaid" => Some(PaymentStatus::Unpaid),
            "pending" => Some(PaymentStatus::Pending),
            "paid" => Some(PaymentStatus::Paid),
            _ => None,
        }
    }

    /// Forward-only: unpaid -> pending -> paid, or unpaid -> paid
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        *self < next
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
        };
        f.write_str(label)
    }
}

/// Errors that can occur when moving a commission through its lifecycle
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Cannot move payment status from {from} to {to}")]
    InvalidPaymentTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("Cannot approve commission in status {status}")]
    CannotApprove { status: CommissionStatus },
}

/// A commission owed to an agent for one enrollment
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use commission_ledger_core_rs::models::agent::AgentNumber;
/// use commission_ledger_core_rs::models::commission::{Commission, PaymentStatus};
/// use commission_ledger_core_rs::models::plan::{CoverageType, PlanSnapshot, PlanTier};
///
/// let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
/// let mut commission = Commission::new(
///     500,
///     "usr_0191".to_string(),
///     AgentNumber::parse("MPPAG20250042").unwrap(),
///     900,
///     PlanSnapshot::new(PlanTier::Base, CoverageType::MemberOnly),
///     now,
///     now,
/// );
///
/// commission.set_payment_status(PaymentStatus::Paid, now).unwrap();
/// assert_eq!(commission.paid_at(), Some(now));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commission {
    /// Unique commission identifier (UUID)
    id: String,

    /// Enrollment this commission pays for (unique in the ledger)
    member_id: MemberId,

    /// Current internal id of the agent; rewritten on merge
    agent_internal_id: String,

    /// Durable agent number; never rewritten
    agent_number: AgentNumber,

    /// Attributed to the configured house identity at write time
    #[serde(default)]
    house: bool,

    /// Commission amount (i64 cents), fixed at creation
    amount: i64,

    /// Plan the amount was computed from
    plan: PlanSnapshot,

    status: CommissionStatus,

    payment_status: PaymentStatus,

    /// When the member enrolled
    enrolled_at: DateTime<Utc>,

    /// When this row was written
    created_at: DateTime<Utc>,

    paid_at: Option<DateTime<Utc>>,
}

impl Commission {
    /// Create a new pending, unpaid commission
    pub fn new(
        member_id: MemberId,
        agent_internal_id: String,
        agent_number: AgentNumber,
        amount: i64,
        plan: PlanSnapshot,
        enrolled_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            member_id,
            agent_internal_id,
            agent_number,
            house: false,
            amount,
            plan,
            status: CommissionStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            enrolled_at,
            created_at,
            paid_at: None,
        }
    }

    /// Restore a commission with every field preserved (snapshot loading)
    #[allow(clippy::too_many_arguments)]
    pub fn from_snapshot(
        id: String,
        member_id: MemberId,
        agent_internal_id: String,
        agent_number: AgentNumber,
        house: bool,
        amount: i64,
        plan: PlanSnapshot,
        status: CommissionStatus,
        payment_status: PaymentStatus,
        enrolled_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
        paid_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            member_id,
            agent_internal_id,
            agent_number,
            house,
            amount,
            plan,
            status,
            payment_status,
            enrolled_at,
            created_at,
            paid_at,
        }
    }

    /// Mark the row as a house attribution
    pub fn with_house_attribution(mut self, house: bool) -> Self {
        self.house = house;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn member_id(&self) -> MemberId {
        self.member_id
    }

    pub fn agent_internal_id(&self) -> &str {
        &self.agent_internal_id
    }

    pub fn agent_number(&self) -> &AgentNumber {
        &self.agent_number
    }

    /// Commission amount (i64 cents)
    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn plan(&self) -> &PlanSnapshot {
        &self.plan
    }

    pub fn status(&self) -> CommissionStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn enrolled_at(&self) -> DateTime<Utc> {
        self.enrolled_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    /// Attributed to the house identity rather than a field agent
    ///
    /// Fixed when the row is written; other HQ-role agents are not house.
    pub fn is_house(&self) -> bool {
        self.house
    }

    /// Approve for payout
    pub fn approve(&mut self) -> Result<(), TransitionError> {
        if self.status != CommissionStatus::Pending {
            return Err(TransitionError::CannotApprove {
                status: self.status,
            });
        }
        self.status = CommissionStatus::Approved;
        Ok(())
    }

    /// Advance the payment status
    ///
    /// Reaching `Paid` stamps `paid_at` and marks the commission `Paid`.
    /// The amount is never touched.
    pub fn set_payment_status(
        &mut self,
        next: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if !self.payment_status.can_transition_to(next) {
            return Err(TransitionError::InvalidPaymentTransition {
                from: self.payment_status,
                to: next,
            });
        }
        self.payment_status = next;
        if next == PaymentStatus::Paid {
            self.paid_at = Some(at);
            self.status = CommissionStatus::Paid;
        }
        Ok(())
    }

    /// Point the row at a surviving internal id after an agent merge
    pub(crate) fn repoint(&mut self, internal_id: &str) {
        self.agent_internal_id = internal_id.to_string();
    }
}
