//! Member (enrollment) model
//!
//! Members are owned by the enrollment system; this crate only reads them.
//! A member keeps the plan it enrolled with separately from its current
//! plan, because commissions are always computed from the former.
//!
//! CRITICAL: All money values are i64 (cents)

use crate::models::plan::PlanSelection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Enrollment identifier (idempotency key for commissions)
pub type MemberId = u64;

/// Member creation event emitted by the enrollment system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentEvent {
    pub member_id: MemberId,
    pub plan_tier: String,
    pub coverage_type: String,
    #[serde(default)]
    pub add_ons: Vec<String>,
    /// Email, internal id, agent number or display name, as captured
    #[serde(default)]
    pub enrolling_agent_ref: Option<String>,
    pub enrolled_at: DateTime<Utc>,
    /// Monthly price charged (cents)
    #[serde(default)]
    pub monthly_price: i64,
}

/// Membership status (soft-status only, members are never deleted)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberStatus {
    Active,
    Cancelled { at: DateTime<Utc> },
}

/// An enrolled member
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use commission_ledger_core_rs::models::member::{EnrollmentEvent, Member};
/// use commission_ledger_core_rs::models::plan::PlanSelection;
///
/// let enrolled_at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
/// let mut member = Member::from_event(EnrollmentEvent {
///     member_id: 500,
///     plan_tier: "Base".to_string(),
///     coverage_type: "Member Only".to_string(),
///     add_ons: vec![],
///     enrolling_agent_ref: Some("dana@example.com".to_string()),
///     enrolled_at,
///     monthly_price: 4_900,
/// });
///
/// member.change_plan(PlanSelection::new("Plus", "Family"), 9_900);
/// assert_eq!(member.enrolled_plan().tier, "Base");
/// assert_eq!(member.current_plan().tier, "Plus");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    id: MemberId,

    /// Plan exactly as enrolled; never changes
    enrolled_plan: PlanSelection,

    /// Plan after any later plan changes
    current_plan: PlanSelection,

    /// Current monthly price (cents)
    monthly_price: i64,

    enrolling_agent_ref: Option<String>,

    enrolled_at: DateTime<Utc>,

    status: MemberStatus,
}

impl Member {
    /// Create a member from its creation event
    pub fn from_event(event: EnrollmentEvent) -> Self {
        let plan = PlanSelection {
            tier: event.plan_tier,
            coverage: event.coverage_type,
            add_ons: event.add_ons,
        };
        Self {
            id: event.member_id,
            enrolled_plan: plan.clone(),
            current_plan: plan,
            monthly_price: event.monthly_price,
            enrolling_agent_ref: event.enrolling_agent_ref,
            enrolled_at: event.enrolled_at,
            status: MemberStatus::Active,
        }
    }

    pub fn id(&self) -> MemberId {
        self.id
    }

    pub fn enrolled_plan(&self) -> &PlanSelection {
        &self.enrolled_plan
    }

    pub fn current_plan(&self) -> &PlanSelection {
        &self.current_plan
    }

    pub fn monthly_price(&self) -> i64 {
        self.monthly_price
    }

    pub fn enrolling_agent_ref(&self) -> Option<&str> {
        self.enrolling_agent_ref.as_deref()
    }

    pub fn enrolled_at(&self) -> DateTime<Utc> {
        self.enrolled_at
    }

    pub fn status(&self) -> &MemberStatus {
        &self.status
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, MemberStatus::Active)
    }

    /// Switch to a new plan; the enrolled plan is untouched
    pub fn change_plan(&mut self, plan: PlanSelection, monthly_price: i64) {
        self.current_plan = plan;
        self.monthly_price = monthly_price;
    }

    /// Cancel the membership; cancelling twice keeps the first date
    pub fn cancel(&mut self, at: DateTime<Utc>) {
        if self.is_active() {
            self.status = MemberStatus::Cancelled { at };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event() -> EnrollmentEvent {
        EnrollmentEvent {
            member_id: 7,
            plan_tier: "Elite".to_string(),
            coverage_type: "Member + Spouse".to_string(),
            add_ons: vec!["Rx".to_string()],
            enrolling_agent_ref: None,
            enrolled_at: Utc.with_ymd_and_hms(2025, 1, 10, 8, 30, 0).unwrap(),
            monthly_price: 12_900,
        }
    }

    #[test]
    fn test_cancel_keeps_first_date() {
        let mut member = Member::from_event(event());
        let first = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();

        member.cancel(first);
        member.cancel(second);

        assert_eq!(member.status(), &MemberStatus::Cancelled { at: first });
        assert!(!member.is_active());
    }

    #[test]
    fn test_event_deserializes_from_camel_case() {
        let json = r#"{
            "memberId": 500,
            "planTier": "Plus",
            "coverageType": "Family",
            "addOns": ["Rx"],
            "enrollingAgentRef": "MPPAG20250042",
            "enrolledAt": "2025-03-01T12:00:00Z"
        }"#;
        let event: EnrollmentEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.member_id, 500);
        assert_eq!(event.monthly_price, 0);
        assert_eq!(event.enrolling_agent_ref.as_deref(), Some("MPPAG20250042"));
    }
}
