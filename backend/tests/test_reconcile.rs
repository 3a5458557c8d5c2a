//! Reconciliation Tests
//!
//! Critical invariants tested:
//! - Convergence: a second run over unchanged data creates nothing
//! - Per-member failures are reported, never abort the run
//! - A member recorded between scan and insert is not double-counted
//! - Backfilled amounts come from the plan as enrolled

use chrono::{DateTime, TimeZone, Utc};
use commission_ledger_core_rs::core::{Clock, FixedClock};
use commission_ledger_core_rs::identity::AgentDirectory;
use commission_ledger_core_rs::models::agent::{Agent, AgentNumber};
use commission_ledger_core_rs::models::commission::{Commission, PaymentStatus};
use commission_ledger_core_rs::models::member::{EnrollmentEvent, Member, MemberId};
use commission_ledger_core_rs::models::plan::PlanSelection;
use commission_ledger_core_rs::models::review::ReviewFlag;
use commission_ledger_core_rs::rates::RateTable;
use commission_ledger_core_rs::reconcile::{reconcile, SkipReason};
use commission_ledger_core_rs::store::{
    CommissionStore, InMemoryCommissionStore, InsertOutcome, StoreError,
};
use commission_ledger_core_rs::writer::{AttributionPolicy, CommissionWriter};
use std::collections::BTreeSet;

// ============================================================================
// Test stores
// ============================================================================

/// In-memory store with injectable faults
///
/// `fail_member` makes inserts for that member fail; `stale_index` makes the
/// recorded-member index come back empty, as if every row landed after the
/// reconciliation scan.
#[derive(Default)]
struct ScriptedStore {
    inner: InMemoryCommissionStore,
    fail_member: Option<MemberId>,
    stale_index: bool,
}

impl CommissionStore for ScriptedStore {
    fn insert_unique(&self, commission: Commission) -> Result<InsertOutcome, StoreError> {
        if Some(commission.member_id()) == self.fail_member {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        self.inner.insert_unique(commission)
    }

    fn get(&self, commission_id: &str) -> Result<Option<Commission>, StoreError> {
        self.inner.get(commission_id)
    }

    fn get_by_member(&self, member_id: MemberId) -> Result<Option<Commission>, StoreError> {
        self.inner.get_by_member(member_id)
    }

    fn recorded_member_ids(&self) -> Result<BTreeSet<MemberId>, StoreError> {
        if self.stale_index {
            return Ok(BTreeSet::new());
        }
        self.inner.recorded_member_ids()
    }

    fn list(&self) -> Result<Vec<Commission>, StoreError> {
        self.inner.list()
    }

    fn repoint_agent(&self, retired_id: &str, survivor_id: &str) -> Result<usize, StoreError> {
        self.inner.repoint_agent(retired_id, survivor_id)
    }

    fn approve(&self, commission_id: &str) -> Result<Commission, StoreError> {
        self.inner.approve(commission_id)
    }

    fn set_payment_status(
        &self,
        commission_id: &str,
        status: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<Commission, StoreError> {
        self.inner.set_payment_status(commission_id, status, at)
    }

    fn flag_for_review(&self, flag: ReviewFlag) -> Result<(), StoreError> {
        self.inner.flag_for_review(flag)
    }

    fn clear_review_flag(&self, member_id: MemberId) -> Result<bool, StoreError> {
        self.inner.clear_review_flag(member_id)
    }

    fn review_flags(&self) -> Result<Vec<ReviewFlag>, StoreError> {
        self.inner.review_flags()
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn clock() -> FixedClock {
    FixedClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 2, 0, 0).unwrap())
}

fn directory() -> AgentDirectory {
    let mut dir = AgentDirectory::new(Agent::new(
        "house".to_string(),
        AgentNumber::parse("MPPHQ20000001").unwrap(),
        "Home Office".to_string(),
    ));
    dir.register(
        Agent::new(
            "usr_a".to_string(),
            AgentNumber::parse("MPPAG20250001").unwrap(),
            "Dana Reyes".to_string(),
        )
        .with_email("dana@example.com"),
    )
    .unwrap();
    dir
}

fn fixture() -> (RateTable, AgentDirectory, InMemoryCommissionStore, FixedClock) {
    (RateTable::standard(), directory(), InMemoryCommissionStore::new(), clock())
}

fn member(id: MemberId, tier: &str, coverage: &str, agent: Option<&str>) -> Member {
    Member::from_event(EnrollmentEvent {
        member_id: id,
        plan_tier: tier.to_string(),
        coverage_type: coverage.to_string(),
        add_ons: vec![],
        enrolling_agent_ref: agent.map(str::to_string),
        enrolled_at: Utc.with_ymd_and_hms(2025, 5, 20, 12, 0, 0).unwrap(),
        monthly_price: 0,
    })
}

fn members() -> Vec<Member> {
    vec![
        member(3, "Elite", "Family", Some("usr_a")),
        member(1, "Base", "Member Only", Some("dana@example.com")),
        member(2, "Plus", "Member + Spouse", None),
        member(4, "Unknown Plan", "Family", Some("usr_a")),
    ]
}

// ============================================================================
// Convergence
// ============================================================================

#[test]
fn test_backfill_then_converge() {
    let (rates, dir, store, clock) = fixture();
    let writer = CommissionWriter::new(&rates, &dir, &store, &clock, AttributionPolicy::default());
    let source = members();

    let first = reconcile(&writer, &store, &clock, &source).unwrap();
    assert_eq!(first.scanned, 4);
    assert_eq!(first.created, 3);
    assert_eq!(first.already_recorded, 0);
    assert_eq!(first.attributed_to_house, 1);
    assert_eq!(first.skipped_count(SkipReason::MissingRate), 1);
    assert_eq!(first.skipped[0].member_id, 4);

    // Backfill runs in member-id order
    let order: Vec<MemberId> = first.backfilled.iter().map(|b| b.member_id).collect();
    assert_eq!(order, vec![1, 2, 3]);

    let second = reconcile(&writer, &store, &clock, &source).unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.already_recorded, 3);
    // Still no rate for member 4; still skipped, still no row
    assert_eq!(second.skipped_count(SkipReason::MissingRate), 1);
    assert_eq!(store.len(), 3);
}

#[test]
fn test_existing_rows_are_left_alone() {
    let (rates, dir, store, clock) = fixture();
    let writer = CommissionWriter::new(&rates, &dir, &store, &clock, AttributionPolicy::default());
    let source = members();

    let live = writer.write(&source[1]).unwrap();
    let before = live.commission().unwrap().clone();

    let report = reconcile(&writer, &store, &clock, &source).unwrap();
    assert_eq!(report.already_recorded, 1);
    assert_eq!(store.get_by_member(1).unwrap().unwrap(), before);
}

// ============================================================================
// Failures and races
// ============================================================================

#[test]
fn test_storage_failure_skips_one_member() {
    let (rates, dir, clock) = (RateTable::standard(), directory(), clock());
    let store = ScriptedStore {
        fail_member: Some(2),
        ..Default::default()
    };
    let writer = CommissionWriter::new(&rates, &dir, &store, &clock, AttributionPolicy::default());

    let report = reconcile(&writer, &store, &clock, &members()).unwrap();
    assert_eq!(report.created, 2);
    assert_eq!(report.skipped_count(SkipReason::StorageFailure), 1);
    assert_eq!(report.skipped_count(SkipReason::MissingRate), 1);
    assert!(store.get_by_member(2).unwrap().is_none());
    assert!(store.get_by_member(3).unwrap().is_some());

    let failed = report
        .skipped
        .iter()
        .find(|s| s.reason == SkipReason::StorageFailure)
        .unwrap();
    assert_eq!(failed.member_id, 2);
    assert!(failed.detail.contains("connection reset"));
}

#[test]
fn test_row_written_after_scan_is_not_duplicated() {
    let (rates, dir, clock) = (RateTable::standard(), directory(), clock());
    let store = ScriptedStore {
        stale_index: true,
        ..Default::default()
    };
    let writer = CommissionWriter::new(&rates, &dir, &store, &clock, AttributionPolicy::default());
    let source = members();

    // The live write path wins the race for member 1
    writer.write(&source[1]).unwrap();

    let report = reconcile(&writer, &store, &clock, &source).unwrap();
    assert_eq!(report.skipped_count(SkipReason::AlreadyRecorded), 1);
    assert_eq!(report.created, 2);
    assert_eq!(store.list().unwrap().len(), 3);
}

#[test]
fn test_hq_agent_rows_are_not_counted_as_house() {
    let (rates, mut dir, store, clock) = fixture();
    dir.register(Agent::new(
        "usr_hq".to_string(),
        AgentNumber::parse("MPPHQ20250001").unwrap(),
        "Regional Office".to_string(),
    ))
    .unwrap();
    let writer = CommissionWriter::new(&rates, &dir, &store, &clock, AttributionPolicy::default());

    let source = vec![
        member(1, "Base", "Family", Some("usr_hq")),
        member(2, "Base", "Family", None),
    ];
    let report = reconcile(&writer, &store, &clock, &source).unwrap();
    assert_eq!(report.created, 2);
    assert_eq!(report.attributed_to_house, 1);
    assert!(!report.backfilled[0].house);
    assert!(report.backfilled[1].house);
}

#[test]
fn test_strict_policy_reports_no_agent() {
    let (rates, dir, store, clock) = fixture();
    let strict = AttributionPolicy {
        house_fallback: false,
    };
    let writer = CommissionWriter::new(&rates, &dir, &store, &clock, strict);

    let report = reconcile(&writer, &store, &clock, &members()).unwrap();
    assert_eq!(report.skipped_count(SkipReason::NoAgent), 1);
    assert_eq!(report.attributed_to_house, 0);
    assert_eq!(report.total_skipped(), 2);
}

// ============================================================================
// Snapshot semantics
// ============================================================================

#[test]
fn test_backfill_uses_plan_as_enrolled() {
    let (rates, dir, store, clock) = fixture();
    let writer = CommissionWriter::new(&rates, &dir, &store, &clock, AttributionPolicy::default());

    let mut upgraded = member(9, "Base", "Member Only", Some("usr_a"));
    upgraded.change_plan(PlanSelection::new("Elite", "Family"), 24_900);

    let report = reconcile(&writer, &store, &clock, &vec![upgraded]).unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(report.backfilled[0].amount, 900);
    assert_eq!(store.get_by_member(9).unwrap().unwrap().amount(), 900);
}

#[test]
fn test_report_timestamps_and_serialization() {
    let (rates, dir, store, clock) = fixture();
    let writer = CommissionWriter::new(&rates, &dir, &store, &clock, AttributionPolicy::default());

    let report = reconcile(&writer, &store, &clock, &members()).unwrap();
    assert_eq!(report.started_at, clock.now());
    assert!(!report.run_id.is_empty());

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["created"], 3);
    assert_eq!(json["skipped"].as_array().unwrap().len(), 1);
}
