//! Query Tests
//!
//! Critical invariants tested:
//! - Totals sum stored amounts and are keyed by agent number
//! - Period-to-date windows start at UTC month/year boundaries
//! - Payment-status filters select payable rows
//! - Export rows keep the camelCase shape consumers read

use chrono::{DateTime, TimeZone, Utc};
use commission_ledger_core_rs::config::LedgerConfig;
use commission_ledger_core_rs::core::FixedClock;
use commission_ledger_core_rs::ledger::CommissionLedger;
use commission_ledger_core_rs::models::agent::{Agent, AgentNumber, AgentRole};
use commission_ledger_core_rs::models::commission::{CommissionStatus, PaymentStatus};
use commission_ledger_core_rs::models::member::{EnrollmentEvent, Member, MemberId};
use commission_ledger_core_rs::query::{CommissionFilter, Period};
use commission_ledger_core_rs::store::InMemoryCommissionStore;

type Ledger = CommissionLedger<InMemoryCommissionStore, FixedClock>;

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 15, 30, 0).unwrap()
}

fn number(raw: &str) -> AgentNumber {
    AgentNumber::parse(raw).unwrap()
}

/// Ledger with two agents and five rows spread over two years
///
/// | member | agent          | plan              | created    |
/// |--------|----------------|-------------------|------------|
/// | 1      | MPPAG20250001  | Base/Member Only  | 2024-12-15 |
/// | 2      | MPPAG20250001  | Plus/Family       | 2025-01-10 |
/// | 3      | MPPAG20250001  | Elite/Member Only | 2025-03-02 |
/// | 4      | MPPAG20250002  | Base/Family       | 2025-03-05 |
/// | 5      | house          | Plus/Member Only  | 2025-03-06 |
fn ledger() -> Ledger {
    let mut ledger = CommissionLedger::new(
        LedgerConfig::default(),
        InMemoryCommissionStore::new(),
        FixedClock::new(at(2024, 12, 15)),
    )
    .unwrap();
    for id in ["usr_a", "usr_b"] {
        let n = ledger
            .directory_mut()
            .issue_agent_number(AgentRole::Agent, 2025)
            .unwrap();
        ledger
            .register_agent(Agent::new(id.to_string(), n, id.to_string()))
            .unwrap();
    }

    let rows: [(MemberId, &str, &str, Option<&str>, DateTime<Utc>); 5] = [
        (1, "Base", "Member Only", Some("usr_a"), at(2024, 12, 15)),
        (2, "Plus", "Family", Some("usr_a"), at(2025, 1, 10)),
        (3, "Elite", "Member Only", Some("usr_a"), at(2025, 3, 2)),
        (4, "Base", "Family", Some("usr_b"), at(2025, 3, 5)),
        (5, "Plus", "Member Only", None, at(2025, 3, 6)),
    ];
    for (id, tier, coverage, agent, created) in rows {
        ledger.clock().set(created);
        ledger
            .record_enrollment(&Member::from_event(EnrollmentEvent {
                member_id: id,
                plan_tier: tier.to_string(),
                coverage_type: coverage.to_string(),
                add_ons: vec![],
                enrolling_agent_ref: agent.map(str::to_string),
                enrolled_at: created,
                monthly_price: 0,
            }))
            .unwrap();
    }
    ledger.clock().set(at(2025, 3, 20));
    ledger
}

fn commission_id(ledger: &Ledger, member_id: MemberId) -> String {
    use commission_ledger_core_rs::store::CommissionStore;
    ledger
        .store()
        .get_by_member(member_id)
        .unwrap()
        .unwrap()
        .id()
        .to_string()
}

// ============================================================================
// Totals
// ============================================================================

#[test]
fn test_totals_by_agent() {
    let ledger = ledger();
    let totals = ledger.query().totals_by_agent(&CommissionFilter::new()).unwrap();

    assert_eq!(totals.len(), 3);
    let a = &totals[&number("MPPAG20250001")];
    assert_eq!((a.count, a.amount), (3, 900 + 4_000 + 2_000));
    let b = &totals[&number("MPPAG20250002")];
    assert_eq!((b.count, b.amount), (1, 1_700));
    let house = &totals[&number("MPPHQ20000001")];
    assert_eq!((house.count, house.amount), (1, 2_000));

    assert_eq!(ledger.query().total(&CommissionFilter::new()).unwrap(), 10_600);
}

#[test]
fn test_period_to_date() {
    let ledger = ledger();
    let q = ledger.query();
    let a = number("MPPAG20250001");
    let now = at(2025, 3, 20);

    assert_eq!(q.month_to_date(&a, now).unwrap(), 2_000);
    assert_eq!(q.year_to_date(&a, now).unwrap(), 6_000);
    assert_eq!(q.lifetime(&a).unwrap(), 6_900);
}

#[test]
fn test_backfill_counts_toward_enrollment_period() {
    let mut ledger = ledger();
    let enrolled = at(2025, 2, 14);
    let late = Member::from_event(EnrollmentEvent {
        member_id: 6,
        plan_tier: "Base".to_string(),
        coverage_type: "Member Only".to_string(),
        add_ons: vec![],
        enrolling_agent_ref: Some("usr_a".to_string()),
        enrolled_at: enrolled,
        monthly_price: 0,
    });
    let report = ledger.reconcile(&vec![late]).unwrap();
    assert_eq!(report.created, 1);

    let q = ledger.query();
    let a = number("MPPAG20250001");
    // Written in March, enrolled in February
    assert_eq!(q.month_to_date(&a, at(2025, 3, 20)).unwrap(), 2_000);
    assert_eq!(q.year_to_date(&a, at(2025, 3, 20)).unwrap(), 6_900);

    let in_march = CommissionFilter::new()
        .with_agent_number(a)
        .created_between(Some(at(2025, 3, 1)), None);
    assert_eq!(q.count(&in_march).unwrap(), 2);
}

#[test]
fn test_period_boundaries_are_utc_midnight() {
    let now = Utc.with_ymd_and_hms(2025, 3, 20, 23, 59, 59).unwrap();
    assert_eq!(
        Period::Month.start(now),
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
    );
    assert_eq!(
        Period::Year.start(now),
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    );
}

#[test]
fn test_created_between_is_half_open() {
    let ledger = ledger();
    let filter =
        CommissionFilter::new().created_between(Some(at(2025, 1, 10)), Some(at(2025, 3, 5)));
    let members: Vec<MemberId> = ledger
        .query()
        .list(&filter)
        .unwrap()
        .iter()
        .map(|c| c.member_id())
        .collect();
    assert_eq!(members, vec![2, 3]);
}

// ============================================================================
// Payment status
// ============================================================================

#[test]
fn test_payment_status_filter() {
    let mut ledger = ledger();
    let paid = commission_id(&ledger, 2);
    let pending = commission_id(&ledger, 3);
    ledger.set_payment_status(&paid, PaymentStatus::Paid).unwrap();
    ledger.set_payment_status(&pending, PaymentStatus::Pending).unwrap();

    let q = ledger.query();
    let a = number("MPPAG20250001");
    let unpaid = CommissionFilter::new()
        .with_agent_number(a.clone())
        .payment_status(PaymentStatus::Unpaid);
    assert_eq!(q.total(&unpaid).unwrap(), 900);

    let now = at(2025, 3, 20);
    assert_eq!(
        q.period_to_date(&a, Period::Year, now, Some(PaymentStatus::Paid)).unwrap(),
        4_000
    );
    assert_eq!(
        q.count(&CommissionFilter::new().status(CommissionStatus::Paid)).unwrap(),
        1
    );
}

// ============================================================================
// Export
// ============================================================================

#[test]
fn test_export_shape() {
    let mut ledger = ledger();
    let id = commission_id(&ledger, 4);
    ledger.set_payment_status(&id, PaymentStatus::Paid).unwrap();

    let rows = ledger
        .query()
        .export_rows(&CommissionFilter::new().agent_number("MPPAG20250002").unwrap())
        .unwrap();
    assert_eq!(rows.len(), 1);

    let json = serde_json::to_value(&rows[0]).unwrap();
    assert_eq!(json["id"], id.as_str());
    assert_eq!(json["agentNumber"], "MPPAG20250002");
    assert_eq!(json["memberId"], 4);
    assert_eq!(json["planTierAtEnrollment"], "Base");
    assert_eq!(json["coverageTypeAtEnrollment"], "Family");
    assert_eq!(json["amount"], 1_700);
    assert!(json.get("createdAt").is_some());
    assert!(json.get("paidAt").is_some());
}

#[test]
fn test_unpaid_export_omits_paid_at() {
    let ledger = ledger();
    let rows = ledger.query().export_rows(&CommissionFilter::new()).unwrap();
    assert_eq!(rows.len(), 5);
    let json = serde_json::to_value(&rows[0]).unwrap();
    assert!(json.get("paidAt").is_none());
}
