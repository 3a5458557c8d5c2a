//! Rate Table Tests
//!
//! Critical invariants tested:
//! - Completeness: every (tier, coverage) pair of the schedule is priced
//! - No defaults: anything outside the schedule is NotFound
//! - Add-on additivity: Rx adds exactly 250 cents to every pair
//! - Rate edits only affect later quotes

use commission_ledger_core_rs::models::plan::{AddOn, CoverageType, PlanSelection, PlanTier};
use commission_ledger_core_rs::rates::{calculate_commission, RateEntry, RateError, RateTable};
use proptest::prelude::*;

// ============================================================================
// Schedule
// ============================================================================

#[test]
fn test_full_schedule() {
    let expected = [
        ("Base", "Member Only", 900),
        ("Base", "Member + Spouse", 1500),
        ("Base", "Member + Child(ren)", 1700),
        ("Base", "Family", 1700),
        ("Plus", "Member Only", 2000),
        ("Plus", "Member + Spouse", 4000),
        ("Plus", "Member + Child(ren)", 4000),
        ("Plus", "Family", 4000),
        ("Elite", "Member Only", 2000),
        ("Elite", "Member + Spouse", 4000),
        ("Elite", "Member + Child(ren)", 4000),
        ("Elite", "Family", 4000),
    ];

    for (tier, coverage, amount) in expected {
        let quote = calculate_commission(tier, coverage, &[]).unwrap();
        assert_eq!(quote.amount, amount, "{} / {}", tier, coverage);
        assert_eq!(quote.total_plan_cost, None);
    }
    assert_eq!(RateTable::standard().entries().count(), 12);
}

#[test]
fn test_scenario_base_member_only() {
    assert_eq!(calculate_commission("Base", "Member Only", &[]).unwrap().amount, 900);
}

#[test]
fn test_scenario_plus_family_with_rx() {
    let quote = calculate_commission("Plus", "Family", &["Rx".to_string()]).unwrap();
    assert_eq!(quote.amount, 4250);
}

#[test]
fn test_scenario_elite_member_spouse() {
    assert_eq!(
        calculate_commission("Elite", "Member+Spouse", &[]).unwrap().amount,
        4000
    );
}

#[test]
fn test_scenario_unknown_plan_is_not_found() {
    assert_eq!(
        calculate_commission("Unknown Plan", "Member Only", &[]),
        Err(RateError::NotFound {
            tier: "Unknown Plan".to_string(),
            coverage: "Member Only".to_string(),
        })
    );
}

#[test]
fn test_unknown_coverage_and_add_on() {
    assert!(matches!(
        calculate_commission("Base", "Household", &[]),
        Err(RateError::NotFound { .. })
    ));
    assert_eq!(
        calculate_commission("Base", "Family", &["Dental".to_string()]),
        Err(RateError::UnknownAddOn {
            add_on: "Dental".to_string()
        })
    );
}

#[test]
fn test_aliases_resolve_to_same_rate() {
    for coverage in ["Member + Child(ren)", "member_children", "MC", "Member+Children"] {
        assert_eq!(
            calculate_commission("base", coverage, &[]).unwrap().amount,
            1700,
            "{}",
            coverage
        );
    }
}

// ============================================================================
// Edits
// ============================================================================

#[test]
fn test_removed_pair_is_not_found() {
    let mut table = RateTable::standard();
    table.remove_rate(PlanTier::Elite, CoverageType::Family);
    assert!(matches!(
        table.calculate_commission("Elite", "Family", &[]),
        Err(RateError::NotFound { .. })
    ));
}

#[test]
fn test_edit_changes_only_new_quotes() {
    let mut table = RateTable::standard();
    let snapshot = table
        .snapshot(&PlanSelection::new("Base", "Member Only"))
        .unwrap();
    let before = table.quote(&snapshot).unwrap();

    table.set_rate(PlanTier::Base, CoverageType::MemberOnly, RateEntry::commission(1100));
    assert_eq!(before.amount, 900);
    assert_eq!(table.quote(&snapshot).unwrap().amount, 1100);
}

#[test]
fn test_total_plan_cost_needs_every_premium() {
    let mut table = RateTable::standard();
    table.set_rate(
        PlanTier::Plus,
        CoverageType::Family,
        RateEntry::commission(4000).with_premium(19_900),
    );
    let with_rx = vec!["Rx".to_string()];

    // Add-on has no premium configured
    assert_eq!(
        table.calculate_commission("Plus", "Family", &with_rx).unwrap().total_plan_cost,
        None
    );

    table.set_add_on_rate(
        AddOn::PrescriptionDiscount,
        RateEntry::commission(250).with_premium(1_000),
    );
    let quote = table.calculate_commission("Plus", "Family", &with_rx).unwrap();
    assert_eq!(quote.amount, 4250);
    assert_eq!(quote.total_plan_cost, Some(20_900));
}

// ============================================================================
// Properties
// ============================================================================

fn arb_pair() -> impl Strategy<Value = (PlanTier, CoverageType)> {
    (
        prop::sample::select(PlanTier::ALL.to_vec()),
        prop::sample::select(CoverageType::ALL.to_vec()),
    )
}

proptest! {
    #[test]
    fn prop_rx_adds_250(pair in arb_pair()) {
        let (tier, coverage) = pair;
        let base = calculate_commission(tier.label(), coverage.label(), &[]).unwrap();
        let with_rx =
            calculate_commission(tier.label(), coverage.label(), &["Rx".to_string()]).unwrap();
        prop_assert_eq!(with_rx.amount - base.amount, 250);
    }

    #[test]
    fn prop_lookup_is_deterministic(pair in arb_pair()) {
        let (tier, coverage) = pair;
        let first = calculate_commission(tier.label(), coverage.label(), &[]);
        let second = calculate_commission(tier.label(), coverage.label(), &[]);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_unknown_tier_never_priced(name in "[A-Za-z ]{1,16}") {
        prop_assume!(PlanTier::parse(&name).is_none());
        let is_not_found = matches!(
            calculate_commission(&name, "Member Only", &[]),
            Err(RateError::NotFound { .. })
        );
        prop_assert!(is_not_found);
    }
}
