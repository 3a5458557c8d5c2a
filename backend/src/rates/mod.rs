//! Rate Table
//!
//! Single source of truth for commission pricing. Maps a plan snapshot
//! (tier, coverage, add-ons) to a commission amount.
//!
//! # Standard schedule (cents)
//!
//! ```text
//!          Member Only  +Spouse  +Child(ren)  Family
//! Base          900      1500       1700       1700
//! Plus         2000      4000       4000       4000
//! Elite        2000      4000       4000       4000
//!
//! Prescription discount add-on: +250 on any pair
//! ```
//!
//! # Critical Invariants
//!
//! 1. **No default rate**: an unmapped (tier, coverage) pair is `NotFound`
//! 2. **Purity**: quoting performs no I/O and never mutates the table
//! 3. **Add-on additivity**: each add-on contributes a flat amount

use crate::models::plan::{AddOn, CoverageType, PlanSelection, PlanSnapshot, PlanTier};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors raised by rate lookups
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RateError {
    #[error("No commission rate for tier '{tier}' with coverage '{coverage}'")]
    NotFound { tier: String, coverage: String },

    #[error("Unknown add-on '{add_on}'")]
    UnknownAddOn { add_on: String },

    #[error("Commission total for '{plan}' overflows")]
    Overflow { plan: String },
}

/// One priced cell of the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateEntry {
    /// Commission paid to the agent (cents)
    pub commission: i64,

    /// Monthly premium charged to the member (cents), when known
    #[serde(default)]
    pub premium: Option<i64>,
}

impl RateEntry {
    pub fn commission(commission: i64) -> Self {
        Self {
            commission,
            premium: None,
        }
    }

    pub fn with_premium(mut self, premium: i64) -> Self {
        self.premium = Some(premium);
        self
    }
}

/// Result of a successful rate lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateQuote {
    /// Commission amount including add-ons (cents)
    pub amount: i64,

    /// Monthly plan cost including add-ons (cents), `None` when any priced
    /// part has no premium configured
    pub total_plan_cost: Option<i64>,
}

/// Commission rate table
///
/// # Example
/// ```
/// use commission_ledger_core_rs::rates::RateTable;
///
/// let table = RateTable::standard();
/// let quote = table
///     .calculate_commission("Plus", "Family", &["Rx".to_string()])
///     .unwrap();
/// assert_eq!(quote.amount, 4250);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateTable {
    plans: BTreeMap<(PlanTier, CoverageType), RateEntry>,
    add_ons: BTreeMap<AddOn, RateEntry>,
}

impl RateTable {
    /// Empty table: every lookup fails until rates are set
    pub fn empty() -> Self {
        Self {
            plans: BTreeMap::new(),
            add_ons: BTreeMap::new(),
        }
    }

    /// The published commission schedule
    pub fn standard() -> Self {
        use CoverageType::*;
        use PlanTier::*;

        let mut table = Self::empty();
        let schedule: [(PlanTier, [i64; 4]); 3] = [
            (Base, [900, 1500, 1700, 1700]),
            (Plus, [2000, 4000, 4000, 4000]),
            (Elite, [2000, 4000, 4000, 4000]),
        ];
        for (tier, amounts) in schedule {
            for (coverage, amount) in [MemberOnly, MemberSpouse, MemberChildren, Family]
                .into_iter()
                .zip(amounts)
            {
                table.set_rate(tier, coverage, RateEntry::commission(amount));
            }
        }
        table.set_add_on_rate(AddOn::PrescriptionDiscount, RateEntry::commission(250));
        table
    }

    /// Set or replace the rate for a (tier, coverage) pair
    ///
    /// Only affects future quotes; existing commission rows keep the amount
    /// they were written with.
    pub fn set_rate(&mut self, tier: PlanTier, coverage: CoverageType, entry: RateEntry) {
        self.plans.insert((tier, coverage), entry);
    }

    /// Remove a pair, making it a lookup failure
    pub fn remove_rate(&mut self, tier: PlanTier, coverage: CoverageType) -> Option<RateEntry> {
        self.plans.remove(&(tier, coverage))
    }

    pub fn set_add_on_rate(&mut self, add_on: AddOn, entry: RateEntry) {
        self.add_ons.insert(add_on, entry);
    }

    pub fn remove_add_on_rate(&mut self, add_on: AddOn) -> Option<RateEntry> {
        self.add_ons.remove(&add_on)
    }

    pub fn rate(&self, tier: PlanTier, coverage: CoverageType) -> Option<&RateEntry> {
        self.plans.get(&(tier, coverage))
    }

    pub fn add_on_rate(&self, add_on: AddOn) -> Option<&RateEntry> {
        self.add_ons.get(&add_on)
    }

    /// All priced pairs in (tier, coverage) order
    pub fn entries(&self) -> impl Iterator<Item = (PlanTier, CoverageType, &RateEntry)> {
        self.plans.iter().map(|((t, c), e)| (*t, *c, e))
    }

    pub fn add_on_entries(&self) -> impl Iterator<Item = (AddOn, &RateEntry)> {
        self.add_ons.iter().map(|(a, e)| (*a, e))
    }

    /// Parse a raw plan selection into a snapshot
    ///
    /// Fails with `NotFound` when the tier or coverage name is unknown, or
    /// when the parsed pair has no rate in this table.
    pub fn snapshot(&self, selection: &PlanSelection) -> Result<PlanSnapshot, RateError> {
        let not_found = || RateError::NotFound {
            tier: selection.tier.clone(),
            coverage: selection.coverage.clone(),
        };

        let tier = PlanTier::parse(&selection.tier).ok_or_else(not_found)?;
        let coverage = CoverageType::parse(&selection.coverage).ok_or_else(not_found)?;
        if !self.plans.contains_key(&(tier, coverage)) {
            return Err(not_found());
        }

        let add_ons = selection
            .add_ons
            .iter()
            .map(|raw| {
                AddOn::parse(raw).ok_or_else(|| RateError::UnknownAddOn {
                    add_on: raw.clone(),
                })
            })
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(PlanSnapshot {
            tier,
            coverage,
            add_ons,
        })
    }

    /// Quote a parsed snapshot
    pub fn quote(&self, snapshot: &PlanSnapshot) -> Result<RateQuote, RateError> {
        let base = self
            .rate(snapshot.tier, snapshot.coverage)
            .ok_or_else(|| RateError::NotFound {
                tier: snapshot.tier.label().to_string(),
                coverage: snapshot.coverage.label().to_string(),
            })?;

        let overflow = || RateError::Overflow {
            plan: format!("{} / {}", snapshot.tier, snapshot.coverage),
        };

        let mut amount = base.commission;
        let mut total_plan_cost = base.premium;

        for add_on in &snapshot.add_ons {
            let entry = self
                .add_on_rate(*add_on)
                .ok_or_else(|| RateError::UnknownAddOn {
                    add_on: add_on.label().to_string(),
                })?;
            amount = amount.checked_add(entry.commission).ok_or_else(overflow)?;
            total_plan_cost = match (total_plan_cost, entry.premium) {
                (Some(total), Some(premium)) => {
                    Some(total.checked_add(premium).ok_or_else(overflow)?)
                }
                _ => None,
            };
        }

        Ok(RateQuote {
            amount,
            total_plan_cost,
        })
    }

    /// Look up the commission for free-text plan names
    pub fn calculate_commission(
        &self,
        tier: &str,
        coverage: &str,
        add_ons: &[String],
    ) -> Result<RateQuote, RateError> {
        let selection = PlanSelection {
            tier: tier.to_string(),
            coverage: coverage.to_string(),
            add_ons: add_ons.to_vec(),
        };
        let snapshot = self.snapshot(&selection)?;
        self.quote(&snapshot)
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Quote against the standard schedule
///
/// # Example
/// ```
/// use commission_ledger_core_rs::rates::{calculate_commission, RateError};
///
/// assert_eq!(calculate_commission("Base", "Member Only", &[]).unwrap().amount, 900);
/// assert!(matches!(
///     calculate_commission("Unknown Plan", "Member Only", &[]),
///     Err(RateError::NotFound { .. })
/// ));
/// ```
pub fn calculate_commission(
    tier: &str,
    coverage: &str,
    add_ons: &[String],
) -> Result<RateQuote, RateError> {
    RateTable::standard().calculate_commission(tier, coverage, add_ons)
}
