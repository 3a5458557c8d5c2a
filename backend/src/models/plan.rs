//! Plan model
//!
//! Plan tier, coverage type and add-ons arrive from the enrollment form as
//! free text. Parsing goes through one normaliser so that spelling drift
//! ("Member + Spouse" vs "member_spouse") maps to the same variant, while
//! anything genuinely unknown stays unknown instead of falling back to a
//! default.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Lowercase and drop everything that is not alphanumeric
fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Plan tier (commission bracket)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PlanTier {
    Base,
    Plus,
    Elite,
}

impl PlanTier {
    pub const ALL: [PlanTier; 3] = [PlanTier::Base, PlanTier::Plus, PlanTier::Elite];

    /// Parse a tier name
    ///
    /// # Example
    /// ```
    /// use commission_ledger_core_rs::models::plan::PlanTier;
    ///
    /// assert_eq!(PlanTier::parse(" plus "), Some(PlanTier::Plus));
    /// assert_eq!(PlanTier::parse("Unknown Plan"), None);
    /// ```
    pub fn parse(raw: &str) -> Option<Self> {
        match normalize(raw).as_str() {
            "base" => Some(PlanTier::Base),
            "plus" => Some(PlanTier::Plus),
            "elite" => Some(PlanTier::Elite),
            _ => None,
        }
    }

    /// Canonical display label
    pub fn label(&self) -> &'static str {
        match self {
            PlanTier::Base => "Base",
            PlanTier::Plus => "Plus",
            PlanTier::Elite => "Elite",
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Household composition covered by the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CoverageType {
    MemberOnly,
    MemberSpouse,
    MemberChildren,
    Family,
}

impl CoverageType {
    pub const ALL: [CoverageType; 4] = [
        CoverageType::MemberOnly,
        CoverageType::MemberSpouse,
        CoverageType::MemberChildren,
        CoverageType::Family,
    ];

    /// Parse a coverage name, accepting the spellings used by the form
    ///
    /// # Example
    /// ```
    /// use commission_ledger_core_rs::models::plan::CoverageType;
    ///
    /// assert_eq!(CoverageType::parse("Member + Child(ren)"), Some(CoverageType::MemberChildren));
    /// assert_eq!(CoverageType::parse("member_spouse"), Some(CoverageType::MemberSpouse));
    /// assert_eq!(CoverageType::parse("Household"), None);
    /// ```
    pub fn parse(raw: &str) -> Option<Self> {
        match normalize(raw).as_str() {
            "memberonly" | "mo" | "individual" => Some(CoverageType::MemberOnly),
            "memberspouse" | "ms" => Some(CoverageType::MemberSpouse),
            "memberchild" | "memberchildren" | "mc" => {
                Some(CoverageType::MemberChildren)
            }
            "family" | "fam" => Some(CoverageType::Family),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CoverageType::MemberOnly => "Member Only",
            CoverageType::MemberSpouse => "Member + Spouse",
            CoverageType::MemberChildren => "Member + Child(ren)",
            CoverageType::Family => "Family",
        }
    }
}

impl fmt::Display for CoverageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Flat-rate plan add-on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AddOn {
    /// Prescription discount card
    PrescriptionDiscount,
}

impl AddOn {
    pub const ALL: [AddOn; 1] = [AddOn::PrescriptionDiscount];

    pub fn parse(raw: &str) -> Option<Self> {
        match normalize(raw).as_str() {
            "rx" | "rxdiscount" | "prescription" | "prescriptiondiscount" => {
                Some(AddOn::PrescriptionDiscount)
            }
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AddOn::PrescriptionDiscount => "Prescription Discount",
        }
    }
}

impl fmt::Display for AddOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Plan selection exactly as entered on the form
///
/// Kept raw so that an unparseable name reaches the rate table and fails
/// there, where the failure is flagged for review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSelection {
    pub tier: String,
    pub coverage: String,
    #[serde(default)]
    pub add_ons: Vec<String>,
}

impl PlanSelection {
    pub fn new(tier: impl Into<String>, coverage: impl Into<String>) -> Self {
        Self {
            tier: tier.into(),
            coverage: coverage.into(),
            add_ons: Vec::new(),
        }
    }

    /// Add an add-on (builder pattern)
    pub fn with_add_on(mut self, add_on: impl Into<String>) -> Self {
        self.add_ons.push(add_on.into());
        self
    }
}

/// Plan selection after successful parsing
///
/// Stored on every commission row so the amount can be audited against the
/// plan it was computed from, independent of later rate-table edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSnapshot {
    pub tier: PlanTier,
    pub coverage: CoverageType,
    pub add_ons: BTreeSet<AddOn>,
}

impl PlanSnapshot {
    pub fn new(tier: PlanTier, coverage: CoverageType) -> Self {
        Self {
            tier,
            coverage,
            add_ons: BTreeSet::new(),
        }
    }

    pub fn with_add_on(mut self, add_on: AddOn) -> Self {
        self.add_ons.insert(add_on);
        self
    }

    pub fn has_add_on(&self, add_on: AddOn) -> bool {
        self.add_ons.contains(&add_on)
    }
}
