//! Ledger configuration
//!
//! JSON-loadable configuration for the rate schedule, the house identity and
//! the attribution policy. `LedgerConfig::default()` is the published
//! schedule with the standard house identity.
//!
//! CRITICAL: All money values are i64 (cents)

use crate::models::agent::{Agent, AgentNumber, AgentNumberError, AgentRole};
use crate::models::plan::{AddOn, CoverageType, PlanTier};
use crate::rates::{RateEntry, RateTable};
use crate::writer::AttributionPolicy;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use thiserror::Error;

/// Internal id of the default house identity
pub const DEFAULT_HOUSE_ID: &str = "house";

/// Agent number of the default house identity
pub const DEFAULT_HOUSE_NUMBER: &str = "MPPHQ20000001";

/// Largest configurable amount (cents)
///
/// Keeps every plan plus add-on total far below `i64::MAX`.
pub const MAX_AMOUNT: i64 = 100_000_000;

/// Errors raised while loading or validating configuration
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Unknown plan tier '{0}'")]
    UnknownTier(String),

    #[error("Unknown coverage type '{0}'")]
    UnknownCoverage(String),

    #[error("Unknown add-on '{0}'")]
    UnknownAddOn(String),

    #[error("Negative amount {amount} for {entry}")]
    NegativeAmount { entry: String, amount: i64 },

    #[error("Amount {amount} for {entry} exceeds the {max} cent limit")]
    AmountTooLarge { entry: String, amount: i64, max: i64 },

    #[error("Duplicate rate entry for {0}")]
    DuplicateEntry(String),

    #[error("Invalid house agent number: {0}")]
    HouseNumber(#[from] AgentNumberError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

// ============================================================================
// Configuration Types
// ============================================================================

/// Complete ledger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Commission schedule
    #[serde(default)]
    pub rates: RateTableConfig,

    /// Identity used when no agent can be attributed
    #[serde(default)]
    pub house: HouseConfig,

    /// Unresolved-agent handling
    #[serde(default)]
    pub attribution: AttributionPolicy,
}

/// Rate schedule as configured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTableConfig {
    pub entries: Vec<RateConfigEntry>,
    #[serde(default)]
    pub add_ons: Vec<AddOnRateConfig>,
}

/// One (tier, coverage) price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateConfigEntry {
    pub tier: String,
    pub coverage: String,

    /// Commission (cents)
    pub commission: i64,

    /// Monthly premium (cents), when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub premium: Option<i64>,
}

/// One add-on price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOnRateConfig {
    pub add_on: String,
    pub commission: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub premium: Option<i64>,
}

/// House identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseConfig {
    pub internal_id: String,
    pub agent_number: String,
    pub display_name: String,
}

impl Default for HouseConfig {
    fn default() -> Self {
        Self {
            internal_id: DEFAULT_HOUSE_ID.to_string(),
            agent_number: DEFAULT_HOUSE_NUMBER.to_string(),
            display_name: "Home Office".to_string(),
        }
    }
}

impl Default for RateTableConfig {
    fn default() -> Self {
        Self::from_table(&RateTable::standard())
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rates: RateTableConfig::default(),
            house: HouseConfig::default(),
            attribution: AttributionPolicy::default(),
        }
    }
}

// ============================================================================
// Conversion
// ============================================================================

impl RateTableConfig {
    /// Describe an existing table
    pub fn from_table(table: &RateTable) -> Self {
        let entries = table
            .entries()
            .map(|(tier, coverage, entry)| RateConfigEntry {
                tier: tier.label().to_string(),
                coverage: coverage.label().to_string(),
                commission: entry.commission,
                premium: entry.premium,
            })
            .collect();
        let add_ons = table
            .add_on_entries()
            .map(|(add_on, entry)| AddOnRateConfig {
                add_on: add_on.label().to_string(),
                commission: entry.commission,
                premium: entry.premium,
            })
            .collect();
        Self { entries, add_ons }
    }

    /// Build the rate table, rejecting unknown names, out-of-range amounts
    /// and duplicate entries
    pub fn build(&self) -> Result<RateTable, ConfigError> {
        let mut table = RateTable::empty();
        let mut seen_pairs: BTreeSet<(PlanTier, CoverageType)> = BTreeSet::new();
        for entry in &self.entries {
            let tier = PlanTier::parse(&entry.tier)
                .ok_or_else(|| ConfigError::UnknownTier(entry.tier.clone()))?;
            let coverage = CoverageType::parse(&entry.coverage)
                .ok_or_else(|| ConfigError::UnknownCoverage(entry.coverage.clone()))?;
            let name = format!("{} / {}", tier, coverage);
            check_amounts(&name, entry.commission, entry.premium)?;
            if !seen_pairs.insert((tier, coverage)) {
                return Err(ConfigError::DuplicateEntry(name));
            }
            table.set_rate(tier, coverage, to_rate_entry(entry.commission, entry.premium));
        }

        let mut seen_add_ons: BTreeSet<AddOn> = BTreeSet::new();
        for entry in &self.add_ons {
            let add_on = AddOn::parse(&entry.add_on)
                .ok_or_else(|| ConfigError::UnknownAddOn(entry.add_on.clone()))?;
            check_amounts(add_on.label(), entry.commission, entry.premium)?;
            if !seen_add_ons.insert(add_on) {
                return Err(ConfigError::DuplicateEntry(add_on.label().to_string()));
            }
            table.set_add_on_rate(add_on, to_rate_entry(entry.commission, entry.premium));
        }
        Ok(table)
    }
}

fn to_rate_entry(commission: i64, premium: Option<i64>) -> RateEntry {
    match premium {
        Some(p) => RateEntry::commission(commission).with_premium(p),
        None => RateEntry::commission(commission),
    }
}

fn check_amounts(entry: &str, commission: i64, premium: Option<i64>) -> Result<(), ConfigError> {
    for amount in std::iter::once(commission).chain(premium) {
        if amount < 0 {
            return Err(ConfigError::NegativeAmount {
                entry: entry.to_string(),
                amount,
            });
        }
        if amount > MAX_AMOUNT {
            return Err(ConfigError::AmountTooLarge {
                entry: entry.to_string(),
                amount,
                max: MAX_AMOUNT,
            });
        }
    }
    Ok(())
}

impl HouseConfig {
    /// Build the house agent record
    ///
    /// The number must carry the `HQ` role code.
    pub fn agent(&self) -> Result<Agent, ConfigError> {
        if self.internal_id.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "house internal_id must not be empty".to_string(),
            ));
        }
        let number = AgentNumber::parse(&self.agent_number)?;
        if number.role() != AgentRole::House {
            return Err(ConfigError::InvalidConfig(format!(
                "house agent number {} must use the HQ role code",
                number
            )));
        }
        Ok(Agent::new(
            self.internal_id.clone(),
            number,
            self.display_name.clone(),
        ))
    }
}

impl LedgerConfig {
    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: LedgerConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialization(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rates.build()?;
        self.house.agent()?;
        Ok(())
    }

    pub fn rate_table(&self) -> Result<RateTable, ConfigError> {
        self.rates.build()
    }

    pub fn house_agent(&self) -> Result<Agent, ConfigError> {
        self.house.agent()
    }

    /// SHA-256 of the canonical JSON form
    ///
    /// Rates are hashed as the table they build, in (tier, coverage) order
    /// with canonical labels, so entry order and name spelling never change
    /// the hash. serde_json objects are key-sorted.
    pub fn config_hash(&self) -> Result<String, ConfigError> {
        let canonical = LedgerConfig {
            rates: RateTableConfig::from_table(&self.rates.build()?),
            house: self.house.clone(),
            attribution: self.attribution,
        };
        let value = serde_json::to_value(&canonical)
            .map_err(|e| ConfigError::Serialization(format!("Config hashing failed: {}", e)))?;

        let mut hasher = Sha256::new();
        hasher.update(value.to_string().as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }
}
