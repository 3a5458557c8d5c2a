//! Snapshot - Save/Load Ledger State
//!
//! Serialises the agent directory, commission rows, review flags, the
//! live rate table and the audit log to JSON so a ledger can be persisted
//! between CLI runs.
//!
//! # Critical Invariants
//!
//! - **Config Matching**: a snapshot only loads with the config it was taken
//!   under (SHA-256 of the canonical config JSON)
//! - **One Row Per Member**: no member id appears twice
//! - **Referential Integrity**: every row's agent internal id is a directory
//!   record, and every `merged_into` names one
//! - **Amounts Preserved**: rows are restored verbatim, never re-rated

use crate::config::{ConfigError, LedgerConfig, RateTableConfig};
use crate::core::clock::Clock;
use crate::identity::{AgentDirectory, DirectoryError};
use crate::ledger::engine::CommissionLedger;
use crate::models::agent::{Agent, AgentNumber, AgentRole};
use crate::models::commission::{Commission, CommissionStatus, PaymentStatus};
use crate::models::event::{Event, EventLog};
use crate::models::member::MemberId;
use crate::models::plan::PlanSnapshot;
use crate::models::review::ReviewFlag;
use crate::store::{CommissionStore, InMemoryCommissionStore, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors raised when taking or restoring a snapshot
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("Config mismatch: snapshot taken under {expected}, loading with {actual}")]
    ConfigMismatch { expected: String, actual: String },

    #[error("Snapshot validation failed: {0}")]
    StateValidation(String),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

// ============================================================================
// Snapshot Structures
// ============================================================================

/// Complete ledger state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub taken_at: DateTime<Utc>,

    /// Internal id of the house identity
    pub house_id: String,

    pub agents: Vec<AgentSnapshot>,

    /// Highest issued suffix per (role, year), so numbers are never reissued
    #[serde(default)]
    pub agent_sequences: Vec<SequenceSnapshot>,

    /// Rate table as edited at snapshot time
    pub rates: RateTableConfig,

    pub commissions: Vec<CommissionSnapshot>,

    #[serde(default)]
    pub review_flags: Vec<ReviewFlag>,

    /// Audit log, oldest first
    #[serde(default)]
    pub events: Vec<Event>,

    /// SHA-256 of the config the ledger was created with
    pub config_hash: String,
}

/// Agent state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub internal_id: String,
    pub agent_number: AgentNumber,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub active: bool,
    #[serde(default)]
    pub merged_into: Option<String>,
}

impl From<&Agent> for AgentSnapshot {
    fn from(agent: &Agent) -> Self {
        AgentSnapshot {
            internal_id: agent.internal_id().to_string(),
            agent_number: agent.agent_number().clone(),
            display_name: agent.display_name().to_string(),
            email: agent.email().map(str::to_string),
            active: agent.is_active(),
            merged_into: agent.merged_into().map(str::to_string),
        }
    }
}

impl From<AgentSnapshot> for Agent {
    fn from(snapshot: AgentSnapshot) -> Self {
        Agent::from_snapshot(
            snapshot.internal_id,
            snapshot.agent_number,
            snapshot.display_name,
            snapshot.email,
            snapshot.active,
            snapshot.merged_into,
        )
    }
}

/// Issue sequence position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceSnapshot {
    pub role: AgentRole,
    pub year: u16,
    pub last_suffix: u32,
}

/// Commission row state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSnapshot {
    pub id: String,
    pub member_id: MemberId,
    pub agent_internal_id: String,
    pub agent_number: AgentNumber,
    #[serde(default)]
    pub house: bool,
    pub amount: i64,
    pub plan: PlanSnapshot,
    pub status: CommissionStatus,
    pub payment_status: PaymentStatus,
    pub enrolled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<&Commission> for CommissionSnapshot {
    fn from(c: &Commission) -> Self {
        CommissionSnapshot {
            id: c.id().to_string(),
            member_id: c.member_id(),
            agent_internal_id: c.agent_internal_id().to_string(),
            agent_number: c.agent_number().clone(),
            house: c.is_house(),
            amount: c.amount(),
            plan: c.plan().clone(),
            status: c.status(),
            payment_status: c.payment_status(),
            enrolled_at: c.enrolled_at(),
            created_at: c.created_at(),
            paid_at: c.paid_at(),
        }
    }
}

impl From<CommissionSnapshot> for Commission {
    fn from(snapshot: CommissionSnapshot) -> Self {
        Commission::from_snapshot(
            snapshot.id,
            snapshot.member_id,
            snapshot.agent_internal_id,
            snapshot.agent_number,
            snapshot.house,
            snapshot.amount,
            snapshot.plan,
            snapshot.status,
            snapshot.payment_status,
            snapshot.enrolled_at,
            snapshot.created_at,
            snapshot.paid_at,
        )
    }
}

impl LedgerSnapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(self).map_err(|e| SnapshotError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(json).map_err(|e| SnapshotError::Serialization(e.to_string()))
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Validate snapshot integrity
///
/// Checks:
/// - House identity present
/// - Commission ids and member ids unique
/// - Row agents and merge targets present in the directory
/// - Merge chains end at an active record
/// - House-attributed rows carry the house agent number
/// - `paid_at` set exactly when payment status is `Paid`
pub fn validate_snapshot(snapshot: &LedgerSnapshot) -> Result<(), SnapshotError> {
    let agent_ids: HashSet<&str> = snapshot
        .agents
        .iter()
        .map(|a| a.internal_id.as_str())
        .collect();

    // 1. House identity
    if !agent_ids.contains(snapshot.house_id.as_str()) {
        return Err(SnapshotError::StateValidation(format!(
            "House identity {} missing from agents",
            snapshot.house_id
        )));
    }

    // 2. Merge targets
    for agent in &snapshot.agents {
        if let Some(target) = &agent.merged_into {
            if !agent_ids.contains(target.as_str()) {
                return Err(SnapshotError::StateValidation(format!(
                    "Agent {} merged into unknown agent {}",
                    agent.internal_id, target
                )));
            }
        }
    }

    // 3. Merge chains terminate
    let merged_into: HashMap<&str, &str> = snapshot
        .agents
        .iter()
        .filter_map(|a| a.merged_into.as_deref().map(|t| (a.internal_id.as_str(), t)))
        .collect();
    for start in merged_into.keys() {
        let mut seen = HashSet::new();
        let mut current = *start;
        while let Some(next) = merged_into.get(current) {
            if !seen.insert(current) {
                return Err(SnapshotError::StateValidation(format!(
                    "Agent {} is part of a merge cycle",
                    start
                )));
            }
            current = *next;
        }
    }

    // 4. Commission rows
    let house_number = snapshot
        .agents
        .iter()
        .find(|a| a.internal_id == snapshot.house_id)
        .map(|a| &a.agent_number);
    let mut commission_ids = HashSet::new();
    let mut member_ids = HashSet::new();
    for row in &snapshot.commissions {
        if !commission_ids.insert(row.id.as_str()) {
            return Err(SnapshotError::StateValidation(format!(
                "Duplicate commission id {}",
                row.id
            )));
        }
        if !member_ids.insert(row.member_id) {
            return Err(SnapshotError::StateValidation(format!(
                "Member {} has more than one commission",
                row.member_id
            )));
        }
        if !agent_ids.contains(row.agent_internal_id.as_str()) {
            return Err(SnapshotError::StateValidation(format!(
                "Commission {} references unknown agent {}",
                row.id, row.agent_internal_id
            )));
        }
        if row.house && Some(&row.agent_number) != house_number {
            return Err(SnapshotError::StateValidation(format!(
                "Commission {} is marked as house attribution but carries agent number {}",
                row.id, row.agent_number
            )));
        }
        if (row.payment_status == PaymentStatus::Paid) != row.paid_at.is_some() {
            return Err(SnapshotError::StateValidation(format!(
                "Commission {} has payment status {} but paid_at {:?}",
                row.id, row.payment_status, row.paid_at
            )));
        }
    }

    Ok(())
}

// ============================================================================
// Ledger integration
// ============================================================================

impl<S: CommissionStore, C: Clock> CommissionLedger<S, C> {
    /// Capture the complete ledger state
    pub fn snapshot(&self) -> Result<LedgerSnapshot, SnapshotError> {
        let directory = self.directory();
        Ok(LedgerSnapshot {
            taken_at: self.clock().now(),
            house_id: directory.house_id().to_string(),
            agents: directory.agents().into_iter().map(AgentSnapshot::from).collect(),
            agent_sequences: directory
                .issued_sequences()
                .into_iter()
                .map(|(role, year, last_suffix)| SequenceSnapshot {
                    role,
                    year,
                    last_suffix,
                })
                .collect(),
            rates: RateTableConfig::from_table(self.rate_table()),
            commissions: self
                .store()
                .list()?
                .iter()
                .map(CommissionSnapshot::from)
                .collect(),
            review_flags: self.store().review_flags()?,
            events: self.event_log().events().to_vec(),
            config_hash: self.config().config_hash()?,
        })
    }
}

impl<C: Clock> CommissionLedger<InMemoryCommissionStore, C> {
    /// Restore a ledger from a snapshot taken under `config`
    pub fn from_snapshot(
        config: LedgerConfig,
        snapshot: LedgerSnapshot,
        clock: C,
    ) -> Result<Self, SnapshotError> {
        config.validate()?;
        let actual = config.config_hash()?;
        if actual != snapshot.config_hash {
            return Err(SnapshotError::ConfigMismatch {
                expected: snapshot.config_hash,
                actual,
            });
        }
        validate_snapshot(&snapshot)?;

        let rates = snapshot.rates.build()?;
        let agents: Vec<Agent> = snapshot.agents.into_iter().map(Agent::from).collect();
        let mut directory = AgentDirectory::from_agents(&snapshot.house_id, agents)?;
        for seq in snapshot.agent_sequences {
            directory.reserve_sequence(seq.role, seq.year, seq.last_suffix);
        }

        let commissions: Vec<Commission> =
            snapshot.commissions.into_iter().map(Commission::from).collect();
        let store = InMemoryCommissionStore::from_parts(commissions, snapshot.review_flags)?;

        Ok(CommissionLedger::from_parts(config, rates, directory, store, clock)
            .with_event_log(EventLog::from_events(snapshot.events)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::FixedClock;
    use crate::models::member::{EnrollmentEvent, Member};
    use chrono::TimeZone;

    fn clock() -> FixedClock {
        FixedClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap())
    }

    fn populated() -> CommissionLedger<InMemoryCommissionStore, FixedClock> {
        let mut ledger =
            CommissionLedger::new(LedgerConfig::default(), InMemoryCommissionStore::new(), clock())
                .unwrap();
        let number = ledger
            .directory_mut()
            .issue_agent_number(AgentRole::Agent, 2025)
            .unwrap();
        ledger
            .register_agent(Agent::new("usr_a".to_string(), number, "Dana".to_string()))
            .unwrap();
        ledger
            .record_enrollment(&Member::from_event(EnrollmentEvent {
                member_id: 1,
                plan_tier: "Elite".to_string(),
                coverage_type: "Member + Spouse".to_string(),
                add_ons: vec![],
                enrolling_agent_ref: Some("usr_a".to_string()),
                enrolled_at: Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
                monthly_price: 0,
            }))
            .unwrap();
        ledger
    }

    #[test]
    fn test_snapshot_round_trip() {
        let ledger = populated();
        let snapshot = ledger.snapshot().unwrap();
        let json = snapshot.to_json().unwrap();

        let loaded = LedgerSnapshot::from_json(&json).unwrap();
        let restored =
            CommissionLedger::from_snapshot(LedgerConfig::default(), loaded, clock()).unwrap();
        assert_eq!(restored.snapshot().unwrap(), snapshot);
        assert_eq!(restored.store().list().unwrap()[0].amount(), 4000);
    }

    #[test]
    fn test_restored_directory_does_not_reissue_numbers() {
        let mut ledger = populated();
        // Issued but never registered
        ledger
            .directory_mut()
            .issue_agent_number(AgentRole::Agent, 2025)
            .unwrap();
        let snapshot = ledger.snapshot().unwrap();

        let mut restored =
            CommissionLedger::from_snapshot(LedgerConfig::default(), snapshot, clock()).unwrap();
        let next = restored
            .directory_mut()
            .issue_agent_number(AgentRole::Agent, 2025)
            .unwrap();
        assert_eq!(next.as_str(), "MPPAG20250003");
    }

    #[test]
    fn test_config_mismatch_rejected() {
        let snapshot = populated().snapshot().unwrap();
        let mut other = LedgerConfig::default();
        other.attribution.house_fallback = false;

        let result = CommissionLedger::from_snapshot(other, snapshot, clock());
        assert!(matches!(result, Err(SnapshotError::ConfigMismatch { .. })));
    }

    #[test]
    fn test_orphaned_row_rejected() {
        let mut snapshot = populated().snapshot().unwrap();
        snapshot.commissions[0].agent_internal_id = "ghost".to_string();
        assert!(matches!(
            validate_snapshot(&snapshot),
            Err(SnapshotError::StateValidation(_))
        ));
    }
}
