//! Ledger Engine
//!
//! Owns every component of the commission subsystem and records an audit
//! event for each state change:
//! - Rate table (built from configuration, editable at runtime)
//! - Agent directory (identities, merges)
//! - Commission store (rows and review flags)
//! - Clock and event log
//!
//! # Architecture
//!
//! ```text
//! record_enrollment ──► CommissionWriter ──► store.insert_unique
//! reconcile         ──► reconcile()      ──► CommissionWriter (per missing member)
//! merge_agents      ──► validate ──► store.repoint_agent ──► directory.merge
//! approve / set_payment_status ──► store lifecycle update
//! query()           ──► LedgerQuery (read-only)
//! ```
//!
//! # Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use commission_ledger_core_rs::config::LedgerConfig;
//! use commission_ledger_core_rs::core::FixedClock;
//! use commission_ledger_core_rs::ledger::CommissionLedger;
//! use commission_ledger_core_rs::models::agent::{Agent, AgentRole};
//! use commission_ledger_core_rs::models::member::{EnrollmentEvent, Member};
//! use commission_ledger_core_rs::store::InMemoryCommissionStore;
//!
//! let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap());
//! let mut ledger =
//!     CommissionLedger::new(LedgerConfig::default(), InMemoryCommissionStore::new(), clock)
//!         .unwrap();
//!
//! let number = ledger.directory_mut().issue_agent_number(AgentRole::Agent, 2025).unwrap();
//! ledger
//!     .register_agent(Agent::new("usr_0191".to_string(), number, "Dana Reyes".to_string()))
//!     .unwrap();
//!
//! let member = Member::from_event(EnrollmentEvent {
//!     member_id: 500,
//!     plan_tier: "Plus".to_string(),
//!     coverage_type: "Family".to_string(),
//!     add_ons: vec!["Rx".to_string()],
//!     enrolling_agent_ref: Some("usr_0191".to_string()),
//!     enrolled_at: Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
//!     monthly_price: 0,
//! });
//!
//! let outcome = ledger.record_enrollment(&member).unwrap();
//! assert_eq!(outcome.commission().unwrap().amount(), 4250);
//! ```

use crate::config::{ConfigError, LedgerConfig};
use crate::core::clock::Clock;
use crate::identity::{AgentDirectory, DirectoryError};
use crate::models::agent::Agent;
use crate::models::commission::{Commission, PaymentStatus};
use crate::models::event::{Event, EventLog};
use crate::models::member::Member;
use crate::models::review::ReviewFlag;
use crate::query::LedgerQuery;
use crate::rates::RateTable;
use crate::reconcile::{self, ReconciliationReport, SkipReason};
use crate::store::{CommissionStore, EnrollmentSource, StoreError};
use crate::writer::{CommissionWriter, WriteError, WriteOutcome};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

// ============================================================================
// Errors
// ============================================================================

/// Errors surfaced by ledger operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Write error: {0}")]
    Write(#[from] WriteError),
}

/// Result of an agent merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub retired_id: String,

    /// Canonical survivor the retired identity now points to
    pub survivor_id: String,

    /// Commission rows moved to the survivor
    pub repointed: usize,
}

// ============================================================================
// Ledger
// ============================================================================

/// Commission ledger over a store `S` and clock `C`
pub struct CommissionLedger<S: CommissionStore, C: Clock> {
    config: LedgerConfig,
    rates: RateTable,
    directory: AgentDirectory,
    store: S,
    clock: C,
    event_log: EventLog,
}

impl<S: CommissionStore, C: Clock> CommissionLedger<S, C> {
    /// Create a ledger from configuration
    ///
    /// The directory starts with only the configured house identity.
    pub fn new(config: LedgerConfig, store: S, clock: C) -> Result<Self, LedgerError> {
        config.validate()?;
        let rates = config.rate_table()?;
        let directory = AgentDirectory::new(config.house_agent()?);
        Ok(Self::from_parts(config, rates, directory, store, clock))
    }

    /// Assemble a ledger from already-validated parts
    pub(crate) fn from_parts(
        config: LedgerConfig,
        rates: RateTable,
        directory: AgentDirectory,
        store: S,
        clock: C,
    ) -> Self {
        Self {
            config,
            rates,
            directory,
            store,
            clock,
            event_log: EventLog::new(),
        }
    }

    /// Replace the event log with one carried over from a snapshot
    pub(crate) fn with_event_log(mut self, event_log: EventLog) -> Self {
        self.event_log = event_log;
        self
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn rate_table(&self) -> &RateTable {
        &self.rates
    }

    /// Edit rates; only commissions written afterwards see the change
    pub fn rate_table_mut(&mut self) -> &mut RateTable {
        &mut self.rates
    }

    pub fn directory(&self) -> &AgentDirectory {
        &self.directory
    }

    pub fn directory_mut(&mut self) -> &mut AgentDirectory {
        &mut self.directory
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    pub fn register_agent(&mut self, agent: Agent) -> Result<(), LedgerError> {
        let internal_id = agent.internal_id().to_string();
        let agent_number = agent.agent_number().clone();
        self.directory.register(agent)?;
        info!(internal_id = %internal_id, agent_number = %agent_number, "agent registered");
        Ok(())
    }

    /// Writer over the current rates and directory
    ///
    /// The writer borrows the ledger immutably and may be shared across
    /// threads.
    pub fn writer(&self) -> CommissionWriter<'_, S, C> {
        CommissionWriter::new(
            &self.rates,
            &self.directory,
            &self.store,
            &self.clock,
            self.config.attribution,
        )
    }

    /// Write the commission for a new (or retried) enrollment
    pub fn record_enrollment(&mut self, member: &Member) -> Result<WriteOutcome, LedgerError> {
        let outcome = self.writer().write(member)?;
        let at = self.clock.now();
        let event = match &outcome {
            WriteOutcome::Recorded(commission) => Event::CommissionRecorded {
                at,
                commission_id: commission.id().to_string(),
                member_id: commission.member_id(),
                agent_number: commission.agent_number().to_string(),
                amount: commission.amount(),
                house: commission.is_house(),
            },
            WriteOutcome::AlreadyRecorded(existing) => Event::DuplicateSuppressed {
                at,
                member_id: existing.member_id(),
                commission_id: existing.id().to_string(),
            },
            WriteOutcome::NeedsReview { member_id, reason } => Event::FlaggedForReview {
                at,
                member_id: *member_id,
                reason: reason.clone(),
            },
        };
        self.event_log.log(event);
        Ok(outcome)
    }

    /// Backfill commissions for members that have none
    pub fn reconcile<E>(&mut self, source: &E) -> Result<ReconciliationReport, LedgerError>
    where
        E: EnrollmentSource + ?Sized,
    {
        let report = reconcile::reconcile(&self.writer(), &self.store, &self.clock, source)?;

        for backfilled in &report.backfilled {
            self.event_log.log(Event::CommissionRecorded {
                at: report.finished_at,
                commission_id: backfilled.commission_id.clone(),
                member_id: backfilled.member_id,
                agent_number: backfilled.agent_number.clone(),
                amount: backfilled.amount,
                house: backfilled.house,
            });
        }
        let flagged: Vec<ReviewFlag> = self
            .store
            .review_flags()?
            .into_iter()
            .filter(|f| {
                report.skipped.iter().any(|s| {
                    s.member_id == f.member_id
                    && matches!(s.reason, SkipReason::MissingRate | SkipReason::NoAgent)
                })
            })
            .collect();
        for flag in flagged {
            self.event_log.log(Event::FlaggedForReview {
                at: flag.flagged_at,
                member_id: flag.member_id,
                reason: flag.reason,
            });
        }
        self.event_log.log(Event::ReconciliationCompleted {
            at: report.finished_at,
            run_id: report.run_id.clone(),
            scanned: report.scanned,
            created: report.created,
            skipped: report.total_skipped(),
        });
        Ok(report)
    }

    /// Merge a duplicate agent account into a survivor
    ///
    /// Rows are repointed before the identity is retired; if repointing
    /// fails the directory is left untouched. Agent numbers on existing rows
    /// never change.
    pub fn merge_agents(
        &mut self,
        retired_id: &str,
        survivor_id: &str,
    ) -> Result<MergeOutcome, LedgerError> {
        let survivor = self.directory.validate_merge(retired_id, survivor_id)?;
        let repointed = self.store.repoint_agent(retired_id, &survivor)?;
        self.directory.merge(retired_id, &survivor)?;

        info!(
            retired_id,
            survivor_id = %survivor,
            repointed,
            "agents merged"
        );
        self.event_log.log(Event::AgentsMerged {
            at: self.clock.now(),
            retired_id: retired_id.to_string(),
            survivor_id: survivor.clone(),
            repointed,
        });
        Ok(MergeOutcome {
            retired_id: retired_id.to_string(),
            survivor_id: survivor,
            repointed,
        })
    }

    /// Approve a pending commission for payout
    pub fn approve(&mut self, commission_id: &str) -> Result<Commission, LedgerError> {
        let commission = self.store.approve(commission_id)?;
        info!(commission_id, member_id = commission.member_id(), "commission approved");
        self.event_log.log(Event::CommissionApproved {
            at: self.clock.now(),
            commission_id: commission_id.to_string(),
            member_id: commission.member_id(),
        });
        Ok(commission)
    }

    /// Advance a commission's payment status
    pub fn set_payment_status(
        &mut self,
        commission_id: &str,
        status: PaymentStatus,
    ) -> Result<Commission, LedgerError> {
        let before = self
            .store
            .get(commission_id)?
            .ok_or_else(|| StoreError::CommissionNotFound(commission_id.to_string()))?;
        let at = self.clock.now();
        let commission = self.store.set_payment_status(commission_id, status, at)?;

        info!(
            commission_id,
            from = %before.payment_status(),
            to = %status,
            "payment status changed"
        );
        self.event_log.log(Event::PaymentStatusChanged {
            at,
            commission_id: commission_id.to_string(),
            member_id: commission.member_id(),
            from: before.payment_status(),
            to: status,
        });
        Ok(commission)
    }

    pub fn query(&self) -> LedgerQuery<'_, S> {
        LedgerQuery::new(&self.store)
    }

    pub fn review_flags(&self) -> Result<Vec<ReviewFlag>, LedgerError> {
        Ok(self.store.review_flags()?)
    }
}
