//! Ledger audit events
//!
//! Every state change made through the ledger engine is appended here. The
//! log backs the admin audit view: flagged members, merges, payout changes
//! and reconciliation summaries.
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use commission_ledger_core_rs::models::event::{Event, EventLog};
//!
//! let mut log = EventLog::new();
//! log.log(Event::DuplicateSuppressed {
//!     at: Utc::now(),
//!     member_id: 500,
//!     commission_id: "c-1".to_string(),
//! });
//!
//! assert_eq!(log.events_for_member(500).len(), 1);
//! ```

use crate::models::commission::PaymentStatus;
use crate::models::member::MemberId;
use crate::models::review::ReviewReason;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ledger event capturing a state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// New commission row written
    CommissionRecorded {
        at: DateTime<Utc>,
        commission_id: String,
        member_id: MemberId,
        agent_number: String,
        amount: i64,
        house: bool,
    },

    /// Write for a member that already had a commission (retry or race)
    DuplicateSuppressed {
        at: DateTime<Utc>,
        member_id: MemberId,
        commission_id: String,
    },

    /// Member needs manual commission assignment
    FlaggedForReview {
        at: DateTime<Utc>,
        member_id: MemberId,
        reason: ReviewReason,
    },

    /// Duplicate agent account merged into a survivor
    AgentsMerged {
        at: DateTime<Utc>,
        retired_id: String,
        survivor_id: String,
        repointed: usize,
    },

    CommissionApproved {
        at: DateTime<Utc>,
        commission_id: String,
        member_id: MemberId,
    },

    PaymentStatusChanged {
        at: DateTime<Utc>,
        commission_id: String,
        member_id: MemberId,
        from: PaymentStatus,
        to: PaymentStatus,
    },

    ReconciliationCompleted {
        at: DateTime<Utc>,
        run_id: String,
        scanned: usize,
        created: usize,
        skipped: usize,
    },
}

impl Event {
    /// When the event occurred
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::CommissionRecorded { at, .. } => *at,
            Event::DuplicateSuppressed { at, .. } => *at,
            Event::FlaggedForReview { at, .. } => *at,
            Event::AgentsMerged { at, .. } => *at,
            Event::CommissionApproved { at, .. } => *at,
            Event::PaymentStatusChanged { at, .. } => *at,
            Event::ReconciliationCompleted { at, .. } => *at,
        }
    }

    /// Short name of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::CommissionRecorded { .. } => "CommissionRecorded",
            Event::DuplicateSuppressed { .. } => "DuplicateSuppressed",
            Event::FlaggedForReview { .. } => "FlaggedForReview",
            Event::AgentsMerged { .. } => "AgentsMerged",
            Event::CommissionApproved { .. } => "CommissionApproved",
            Event::PaymentStatusChanged { .. } => "PaymentStatusChanged",
            Event::ReconciliationCompleted { .. } => "ReconciliationCompleted",
        }
    }

    /// Member id if the event relates to a specific enrollment
    pub fn member_id(&self) -> Option<MemberId> {
        match self {
            Event::CommissionRecorded { member_id, .. } => Some(*member_id),
            Event::DuplicateSuppressed { member_id, .. } => Some(*member_id),
            Event::FlaggedForReview { member_id, .. } => Some(*member_id),
            Event::CommissionApproved { member_id, .. } => Some(*member_id),
            Event::PaymentStatusChanged { member_id, .. } => Some(*member_id),
            _ => None,
        }
    }

    /// Whether the event touches the given agent (number or internal id)
    pub fn involves_agent(&self, agent: &str) -> bool {
        match self {
            Event::CommissionRecorded { agent_number, .. } => agent_number == agent,
            Event::AgentsMerged {
                retired_id,
                survivor_id,
                ..
            } => retired_id == agent || survivor_id == agent,
            _ => false,
        }
    }
}

/// Append-only event log
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Resume a log persisted with a snapshot
    pub fn from_events(events: Vec<Event>) -> Self {
        Self { events }
    }

    pub fn log(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    pub fn events_for_member(&self, member_id: MemberId) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.member_id() == Some(member_id))
            .collect()
    }

    pub fn events_for_agent(&self, agent: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.involves_agent(agent))
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
