//! Commission Ledger Core - Rust Engine
//!
//! Commission calculation and attribution for health-plan enrollments.
//!
//! # Architecture
//!
//! - **core**: Clock abstraction
//! - **models**: Domain types (Agent, Member, Commission, Event)
//! - **rates**: Rate table (plan tier, coverage, add-ons -> cents)
//! - **identity**: Agent directory and reference resolution
//! - **store**: Commission storage with the member uniqueness constraint
//! - **writer**: Exactly-once commission write path
//! - **reconcile**: Backfill of enrollments without a commission
//! - **query**: Read-side totals and export
//! - **ledger**: Engine owning all of the above, plus snapshots
//! - **config**: JSON configuration and config hashing
//!
//! # Critical Invariants
//!
//! 1. All money values are i64 (cents)
//! 2. At most one commission per member, enforced by the store
//! 3. A missing rate never produces a commission
//! 4. Stored amounts are never recomputed or rewritten
//! 5. FFI boundary is minimal and safe

// Module declarations
pub mod config;
pub mod core;
pub mod identity;
pub mod ledger;
pub mod models;
pub mod query;
pub mod rates;
pub mod reconcile;
pub mod store;
pub mod writer;

// Re-exports for convenience
pub use config::{ConfigError, LedgerConfig};
pub use core::clock::{Clock, FixedClock, SystemClock};
pub use identity::{AgentDirectory, DirectoryError, ResolveError, ResolvedAgent};
pub use ledger::{CommissionLedger, LedgerError, LedgerSnapshot, MergeOutcome, SnapshotError};
pub use models::{
    agent::{Agent, AgentNumber, AgentNumberError, AgentRole},
    commission::{Commission, CommissionStatus, PaymentStatus, TransitionError},
    event::{Event, EventLog},
    member::{EnrollmentEvent, Member, MemberId},
    plan::{AddOn, CoverageType, PlanSelection, PlanSnapshot, PlanTier},
    review::{ReviewFlag, ReviewReason},
};
pub use query::{CommissionFilter, CommissionRecord, LedgerQuery};
pub use rates::{calculate_commission, RateError, RateQuote, RateTable};
pub use reconcile::{reconcile, ReconciliationReport, SkipReason};
pub use store::{CommissionStore, EnrollmentSource, InMemoryCommissionStore, StoreError};
pub use writer::{AttributionPolicy, CommissionWriter, WriteError, WriteOutcome};

// FFI module (when feature enabled)
#[cfg(feature = "pyo3")]
pub mod ffi;

// PyO3 exports (when feature enabled)
#[cfg(feature = "pyo3")]
use pyo3::prelude::*;

#[cfg(feature = "pyo3")]
#[pymodule]
fn commission_ledger_core_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<ffi::ledger::PyCommissionLedger>()?;
    Ok(())
}
