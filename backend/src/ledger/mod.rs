//! Ledger - the commission subsystem behind one owner
//!
//! See `engine.rs` for the operations and `snapshot.rs` for persistence.

pub mod engine;
pub mod snapshot;

pub use engine::{CommissionLedger, LedgerError, MergeOutcome};
pub use snapshot::{
    validate_snapshot, AgentSnapshot, CommissionSnapshot, LedgerSnapshot, SequenceSnapshot,
    SnapshotError,
};
