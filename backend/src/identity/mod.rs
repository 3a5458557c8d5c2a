//! Agent identity: directory and resolver
//!
//! Attribution survives identity churn because every commission row stores
//! the durable agent number next to the mutable internal id. The directory
//! owns the mapping between the two and records merges; the resolver maps
//! whatever reference the enrollment captured onto the current record.

pub mod directory;
pub mod resolver;

pub use directory::{AgentDirectory, DirectoryError};
pub use resolver::{AgentRef, ResolveError, ResolvedAgent};
