//! Python bindings (feature `pyo3`)

pub mod ledger;
pub mod types;
