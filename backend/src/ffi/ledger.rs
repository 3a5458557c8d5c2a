//! PyO3 wrapper for CommissionLedger
//!
//! Lets the enrollment application call the commission writer in-process.

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use super::types::{commission_to_py, parse_enrollment_event, report_to_py, write_outcome_to_py};
use crate::config::LedgerConfig;
use crate::core::clock::SystemClock;
use crate::ledger::{CommissionLedger, LedgerSnapshot};
use crate::models::agent::{Agent, AgentNumber, AgentRole};
use crate::models::commission::PaymentStatus;
use crate::models::member::Member;
use crate::query::CommissionFilter;
use crate::store::InMemoryCommissionStore;

type RustLedger = CommissionLedger<InMemoryCommissionStore, SystemClock>;

fn runtime_err(context: &str, err: impl std::fmt::Display) -> PyErr {
    PyErr::new::<PyRuntimeError, _>(format!("{}: {}", context, err))
}

fn value_err(context: &str, err: impl std::fmt::Display) -> PyErr {
    PyErr::new::<PyValueError, _>(format!("{}: {}", context, err))
}

fn parse_config(config_json: Option<&str>) -> PyResult<LedgerConfig> {
    match config_json {
        Some(json) => LedgerConfig::from_json(json).map_err(|e| value_err("Invalid config", e)),
        None => Ok(LedgerConfig::default()),
    }
}

/// Python wrapper for the Rust commission ledger
///
/// # Example (from Python)
///
/// ```python
/// from commission_ledger_core_rs import CommissionLedger
///
/// ledger = CommissionLedger()
/// number = ledger.issue_agent_number("AG", 2025)
/// ledger.register_agent("usr_0191", number, "Dana Reyes", "dana@example.com")
///
/// result = ledger.record_enrollment({
///     "memberId": 500,
///     "planTier": "Plus",
///     "coverageType": "Family",
///     "addOns": ["Rx"],
///     "enrollingAgentRef": "dana@example.com",
///     "enrolledAt": "2025-03-01T09:00:00Z",
/// })
/// assert result["commission"]["amount"] == 4250
/// ```
#[pyclass(name = "CommissionLedger")]
pub struct PyCommissionLedger {
    inner: RustLedger,
}

#[pymethods]
impl PyCommissionLedger {
    /// Create a ledger from an optional JSON config (default schedule otherwise)
    #[new]
    #[pyo3(signature = (config_json=None))]
    fn new(config_json: Option<&str>) -> PyResult<Self> {
        let config = parse_config(config_json)?;
        let inner = CommissionLedger::new(config, InMemoryCommissionStore::new(), SystemClock)
            .map_err(|e| runtime_err("Failed to create ledger", e))?;
        Ok(Self { inner })
    }

    /// Restore a ledger from a JSON snapshot
    #[staticmethod]
    #[pyo3(signature = (snapshot_json, config_json=None))]
    fn from_snapshot(snapshot_json: &str, config_json: Option<&str>) -> PyResult<Self> {
        let config = parse_config(config_json)?;
        let snapshot =
            LedgerSnapshot::from_json(snapshot_json).map_err(|e| value_err("Invalid snapshot", e))?;
        let inner = CommissionLedger::from_snapshot(config, snapshot, SystemClock)
            .map_err(|e| runtime_err("Failed to restore ledger", e))?;
        Ok(Self { inner })
    }

    fn snapshot_json(&self) -> PyResult<String> {
        self.inner
            .snapshot()
            .and_then(|s| s.to_json())
            .map_err(|e| runtime_err("Snapshot failed", e))
    }

    // ========================================================================
    // Agents
    // ========================================================================

    /// Issue the next agent number for a role code ("AG", "MA", "HQ")
    fn issue_agent_number(&mut self, role: &str, year: u16) -> PyResult<String> {
        let role = AgentRole::from_code(role)
            .ok_or_else(|| value_err("Unknown role code", role))?;
        self.inner
            .directory_mut()
            .issue_agent_number(role, year)
            .map(|n| n.to_string())
            .map_err(|e| runtime_err("Could not issue agent number", e))
    }

    #[pyo3(signature = (internal_id, agent_number, display_name, email=None))]
    fn register_agent(
        &mut self,
        internal_id: String,
        agent_number: &str,
        display_name: String,
        email: Option<&str>,
    ) -> PyResult<()> {
        let number =
            AgentNumber::parse(agent_number).map_err(|e| value_err("Invalid agent number", e))?;
        let mut agent = Agent::new(internal_id, number, display_name);
        if let Some(email) = email {
            agent = agent.with_email(email);
        }
        self.inner
            .register_agent(agent)
            .map_err(|e| runtime_err("Could not register agent", e))
    }

    /// Merge a duplicate account; returns the number of rows repointed
    fn merge_agents(&mut self, retired_id: &str, survivor_id: &str) -> PyResult<usize> {
        self.inner
            .merge_agents(retired_id, survivor_id)
            .map(|m| m.repointed)
            .map_err(|e| runtime_err("Merge failed", e))
    }

    // ========================================================================
    // Writes
    // ========================================================================

    fn calculate_commission(
        &self,
        tier: &str,
        coverage: &str,
        add_ons: Vec<String>,
    ) -> PyResult<i64> {
        self.inner
            .rate_table()
            .calculate_commission(tier, coverage, &add_ons)
            .map(|q| q.amount)
            .map_err(|e| value_err("Rate lookup failed", e))
    }

    fn record_enrollment(&mut self, py: Python, event: &Bound<'_, PyDict>) -> PyResult<Py<PyDict>> {
        let member = Member::from_event(parse_enrollment_event(event)?);
        let outcome = self
            .inner
            .record_enrollment(&member)
            .map_err(|e| runtime_err("Commission write failed", e))?;
        write_outcome_to_py(py, &outcome)
    }

    /// Reconcile a list of enrollment dicts against the ledger
    fn reconcile(&mut self, py: Python, members: &Bound<'_, PyList>) -> PyResult<Py<PyDict>> {
        let mut source = Vec::with_capacity(members.len());
        for item in members.iter() {
            let dict = item.downcast::<PyDict>()?;
            source.push(Member::from_event(parse_enrollment_event(dict)?));
        }
        let report = self
            .inner
            .reconcile(&source)
            .map_err(|e| runtime_err("Reconciliation failed", e))?;
        report_to_py(py, &report)
    }

    fn approve(&mut self, py: Python, commission_id: &str) -> PyResult<Py<PyDict>> {
        let commission = self
            .inner
            .approve(commission_id)
            .map_err(|e| runtime_err("Approve failed", e))?;
        commission_to_py(py, &commission)
    }

    /// Move payment status ("pending" or "paid")
    fn set_payment_status(
        &mut self,
        py: Python,
        commission_id: &str,
        status: &str,
    ) -> PyResult<Py<PyDict>> {
        let status = PaymentStatus::parse(status)
            .ok_or_else(|| value_err("Unknown payment status", status))?;
        let commission = self
            .inner
            .set_payment_status(commission_id, status)
            .map_err(|e| runtime_err("Payment status change failed", e))?;
        commission_to_py(py, &commission)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Lifetime total (cents) for an agent number
    fn agent_total(&self, agent_number: &str) -> PyResult<i64> {
        let number =
            AgentNumber::parse(agent_number).map_err(|e| value_err("Invalid agent number", e))?;
        self.inner
            .query()
            .lifetime(&number)
            .map_err(|e| runtime_err("Query failed", e))
    }

    /// Export rows, optionally for one agent number
    #[pyo3(signature = (agent_number=None))]
    fn export_rows(&self, py: Python, agent_number: Option<&str>) -> PyResult<Py<PyList>> {
        let mut filter = CommissionFilter::new();
        if let Some(number) = agent_number {
            filter = filter
                .agent_number(number)
                .map_err(|e| value_err("Invalid agent number", e))?;
        }
        let rows = self
            .inner
            .query()
            .list(&filter)
            .map_err(|e| runtime_err("Query failed", e))?;

        let list = PyList::empty_bound(py);
        for row in &rows {
            list.append(commission_to_py(py, row)?)?;
        }
        Ok(list.into())
    }

    fn review_flag_count(&self) -> PyResult<usize> {
        self.inner
            .review_flags()
            .map(|f| f.len())
            .map_err(|e| runtime_err("Query failed", e))
    }

    fn event_count(&self) -> usize {
        self.inner.event_log().len()
    }
}
