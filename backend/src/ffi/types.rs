//! Type conversions between Python and Rust
//!
//! Timestamps cross the boundary as RFC 3339 strings and money as integer
//! cents.

use chrono::{DateTime, Utc};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::models::commission::Commission;
use crate::models::member::EnrollmentEvent;
use crate::reconcile::ReconciliationReport;
use crate::writer::WriteOutcome;

// ========================================================================
// PyDict Extraction Helpers
// ========================================================================

/// Extract a required field from a Python dict with a clear error message
fn extract_required<T>(dict: &Bound<'_, PyDict>, key: &str) -> PyResult<T>
where
    T: for<'py> FromPyObject<'py>,
{
    dict.get_item(key)?
        .ok_or_else(|| {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(format!(
                "Missing required field '{}'",
                key
            ))
        })?
        .extract()
}

/// Extract an optional field; `None` values count as missing
fn extract_optional<T>(dict: &Bound<'_, PyDict>, key: &str) -> PyResult<Option<T>>
where
    T: for<'py> FromPyObject<'py>,
{
    match dict.get_item(key)? {
        Some(value) if !value.is_none() => Ok(Some(value.extract()?)),
        _ => Ok(None),
    }
}

fn extract_with_default<T>(dict: &Bound<'_, PyDict>, key: &str, default: T) -> PyResult<T>
where
    T: for<'py> FromPyObject<'py>,
{
    Ok(extract_optional(dict, key)?.unwrap_or(default))
}

/// Look a field up by its camelCase key, then its snake_case key
fn get_either<'py>(
    dict: &Bound<'py, PyDict>,
    snake: &str,
    camel: &str,
) -> PyResult<Option<Bound<'py, PyAny>>> {
    match dict.get_item(camel)? {
        Some(value) => Ok(Some(value)),
        None => dict.get_item(snake),
    }
}

pub fn parse_timestamp(raw: &str) -> PyResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(format!(
                "Invalid timestamp '{}': {}",
                raw, e
            ))
        })
}

// ========================================================================
// Python -> Rust
// ========================================================================

/// Convert an enrollment dict (camelCase or snake_case keys) to an event
pub fn parse_enrollment_event(py_event: &Bound<'_, PyDict>) -> PyResult<EnrollmentEvent> {
    let member_id: u64 = get_either(py_event, "member_id", "memberId")?
        .ok_or_else(|| {
            PyErr::new::<pyo3::exceptions::PyValueError, _>("Missing required field 'memberId'")
        })?
        .extract()?;

    let normalized = PyDict::new_bound(py_event.py());
    for (snake, camel) in [
        ("plan_tier", "planTier"),
        ("coverage_type", "coverageType"),
        ("add_ons", "addOns"),
        ("enrolling_agent_ref", "enrollingAgentRef"),
        ("enrolled_at", "enrolledAt"),
        ("monthly_price", "monthlyPrice"),
    ] {
        if let Some(value) = get_either(py_event, snake, camel)? {
            normalized.set_item(snake, value)?;
        }
    }

    let enrolled_at: String = extract_required(&normalized, "enrolled_at")?;
    Ok(EnrollmentEvent {
        member_id,
        plan_tier: extract_required(&normalized, "plan_tier")?,
        coverage_type: extract_required(&normalized, "coverage_type")?,
        add_ons: extract_with_default(&normalized, "add_ons", Vec::new())?,
        enrolling_agent_ref: extract_optional(&normalized, "enrolling_agent_ref")?,
        enrolled_at: parse_timestamp(&enrolled_at)?,
        monthly_price: extract_with_default(&normalized, "monthly_price", 0i64)?,
    })
}

// ========================================================================
// Rust -> Python
// ========================================================================

/// Convert a commission to a dict in export shape
pub fn commission_to_py(py: Python, commission: &Commission) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new_bound(py);
    dict.set_item("id", commission.id())?;
    dict.set_item("agentNumber", commission.agent_number().as_str())?;
    dict.set_item("agentInternalId", commission.agent_internal_id())?;
    dict.set_item("memberId", commission.member_id())?;
    dict.set_item("planTierAtEnrollment", commission.plan().tier.label())?;
    dict.set_item("coverageTypeAtEnrollment", commission.plan().coverage.label())?;
    dict.set_item("amount", commission.amount())?;
    dict.set_item("status", commission.status().to_string())?;
    dict.set_item("paymentStatus", commission.payment_status().to_string())?;
    dict.set_item("createdAt", commission.created_at().to_rfc3339())?;
    dict.set_item("paidAt", commission.paid_at().map(|t| t.to_rfc3339()))?;
    Ok(dict.into())
}

/// Convert a write outcome to `{"outcome": ..., "commission": ...}`
pub fn write_outcome_to_py(py: Python, outcome: &WriteOutcome) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new_bound(py);
    match outcome {
        WriteOutcome::Recorded(c) => {
            dict.set_item("outcome", "recorded")?;
            dict.set_item("commission", commission_to_py(py, c)?)?;
        }
        WriteOutcome::AlreadyRecorded(c) => {
            dict.set_item("outcome", "already_recorded")?;
            dict.set_item("commission", commission_to_py(py, c)?)?;
        }
        WriteOutcome::NeedsReview { member_id, reason } => {
            dict.set_item("outcome", "needs_review")?;
            dict.set_item("member_id", *member_id)?;
            dict.set_item("reason", reason.to_string())?;
        }
    }
    Ok(dict.into())
}

pub fn report_to_py(py: Python, report: &ReconciliationReport) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new_bound(py);
    dict.set_item("run_id", &report.run_id)?;
    dict.set_item("started_at", report.started_at.to_rfc3339())?;
    dict.set_item("finished_at", report.finished_at.to_rfc3339())?;
    dict.set_item("scanned", report.scanned)?;
    dict.set_item("already_recorded", report.already_recorded)?;
    dict.set_item("created", report.created)?;
    dict.set_item("attributed_to_house", report.attributed_to_house)?;

    let skipped: Vec<(u64, String, String)> = report
        .skipped
        .iter()
        .map(|s| (s.member_id, s.reason.to_string(), s.detail.clone()))
        .collect();
    dict.set_item("skipped", skipped)?;
    Ok(dict.into())
}
