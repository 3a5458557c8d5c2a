//! Ledger Query Layer
//!
//! Read-side aggregation over stored commission rows: per-agent totals,
//! period-to-date sums, payment-status filters and the flat export list.
//!
//! CRITICAL: amounts are read as stored. Nothing here consults the rate
//! table, so later rate edits never change a reported total.

use crate::models::agent::AgentNumber;
use crate::models::commission::{Commission, CommissionStatus, PaymentStatus};
use crate::models::member::MemberId;
use crate::store::{CommissionStore, StoreError};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Half-open time range `[start, end)`
///
/// A missing bound is unbounded on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| at >= s) && self.end.map_or(true, |e| at < e)
    }
}

/// Row filter; every set criterion must match
///
/// # Example
/// ```
/// use commission_ledger_core_rs::models::commission::PaymentStatus;
/// use commission_ledger_core_rs::query::CommissionFilter;
///
/// let filter = CommissionFilter::new()
///     .agent_number("MPPAG20250042")
///     .unwrap()
///     .payment_status(PaymentStatus::Unpaid);
/// assert_eq!(filter.agent_number_value().unwrap().as_str(), "MPPAG20250042");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommissionFilter {
    agent_number: Option<AgentNumber>,
    agent_internal_id: Option<String>,
    payment_status: Option<PaymentStatus>,
    status: Option<CommissionStatus>,
    created: DateRange,
    enrolled: DateRange,
}

impl CommissionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match rows by durable agent number
    pub fn agent_number(
        mut self,
        number: &str,
    ) -> Result<Self, crate::models::agent::AgentNumberError> {
        self.agent_number = Some(AgentNumber::parse(number)?);
        Ok(self)
    }

    pub fn with_agent_number(mut self, number: AgentNumber) -> Self {
        self.agent_number = Some(number);
        self
    }

    /// Match rows by current internal id (follows merges once rows are repointed)
    pub fn agent_internal_id(mut self, internal_id: impl Into<String>) -> Self {
        self.agent_internal_id = Some(internal_id.into());
        self
    }

    pub fn payment_status(mut self, status: PaymentStatus) -> Self {
        self.payment_status = Some(status);
        self
    }

    pub fn status(mut self, status: CommissionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn created_between(
        mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.created = DateRange::new(start, end);
        self
    }

    pub fn created_since(self, start: DateTime<Utc>) -> Self {
        let end = self.created.end;
        self.created_between(Some(start), end)
    }

    /// Match rows by when the member enrolled, not when the row was written
    pub fn enrolled_between(
        mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.enrolled = DateRange::new(start, end);
        self
    }

    pub fn enrolled_since(self, start: DateTime<Utc>) -> Self {
        let end = self.enrolled.end;
        self.enrolled_between(Some(start), end)
    }

    pub fn agent_number_value(&self) -> Option<&AgentNumber> {
        self.agent_number.as_ref()
    }

    pub fn created_range(&self) -> DateRange {
        self.created
    }

    pub fn matches(&self, commission: &Commission) -> bool {
        self.agent_number
            .as_ref()
            .map_or(true, |n| commission.agent_number() == n)
            && self
                .agent_internal_id
                .as_deref()
                .map_or(true, |id| commission.agent_internal_id() == id)
            && self
                .payment_status
                .map_or(true, |s| commission.payment_status() == s)
            && self.status.map_or(true, |s| commission.status() == s)
            && self.created.contains(commission.created_at())
            && self.enrolled.contains(commission.enrolled_at())
    }
}

/// Reporting periods for to-date totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    Month,
    Year,
}

impl Period {
    /// Start of the period containing `now` (UTC midnight)
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let first_day = match self {
            Period::Month => NaiveDate::from_ymd_opt(now.year(), now.month(), 1),
            Period::Year => NaiveDate::from_ymd_opt(now.year(), 1, 1),
        };
        first_day
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive))
            .unwrap_or(now)
    }
}

/// Export record, one per commission row
///
/// Serialises to the camelCase shape the dashboard and export consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionRecord {
    pub id: String,
    pub agent_number: String,
    pub member_id: MemberId,
    pub plan_tier_at_enrollment: String,
    pub coverage_type_at_enrollment: String,
    pub amount: i64,
    pub status: CommissionStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<&Commission> for CommissionRecord {
    fn from(commission: &Commission) -> Self {
        Self {
            id: commission.id().to_string(),
            agent_number: commission.agent_number().to_string(),
            member_id: commission.member_id(),
            plan_tier_at_enrollment: commission.plan().tier.label().to_string(),
            coverage_type_at_enrollment: commission.plan().coverage.label().to_string(),
            amount: commission.amount(),
            status: commission.status(),
            payment_status: commission.payment_status(),
            created_at: commission.created_at(),
            paid_at: commission.paid_at(),
        }
    }
}

/// Per-agent aggregate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentTotal {
    pub count: usize,
    pub amount: i64,
}

/// Read-only view over a commission store
pub struct LedgerQuery<'a, S: CommissionStore> {
    store: &'a S,
}

impl<'a, S: CommissionStore> LedgerQuery<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Matching rows in creation order
    pub fn list(&self, filter: &CommissionFilter) -> Result<Vec<Commission>, StoreError> {
        Ok(self
            .store
            .list()?
            .into_iter()
            .filter(|c| filter.matches(c))
            .collect())
    }

    pub fn count(&self, filter: &CommissionFilter) -> Result<usize, StoreError> {
        Ok(self.list(filter)?.len())
    }

    /// Sum of stored amounts (cents)
    pub fn total(&self, filter: &CommissionFilter) -> Result<i64, StoreError> {
        Ok(self.list(filter)?.iter().map(Commission::amount).sum())
    }

    /// Totals keyed by agent number
    pub fn totals_by_agent(
        &self,
        filter: &CommissionFilter,
    ) -> Result<BTreeMap<AgentNumber, AgentTotal>, StoreError> {
        let mut totals: BTreeMap<AgentNumber, AgentTotal> = BTreeMap::new();
        for commission in self.list(filter)? {
            let entry = totals.entry(commission.agent_number().clone()).or_default();
            entry.count += 1;
            entry.amount += commission.amount();
        }
        Ok(totals)
    }

    /// Total for an agent since the start of `period` containing `now`
    ///
    /// Rows count toward the period their member enrolled in, so a late
    /// backfill lands in the enrollment's period.
    pub fn period_to_date(
        &self,
        agent_number: &AgentNumber,
        period: Period,
        now: DateTime<Utc>,
        payment_status: Option<PaymentStatus>,
    ) -> Result<i64, StoreError> {
        let mut filter = CommissionFilter::new()
            .with_agent_number(agent_number.clone())
            .enrolled_since(period.start(now));
        if let Some(status) = payment_status {
            filter = filter.payment_status(status);
        }
        self.total(&filter)
    }

    pub fn month_to_date(
        &self,
        agent_number: &AgentNumber,
        now: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        self.period_to_date(agent_number, Period::Month, now, None)
    }

    pub fn year_to_date(
        &self,
        agent_number: &AgentNumber,
        now: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        self.period_to_date(agent_number, Period::Year, now, None)
    }

    /// All-time total for an agent
    pub fn lifetime(&self, agent_number: &AgentNumber) -> Result<i64, StoreError> {
        self.total(&CommissionFilter::new().with_agent_number(agent_number.clone()))
    }

    /// Flat export list
    pub fn export_rows(
        &self,
        filter: &CommissionFilter,
    ) -> Result<Vec<CommissionRecord>, StoreError> {
        Ok(self.list(filter)?.iter().map(CommissionRecord::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::plan::{CoverageType, PlanSnapshot, PlanTier};
    use crate::store::InMemoryCommissionStore;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
    }

    fn row(member_id: MemberId, number: &str, amount: i64, created: DateTime<Utc>) -> Commission {
        Commission::new(
            member_id,
            format!("usr_{}", number),
            AgentNumber::parse(number).unwrap(),
            amount,
            PlanSnapshot::new(PlanTier::Base, CoverageType::MemberOnly),
            created,
            created,
        )
    }

    #[test]
    fn test_date_range_is_half_open() {
        let range = DateRange::new(Some(at(2025, 1, 1)), Some(at(2025, 2, 1)));
        assert!(range.contains(at(2025, 1, 1)));
        assert!(range.contains(at(2025, 1, 31)));
        assert!(!range.contains(at(2025, 2, 1)));
        assert!(DateRange::default().contains(at(1999, 1, 1)));
    }

    #[test]
    fn test_period_start() {
        let now = Utc.with_ymd_and_hms(2025, 7, 19, 15, 30, 0).unwrap();
        assert_eq!(
            Period::Month.start(now),
            Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            Period::Year.start(now),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_period_to_date_totals() {
        let a = "MPPAG20250001";
        let store = InMemoryCommissionStore::new();
        store.insert_unique(row(1, a, 900, at(2024, 12, 20))).unwrap();
        store.insert_unique(row(2, a, 4000, at(2025, 3, 2))).unwrap();
        store.insert_unique(row(3, a, 2000, at(2025, 7, 5))).unwrap();
        store
            .insert_unique(row(4, "MPPAG20250002", 1700, at(2025, 7, 6)))
            .unwrap();

        let query = LedgerQuery::new(&store);
        let number = AgentNumber::parse(a).unwrap();
        let now = at(2025, 7, 19);
        assert_eq!(query.month_to_date(&number, now).unwrap(), 2000);
        assert_eq!(query.year_to_date(&number, now).unwrap(), 6000);
        assert_eq!(query.lifetime(&number).unwrap(), 6900);
    }

    #[test]
    fn test_export_record_shape() {
        let store = InMemoryCommissionStore::new();
        store
            .insert_unique(row(7, "MPPAG20250001", 900, at(2025, 3, 1)))
            .unwrap();

        let rows = LedgerQuery::new(&store)
            .export_rows(&CommissionFilter::new())
            .unwrap();
        let json = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(json["agentNumber"], "MPPAG20250001");
        assert_eq!(json["memberId"], 7);
        assert_eq!(json["planTierAtEnrollment"], "Base");
        assert_eq!(json["coverageTypeAtEnrollment"], "Member Only");
        assert_eq!(json["amount"], 900);
        assert!(json.get("paidAt").is_none());
    }
}
