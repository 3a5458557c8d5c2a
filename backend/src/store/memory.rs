//! In-memory commission store
//!
//! All tables sit behind a single mutex, so the uniqueness check and the
//! insert are one critical section.

use super::{CommissionStore, InsertOutcome, StoreError};
use crate::models::commission::{Commission, PaymentStatus};
use crate::models::member::MemberId;
use crate::models::review::ReviewFlag;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Tables {
    /// Commission id -> row
    commissions: HashMap<String, Commission>,

    /// Unique index: member id -> commission id
    by_member: HashMap<MemberId, String>,

    flags: BTreeMap<MemberId, ReviewFlag>,
}

/// Mutex-guarded in-memory store
///
/// # Example
/// ```
/// use chrono::Utc;
/// use commission_ledger_core_rs::models::agent::AgentNumber;
/// use commission_ledger_core_rs::models::commission::Commission;
/// use commission_ledger_core_rs::models::plan::{CoverageType, PlanSnapshot, PlanTier};
/// use commission_ledger_core_rs::store::{CommissionStore, InMemoryCommissionStore, InsertOutcome};
///
/// let store = InMemoryCommissionStore::new();
/// let now = Utc::now();
/// let row = |amount| Commission::new(
///     500,
///     "usr_a".to_string(),
///     AgentNumber::parse("MPPAG20250001").unwrap(),
///     amount,
///     PlanSnapshot::new(PlanTier::Base, CoverageType::MemberOnly),
///     now,
///     now,
/// );
///
/// assert!(matches!(store.insert_unique(row(900)).unwrap(), InsertOutcome::Inserted(_)));
/// assert!(matches!(store.insert_unique(row(900)).unwrap(), InsertOutcome::Duplicate(_)));
/// assert_eq!(store.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryCommissionStore {
    tables: Mutex<Tables>,
}

impl InMemoryCommissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load rows and flags, enforcing the same constraints as live inserts
    pub fn from_parts(
        commissions: Vec<Commission>,
        flags: Vec<ReviewFlag>,
    ) -> Result<Self, StoreError> {
        let mut tables = Tables::default();
        for commission in commissions {
            if tables.commissions.contains_key(commission.id()) {
                return Err(StoreError::DuplicateCommissionId(commission.id().to_string()));
            }
            if tables.by_member.contains_key(&commission.member_id()) {
                return Err(StoreError::DuplicateMember(commission.member_id()));
            }
            tables
                .by_member
                .insert(commission.member_id(), commission.id().to_string());
            tables
                .commissions
                .insert(commission.id().to_string(), commission);
        }
        for flag in flags {
            tables.flags.insert(flag.member_id, flag);
        }
        Ok(Self {
            tables: Mutex::new(tables),
        })
    }

    /// Number of stored rows
    pub fn len(&self) -> usize {
        self.lock().map(|t| t.commissions.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("commission table lock poisoned".to_string()))
    }

    fn update<F>(&self, commission_id: &str, apply: F) -> Result<Commission, StoreError>
    where
        F: FnOnce(&mut Commission) -> Result<(), StoreError>,
    {
        let mut tables = self.lock()?;
        let commission = tables
            .commissions
            .get_mut(commission_id)
            .ok_or_else(|| StoreError::CommissionNotFound(commission_id.to_string()))?;
        apply(commission)?;
        Ok(commission.clone())
    }
}

impl CommissionStore for InMemoryCommissionStore {
    fn insert_unique(&self, commission: Commission) -> Result<InsertOutcome, StoreError> {
        let mut tables = self.lock()?;

        if let Some(existing_id) = tables.by_member.get(&commission.member_id()) {
            let existing = tables
                .commissions
                .get(existing_id)
                .cloned()
                .ok_or_else(|| StoreError::CommissionNotFound(existing_id.clone()))?;
            return Ok(InsertOutcome::Duplicate(existing));
        }
        if tables.commissions.contains_key(commission.id()) {
            return Err(StoreError::DuplicateCommissionId(commission.id().to_string()));
        }

        tables
            .by_member
            .insert(commission.member_id(), commission.id().to_string());
        tables
            .commissions
            .insert(commission.id().to_string(), commission.clone());
        Ok(InsertOutcome::Inserted(commission))
    }

    fn get(&self, commission_id: &str) -> Result<Option<Commission>, StoreError> {
        Ok(self.lock()?.commissions.get(commission_id).cloned())
    }

    fn get_by_member(&self, member_id: MemberId) -> Result<Option<Commission>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .by_member
            .get(&member_id)
            .and_then(|id| tables.commissions.get(id))
            .cloned())
    }

    fn recorded_member_ids(&self) -> Result<BTreeSet<MemberId>, StoreError> {
        Ok(self.lock()?.by_member.keys().copied().collect())
    }

    fn list(&self) -> Result<Vec<Commission>, StoreError> {
        let mut rows: Vec<Commission> = self.lock()?.commissions.values().cloned().collect();
        rows.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then(a.member_id().cmp(&b.member_id()))
        });
        Ok(rows)
    }

    fn repoint_agent(&self, retired_id: &str, survivor_id: &str) -> Result<usize, StoreError> {
        let mut tables = self.lock()?;
        let mut repointed = 0;
        for commission in tables.commissions.values_mut() {
            if commission.agent_internal_id() == retired_id {
                commission.repoint(survivor_id);
                repointed += 1;
            }
        }
        Ok(repointed)
    }

    fn approve(&self, commission_id: &str) -> Result<Commission, StoreError> {
        self.update(commission_id, |c| c.approve().map_err(StoreError::from))
    }

    fn set_payment_status(
        &self,
        commission_id: &str,
        status: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<Commission, StoreError> {
        self.update(commission_id, |c| {
            c.set_payment_status(status, at).map_err(StoreError::from)
        })
    }

    fn flag_for_review(&self, flag: ReviewFlag) -> Result<(), StoreError> {
        self.lock()?.flags.insert(flag.member_id, flag);
        Ok(())
    }

    fn clear_review_flag(&self, member_id: MemberId) -> Result<bool, StoreError> {
        Ok(self.lock()?.flags.remove(&member_id).is_some())
    }

    fn review_flags(&self) -> Result<Vec<ReviewFlag>, StoreError> {
        Ok(self.lock()?.flags.values().cloned().collect())
    }
}
