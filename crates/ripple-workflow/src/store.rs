//! In-memory change and approval stores.
//!
//! Reads clone out of short-lived `RwLock` sections; mutations to a single
//! change are serialized by a per-change async lock handed out by
//! [`ChangeStore::lock_for`]. Approval ids are monotonic 64-bit integers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};

use ripple_core::change::{
    Approval, ApprovalRole, ApprovalStatus, Change, ChangeId, ChangeStatus, ChangeType,
};
use ripple_core::types::Environment;
use ripple_impact::CancelToken;

/// Filter for listing changes.
#[derive(Debug, Default, Clone)]
pub struct ChangeFilter {
    pub status: Option<ChangeStatus>,
    pub environment: Option<Environment>,
    pub change_type: Option<ChangeType>,
    pub created_by: Option<String>,
}

pub struct ChangeStore {
    changes: RwLock<HashMap<ChangeId, Change>>,
    approvals: RwLock<Vec<Approval>>,
    next_approval_id: AtomicI64,
    locks: Mutex<HashMap<ChangeId, Arc<tokio::sync::Mutex<()>>>>,
    cancels: Mutex<HashMap<ChangeId, CancelToken>>,
}

impl ChangeStore {
    pub fn new() -> Self {
        Self {
            changes: RwLock::new(HashMap::new()),
            approvals: RwLock::new(Vec::new()),
            next_approval_id: AtomicI64::new(1),
            locks: Mutex::new(HashMap::new()),
            cancels: Mutex::new(HashMap::new()),
        }
    }

    // ── Changes ──────────────────────────────────────────────────

    pub fn insert(&self, change: Change) {
        self.changes
            .write()
            .expect("change lock poisoned")
            .insert(change.id, change);
    }

    pub fn get(&self, id: &ChangeId) -> Option<Change> {
        self.changes
            .read()
            .expect("change lock poisoned")
            .get(id)
            .cloned()
    }

    pub fn list(&self, filter: &ChangeFilter) -> Vec<Change> {
        let mut matched: Vec<Change> = self
            .changes
            .read()
            .expect("change lock poisoned")
            .values()
            .filter(|c| {
                filter.status.map_or(true, |s| c.status == s)
                    && filter.environment.map_or(true, |e| c.environment == e)
                    && filter.change_type.map_or(true, |t| c.change_type == t)
                    && filter
                        .created_by
                        .as_deref()
                        .map_or(true, |u| c.created_by == u)
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        matched
    }

    /// Apply an in-place edit and return the updated record.
    pub fn update_with(
        &self,
        id: &ChangeId,
        edit: impl FnOnce(&mut Change),
    ) -> Option<Change> {
        let mut changes = self.changes.write().expect("change lock poisoned");
        let change = changes.get_mut(id)?;
        edit(change);
        Some(change.clone())
    }

    pub fn remove(&self, id: &ChangeId) -> Option<Change> {
        self.changes
            .write()
            .expect("change lock poisoned")
            .remove(id)
    }

    /// The per-change mutation lock. Mutations to a single change are
    /// serialized by holding this across the read-check-write sequence.
    pub fn lock_for(&self, id: ChangeId) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .expect("lock table poisoned")
            .entry(id)
            .or_default()
            .clone()
    }

    // ── In-flight analysis tokens ────────────────────────────────

    /// Register the cancellation token for a change's in-flight analysis,
    /// returning the previous one if an analysis was still running.
    pub fn swap_cancel(&self, id: ChangeId, token: CancelToken) -> Option<CancelToken> {
        self.cancels
            .lock()
            .expect("cancel table poisoned")
            .insert(id, token)
    }

    pub fn take_cancel(&self, id: &ChangeId) -> Option<CancelToken> {
        self.cancels.lock().expect("cancel table poisoned").remove(id)
    }

    // ── Approvals ────────────────────────────────────────────────

    /// Materialize Pending approval rows for the given roles.
    pub fn add_approvals(
        &self,
        change_id: ChangeId,
        roles: &[ApprovalRole],
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Vec<Approval> {
        let mut approvals = self.approvals.write().expect("approval lock poisoned");
        let mut created = Vec::with_capacity(roles.len());
        for &role in roles {
            let approval = Approval {
                id: self.next_approval_id.fetch_add(1, Ordering::SeqCst),
                change_id,
                role_required: role,
                status: ApprovalStatus::Pending,
                decided_by: None,
                decided_at: None,
                comment: None,
                created_at: now,
                expires_at,
            };
            approvals.push(approval.clone());
            created.push(approval);
        }
        created
    }

    pub fn approval(&self, id: i64) -> Option<Approval> {
        self.approvals
            .read()
            .expect("approval lock poisoned")
            .iter()
            .find(|a| a.id == id)
            .cloned()
    }

    pub fn approvals_for(&self, change_id: ChangeId) -> Vec<Approval> {
        self.approvals
            .read()
            .expect("approval lock poisoned")
            .iter()
            .filter(|a| a.change_id == change_id)
            .cloned()
            .collect()
    }

    pub fn all_approvals(&self) -> Vec<Approval> {
        self.approvals.read().expect("approval lock poisoned").clone()
    }

    pub fn update_approval_with(
        &self,
        id: i64,
        edit: impl FnOnce(&mut Approval),
    ) -> Option<Approval> {
        let mut approvals = self.approvals.write().expect("approval lock poisoned");
        let approval = approvals.iter_mut().find(|a| a.id == id)?;
        edit(approval);
        Some(approval.clone())
    }

    /// Remove approval rows for a change (used when a Draft is deleted).
    pub fn remove_approvals_for(&self, change_id: ChangeId) {
        self.approvals
            .write()
            .expect("approval lock poisoned")
            .retain(|a| a.change_id != change_id);
    }
}

impl Default for ChangeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_core::change::ChangeAction;

    fn draft() -> Change {
        Change::draft(
            "t",
            ChangeType::Firewall,
            ChangeAction::AddRule,
            Environment::Prod,
            "alice",
            Utc::now(),
        )
    }

    #[test]
    fn list_filters_and_sorts_newest_first() {
        let store = ChangeStore::new();
        let mut first = draft();
        first.created_at = Utc::now() - chrono::Duration::minutes(5);
        let second = draft();
        store.insert(first.clone());
        store.insert(second.clone());

        let all = store.list(&ChangeFilter::default());
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);

        let mine = store.list(&ChangeFilter {
            created_by: Some("bob".to_string()),
            ..Default::default()
        });
        assert!(mine.is_empty());
    }

    #[test]
    fn approval_ids_are_monotonic() {
        let store = ChangeStore::new();
        let change = draft();
        let now = Utc::now();
        let created = store.add_approvals(
            change.id,
            &[ApprovalRole::Admin, ApprovalRole::SecurityLead],
            now,
            now + chrono::Duration::hours(24),
        );
        assert_eq!(created.len(), 2);
        assert!(created[0].id < created[1].id);
        assert_eq!(store.approvals_for(change.id).len(), 2);
    }

    #[test]
    fn per_change_lock_is_shared() {
        let store = ChangeStore::new();
        let change = draft();
        let a = store.lock_for(change.id);
        let b = store.lock_for(change.id);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn swap_cancel_returns_previous_token() {
        let store = ChangeStore::new();
        let change = draft();
        let first = CancelToken::new();
        assert!(store.swap_cancel(change.id, first.clone()).is_none());
        let second = CancelToken::new();
        let previous = store.swap_cancel(change.id, second).unwrap();
        previous.cancel();
        assert!(first.is_canceled());
    }
}
