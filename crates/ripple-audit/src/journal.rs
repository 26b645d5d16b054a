//! Journal storage — trait + in-memory implementation.
//!
//! The journal owns id assignment: ids are monotonic 64-bit integers and
//! timestamps are assigned at commit under the journal lock, which gives
//! entries for a single change a total order.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use ripple_core::change::ChangeId;
use ripple_core::types::NodeId;

use crate::{hash, AuditAction, AuditEntry};

/// Filter for listing entries.
#[derive(Debug, Default, Clone)]
pub struct AuditQuery {
    pub change_id: Option<ChangeId>,
    pub user_id: Option<String>,
    pub action: Option<AuditAction>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// Trait for journal backends. Append-only: there is no update or delete.
pub trait Journal: Send + Sync {
    /// Commit a new entry. Id, timestamp, and content hash are assigned here.
    fn append(
        &self,
        change_id: Option<ChangeId>,
        user_id: Option<String>,
        action: AuditAction,
        details: serde_json::Value,
    ) -> AuditEntry;

    /// List entries matching the query, oldest first.
    fn entries(&self, query: &AuditQuery) -> Vec<AuditEntry>;
}

struct JournalInner {
    next_id: i64,
    last_timestamp: DateTime<Utc>,
    entries: Vec<AuditEntry>,
}

/// Process-local journal. Safe for concurrent appenders.
pub struct InMemoryJournal {
    inner: Mutex<JournalInner>,
}

impl InMemoryJournal {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(JournalInner {
                next_id: 1,
                last_timestamp: DateTime::<Utc>::MIN_UTC,
                entries: Vec::new(),
            }),
        }
    }

    /// Entries for one change, oldest first.
    pub fn entries_for_change(&self, change_id: ChangeId) -> Vec<AuditEntry> {
        self.entries(&AuditQuery {
            change_id: Some(change_id),
            ..Default::default()
        })
    }

    /// Count distinct incident signals touching any of `components` within
    /// the trailing window ending at `now`.
    ///
    /// An incident signal is an `incident_reported` or `rolled_back` entry
    /// whose `details.components` lists one of the given node ids.
    pub fn incident_count(
        &self,
        components: &[NodeId],
        window: Duration,
        now: DateTime<Utc>,
    ) -> usize {
        let cutoff = now - window;
        let inner = self.inner.lock().expect("journal lock poisoned");
        inner
            .entries
            .iter()
            .filter(|e| {
                matches!(
                    e.action,
                    AuditAction::IncidentReported | AuditAction::RolledBack
                ) && e.timestamp >= cutoff
                    && entry_touches(e, components)
            })
            .count()
    }
}

impl Default for InMemoryJournal {
    fn default() -> Self {
        Self::new()
    }
}

impl Journal for InMemoryJournal {
    fn append(
        &self,
        change_id: Option<ChangeId>,
        user_id: Option<String>,
        action: AuditAction,
        details: serde_json::Value,
    ) -> AuditEntry {
        let mut inner = self.inner.lock().expect("journal lock poisoned");

        // Commit timestamps are strictly monotonic so same-change entries
        // never tie.
        let now = Utc::now();
        let timestamp = if now > inner.last_timestamp {
            now
        } else {
            inner.last_timestamp + Duration::microseconds(1)
        };
        inner.last_timestamp = timestamp;

        let mut entry = AuditEntry {
            id: inner.next_id,
            change_id,
            user_id,
            action,
            details,
            timestamp,
            content_hash: String::new(),
        };
        entry.content_hash = hash::compute_entry_hash(&entry);

        inner.next_id += 1;
        inner.entries.push(entry.clone());

        tracing::debug!(
            entry_id = entry.id,
            action = ?entry.action,
            change_id = ?entry.change_id.map(|c| c.to_string()),
            "Audit entry committed"
        );

        entry
    }

    fn entries(&self, query: &AuditQuery) -> Vec<AuditEntry> {
        let inner = self.inner.lock().expect("journal lock poisoned");
        let mut matched: Vec<AuditEntry> = inner
            .entries
            .iter()
            .filter(|e| {
                query.change_id.map_or(true, |id| e.change_id == Some(id))
                    && query
                        .user_id
                        .as_ref()
                        .map_or(true, |u| e.user_id.as_deref() == Some(u.as_str()))
                    && query.action.map_or(true, |a| e.action == a)
                    && query.since.map_or(true, |s| e.timestamp >= s)
            })
            .cloned()
            .collect();

        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        matched
    }
}

fn entry_touches(entry: &AuditEntry, components: &[NodeId]) -> bool {
    let Some(listed) = entry.details.get("components").and_then(|v| v.as_array()) else {
        return false;
    };
    listed.iter().any(|v| {
        v.as_str()
            .map(|s| components.iter().any(|c| c.as_str() == s))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_and_timestamps_are_monotonic() {
        let journal = InMemoryJournal::new();
        let change = ChangeId::new();

        let first = journal.append(Some(change), None, AuditAction::Created, serde_json::json!({}));
        let second =
            journal.append(Some(change), None, AuditAction::Submitted, serde_json::json!({}));
        let third =
            journal.append(Some(change), None, AuditAction::Approved, serde_json::json!({}));

        assert!(first.id < second.id && second.id < third.id);
        assert!(first.timestamp < second.timestamp);
        assert!(second.timestamp < third.timestamp);
    }

    #[test]
    fn query_filters_by_change_and_action() {
        let journal = InMemoryJournal::new();
        let a = ChangeId::new();
        let b = ChangeId::new();

        journal.append(Some(a), None, AuditAction::Created, serde_json::json!({}));
        journal.append(Some(b), None, AuditAction::Created, serde_json::json!({}));
        journal.append(Some(a), None, AuditAction::Submitted, serde_json::json!({}));

        assert_eq!(journal.entries_for_change(a).len(), 2);
        let submitted = journal.entries(&AuditQuery {
            change_id: Some(a),
            action: Some(AuditAction::Submitted),
            ..Default::default()
        });
        assert_eq!(submitted.len(), 1);
    }

    #[test]
    fn incident_count_scopes_by_component_and_window() {
        let journal = InMemoryJournal::new();
        let fw = NodeId::new("FW-DC1-01");
        let sw = NodeId::new("SW-DC1-CORE");

        journal.append(
            Some(ChangeId::new()),
            None,
            AuditAction::IncidentReported,
            serde_json::json!({"components": ["FW-DC1-01"]}),
        );
        journal.append(
            Some(ChangeId::new()),
            None,
            AuditAction::RolledBack,
            serde_json::json!({"components": ["FW-DC1-01", "SW-DC1-ACC-01"]}),
        );

        let now = Utc::now();
        assert_eq!(
            journal.incident_count(std::slice::from_ref(&fw), Duration::days(90), now),
            2
        );
        assert_eq!(
            journal.incident_count(std::slice::from_ref(&sw), Duration::days(90), now),
            0
        );
        // A window that excludes both entries.
        assert_eq!(
            journal.incident_count(
                std::slice::from_ref(&fw),
                Duration::seconds(0),
                now + Duration::days(1)
            ),
            0
        );
    }

    #[test]
    fn entries_are_never_mutated() {
        let journal = InMemoryJournal::new();
        let entry = journal.append(None, None, AuditAction::SyncCompleted, serde_json::json!({}));
        // Later appends leave earlier entries byte-identical.
        journal.append(None, None, AuditAction::SyncFailed, serde_json::json!({}));
        let all = journal.entries(&AuditQuery::default());
        assert_eq!(all[0], entry);
        assert!(all.iter().all(AuditEntry::verify_integrity));
    }
}
