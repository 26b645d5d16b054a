//! ripple-audit — append-only audit journal.
//!
//! Every semantic event in the engine lands here: change transitions,
//! approval decisions, policy triggers, risk calculations, sync outcomes.
//! Entries are immutable once committed; each carries a BLAKE3 content hash
//! so after-the-fact modification is detectable.

pub mod hash;
pub mod journal;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ripple_core::change::ChangeId;

pub use journal::{AuditQuery, InMemoryJournal, Journal};

/// The verb an audit entry records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Updated,
    Deleted,
    Submitted,
    Approved,
    Rejected,
    AutoApproved,
    Executed,
    Completed,
    RolledBack,
    PolicyTriggered,
    RiskCalculated,
    ApprovalExpired,
    AnalysisSuperseded,
    IncidentReported,
    SyncCompleted,
    SyncFailed,
}

/// One committed journal entry.
///
/// `id` and `timestamp` are assigned at commit time under the journal lock,
/// so entries for the same change are totally ordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub id: i64,
    pub change_id: Option<ChangeId>,
    pub user_id: Option<String>,
    pub action: AuditAction,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    /// BLAKE3 hex hash over every other field, set at commit.
    pub content_hash: String,
}

impl AuditEntry {
    /// Recompute the content hash and compare with the stored one.
    pub fn verify_integrity(&self) -> bool {
        self.content_hash == hash::compute_entry_hash(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::{InMemoryJournal, Journal};

    #[test]
    fn entry_hash_detects_tampering() {
        let journal = InMemoryJournal::new();
        let entry = journal.append(
            None,
            Some("alice".to_string()),
            AuditAction::Created,
            serde_json::json!({"title": "test"}),
        );
        assert!(entry.verify_integrity());

        let mut tampered = entry.clone();
        tampered.details = serde_json::json!({"title": "forged"});
        assert!(!tampered.verify_integrity());
    }

    #[test]
    fn action_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&AuditAction::RolledBack).unwrap(),
            "\"rolled_back\""
        );
        assert_eq!(
            serde_json::to_string(&AuditAction::PolicyTriggered).unwrap(),
            "\"policy_triggered\""
        );
    }
}
