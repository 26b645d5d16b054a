//! BLAKE3 content hashing for tamper evidence.
//!
//! Computes a deterministic hash of all entry fields (excluding the
//! content_hash itself) so that any modification is detectable.

use serde::Serialize;

use crate::AuditEntry;

/// Hashable representation of an entry (excludes content_hash).
#[derive(Serialize)]
struct HashableEntry<'a> {
    id: i64,
    change_id: &'a Option<ripple_core::change::ChangeId>,
    user_id: &'a Option<String>,
    action: &'a crate::AuditAction,
    details: &'a serde_json::Value,
    timestamp: &'a chrono::DateTime<chrono::Utc>,
}

/// Compute the BLAKE3 hash of an entry's content.
///
/// Serializes all fields except `content_hash` to JSON, then hashes the
/// bytes. Returns the hex-encoded hash.
pub fn compute_entry_hash(entry: &AuditEntry) -> String {
    let hashable = HashableEntry {
        id: entry.id,
        change_id: &entry.change_id,
        user_id: &entry.user_id,
        action: &entry.action,
        details: &entry.details,
        timestamp: &entry.timestamp,
    };

    let json = serde_json::to_vec(&hashable).expect("audit entry serialization should not fail");
    blake3::hash(&json).to_hex().to_string()
}
