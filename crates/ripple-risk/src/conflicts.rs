//! Policy conflict detection.
//!
//! Two enabled policies conflict when their scopes overlap and their
//! outcomes contradict: a `block` against a warn-through (`overlap`), or a
//! double-approval requirement against a single-approval pass
//! (`precedence`). Detection is symmetric in its arguments.

use serde::{Deserialize, Serialize};

use ripple_core::change::ChangeType;
use ripple_core::policy::{Policy, PolicyAction, PolicyRuleType};
use ripple_core::types::Environment;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    Overlap,
    Precedence,
}

/// A conflicting pair, reported once per unordered pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConflict {
    pub first_id: i64,
    pub first_name: String,
    pub second_id: i64,
    pub second_name: String,
    pub conflict_type: ConflictType,
}

/// Scan all enabled policies pairwise.
pub fn detect_conflicts(policies: &[Policy]) -> Vec<PolicyConflict> {
    let enabled: Vec<&Policy> = policies.iter().filter(|p| p.enabled).collect();
    let mut found = Vec::new();

    for (i, a) in enabled.iter().enumerate() {
        for b in enabled.iter().skip(i + 1) {
            if let Some(conflict_type) = conflict_between(a, b) {
                found.push(PolicyConflict {
                    first_id: a.id,
                    first_name: a.name.clone(),
                    second_id: b.id,
                    second_name: b.name.clone(),
                    conflict_type,
                });
            }
        }
    }

    found
}

/// Symmetric pairwise check: `conflict_between(a, b) == conflict_between(b, a)`.
pub fn conflict_between(a: &Policy, b: &Policy) -> Option<ConflictType> {
    if !scopes_intersect(a, b) {
        return None;
    }

    let pair = (a.action, b.action);
    match pair {
        (PolicyAction::Block, PolicyAction::Warn) | (PolicyAction::Warn, PolicyAction::Block) => {
            Some(ConflictType::Overlap)
        }
        (PolicyAction::RequireDoubleApproval, PolicyAction::Warn)
        | (PolicyAction::Warn, PolicyAction::RequireDoubleApproval) => {
            Some(ConflictType::Precedence)
        }
        _ => None,
    }
}

/// The (environments, change types) a policy constrains; auto-block
/// policies scope through their block lists.
fn scope_of(policy: &Policy) -> (Vec<Environment>, Vec<ChangeType>) {
    match policy.rule_type {
        PolicyRuleType::AutoBlock => (
            policy.condition.block_environments.clone(),
            policy.condition.block_change_types.clone(),
        ),
        _ => (
            policy.condition.environments.clone(),
            policy.condition.change_types.clone(),
        ),
    }
}

fn scopes_intersect(a: &Policy, b: &Policy) -> bool {
    let (envs_a, types_a) = scope_of(a);
    let (envs_b, types_b) = scope_of(b);

    let envs_overlap =
        envs_a.is_empty() || envs_b.is_empty() || envs_a.iter().any(|e| envs_b.contains(e));
    let types_overlap =
        types_a.is_empty() || types_b.is_empty() || types_a.iter().any(|t| types_b.contains(t));

    envs_overlap && types_overlap
}
