//! Policy evaluation and the in-memory policy store.
//!
//! Every enabled policy is evaluated on submit; the change-level verdict is
//! the most severe among the triggered ones, in order
//! `block > require_double_approval > warn > ignore`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use ripple_core::change::ChangeType;
use ripple_core::policy::{Policy, PolicyAction, PolicyCondition, PolicyRuleType};
use ripple_core::types::Environment;

/// Change-level outcome of a policy pass. Ordered by severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PolicyVerdict {
    Ignore,
    Warn,
    RequireDoubleApproval,
    Block,
}

/// Result of evaluating one policy against one change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyEvaluation {
    pub policy_id: i64,
    pub policy_name: String,
    pub rule_type: PolicyRuleType,
    pub triggered: bool,
    pub verdict: PolicyVerdict,
    pub reason: String,
}

/// The slice of a change the policy engine looks at.
#[derive(Debug, Clone)]
pub struct PolicyContext {
    pub environment: Environment,
    pub change_type: ChangeType,
    /// Whether the impact analysis found an ANY-ANY rule involved.
    pub any_any_involved: bool,
    pub now: DateTime<Utc>,
    /// Display offset (hours) applied before blocked-hour comparison.
    pub hour_offset: i32,
}

/// Evaluate every enabled policy. Disabled policies are skipped entirely.
pub fn evaluate_policies(policies: &[Policy], ctx: &PolicyContext) -> Vec<PolicyEvaluation> {
    policies
        .iter()
        .filter(|p| p.enabled)
        .map(|p| evaluate_single(p, ctx))
        .collect()
}

/// Most severe verdict among the evaluations.
pub fn overall_verdict(evaluations: &[PolicyEvaluation]) -> PolicyVerdict {
    evaluations
        .iter()
        .map(|e| e.verdict)
        .max()
        .unwrap_or(PolicyVerdict::Ignore)
}

fn evaluate_single(policy: &Policy, ctx: &PolicyContext) -> PolicyEvaluation {
    let (triggered, reason) = match policy.rule_type {
        PolicyRuleType::TimeRestriction => check_time_restriction(&policy.condition, ctx),
        PolicyRuleType::DoubleValidation => check_double_validation(&policy.condition, ctx),
        PolicyRuleType::AutoBlock => check_auto_block(&policy.condition, ctx),
    };

    let verdict = if triggered {
        match policy.action {
            PolicyAction::Block => PolicyVerdict::Block,
            PolicyAction::Warn => PolicyVerdict::Warn,
            PolicyAction::RequireDoubleApproval => PolicyVerdict::RequireDoubleApproval,
        }
    } else {
        PolicyVerdict::Ignore
    };

    PolicyEvaluation {
        policy_id: policy.id,
        policy_name: policy.name.clone(),
        rule_type: policy.rule_type,
        triggered,
        verdict,
        reason,
    }
}

fn check_time_restriction(cond: &PolicyCondition, ctx: &PolicyContext) -> (bool, String) {
    if !cond.scope_matches(ctx.environment, ctx.change_type) {
        return (false, "Change is outside this policy's scope".to_string());
    }

    let (Some(start), Some(end)) = (cond.blocked_hours_start, cond.blocked_hours_end) else {
        return (false, "No blocked hours configured".to_string());
    };

    let local = ctx.now + Duration::hours(ctx.hour_offset as i64);
    let hour = local.hour() as u8;
    let day_blocked = cond.blocked_days.is_empty()
        || cond
            .blocked_days
            .iter()
            .any(|d| d.matches(local.date_naive().weekday()));
    let hour_blocked = if start <= end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    };

    if day_blocked && hour_blocked {
        (
            true,
            format!("Change falls inside blocked hours ({start}:00-{end}:00)"),
        )
    } else {
        (false, "Change is outside blocked hours".to_string())
    }
}

fn check_double_validation(cond: &PolicyCondition, ctx: &PolicyContext) -> (bool, String) {
    if cond.scope_matches(ctx.environment, ctx.change_type) {
        let required = cond.required_approvals.unwrap_or(2);
        (
            true,
            format!("Double validation required: {required} approvals for this change class"),
        )
    } else {
        (
            false,
            "Change does not match double validation criteria".to_string(),
        )
    }
}

fn check_auto_block(cond: &PolicyCondition, ctx: &PolicyContext) -> (bool, String) {
    if cond.block_any_any_rules && ctx.any_any_involved {
        return (
            true,
            "ANY-ANY firewall rules are blocked by policy".to_string(),
        );
    }

    let env_listed = !cond.block_environments.is_empty();
    let type_listed = !cond.block_change_types.is_empty();
    let env_match = cond.block_environments.contains(&ctx.environment);
    let type_match = cond.block_change_types.contains(&ctx.change_type);

    let blocked = match (env_listed, type_listed) {
        (true, true) => env_match && type_match,
        (true, false) => env_match,
        (false, true) => type_match,
        (false, false) => false,
    };

    if blocked {
        (
            true,
            format!(
                "{:?} changes in {:?} are blocked by policy",
                ctx.change_type, ctx.environment
            ),
        )
    } else {
        (false, "Change does not match auto-block criteria".to_string())
    }
}

// ── Policy store ──────────────────────────────────────────────────

/// Process-local policy registry with monotonic ids.
pub struct PolicyStore {
    policies: RwLock<Vec<Policy>>,
    next_id: AtomicI64,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self {
            policies: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Register a new policy and return it with its assigned id.
    pub fn create(
        &self,
        name: impl Into<String>,
        rule_type: PolicyRuleType,
        condition: PolicyCondition,
        action: PolicyAction,
        now: DateTime<Utc>,
    ) -> Policy {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let policy = Policy::new(id, name, rule_type, condition, action, now);
        self.policies
            .write()
            .expect("policy lock poisoned")
            .push(policy.clone());
        policy
    }

    pub fn get(&self, id: i64) -> Option<Policy> {
        self.policies
            .read()
            .expect("policy lock poisoned")
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub fn all(&self) -> Vec<Policy> {
        self.policies.read().expect("policy lock poisoned").clone()
    }

    pub fn enabled(&self) -> Vec<Policy> {
        self.policies
            .read()
            .expect("policy lock poisoned")
            .iter()
            .filter(|p| p.enabled)
            .cloned()
            .collect()
    }

    pub fn set_enabled(&self, id: i64, enabled: bool) -> bool {
        let mut policies = self.policies.write().expect("policy lock poisoned");
        match policies.iter_mut().find(|p| p.id == id) {
            Some(p) => {
                p.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: i64) -> bool {
        let mut policies = self.policies.write().expect("policy lock poisoned");
        let before = policies.len();
        policies.retain(|p| p.id != id);
        policies.len() != before
    }

    /// Stamp `last_triggered_at` on the given policies.
    pub fn mark_triggered(&self, ids: &[i64], now: DateTime<Utc>) {
        let mut policies = self.policies.write().expect("policy lock poisoned");
        for policy in policies.iter_mut() {
            if ids.contains(&policy.id) {
                policy.last_triggered_at = Some(now);
            }
        }
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ripple_core::policy::DayOfWeek;

    fn ctx_at(hour: u32) -> PolicyContext {
        // 2026-03-04 is a Wednesday.
        PolicyContext {
            environment: Environment::Prod,
            change_type: ChangeType::Firewall,
            any_any_involved: false,
            now: Utc.with_ymd_and_hms(2026, 3, 4, hour, 0, 0).unwrap(),
            hour_offset: 0,
        }
    }

    fn time_policy(action: PolicyAction) -> Policy {
        Policy::new(
            1,
            "No prod changes in biz hours",
            PolicyRuleType::TimeRestriction,
            PolicyCondition {
                environments: vec![Environment::Prod],
                blocked_hours_start: Some(9),
                blocked_hours_end: Some(17),
                ..Default::default()
            },
            action,
            Utc::now(),
        )
    }

    #[test]
    fn time_restriction_blocks_inside_window() {
        let policy = time_policy(PolicyAction::Block);
        let evals = evaluate_policies(std::slice::from_ref(&policy), &ctx_at(10));
        assert!(evals[0].triggered);
        assert_eq!(evals[0].verdict, PolicyVerdict::Block);
        assert_eq!(overall_verdict(&evals), PolicyVerdict::Block);
    }

    #[test]
    fn time_restriction_half_open_boundaries() {
        let policy = time_policy(PolicyAction::Block);
        assert!(evaluate_policies(std::slice::from_ref(&policy), &ctx_at(9))[0].triggered);
        assert!(!evaluate_policies(std::slice::from_ref(&policy), &ctx_at(17))[0].triggered);
        assert!(!evaluate_policies(std::slice::from_ref(&policy), &ctx_at(8))[0].triggered);
    }

    #[test]
    fn time_restriction_respects_blocked_days() {
        let mut policy = time_policy(PolicyAction::Block);
        policy.condition.blocked_days = vec![DayOfWeek::Sat, DayOfWeek::Sun];
        // Wednesday 10:00 → not blocked.
        assert!(!evaluate_policies(std::slice::from_ref(&policy), &ctx_at(10))[0].triggered);
    }

    #[test]
    fn time_restriction_out_of_scope_environment() {
        let policy = time_policy(PolicyAction::Block);
        let mut ctx = ctx_at(10);
        ctx.environment = Environment::Preprod;
        assert!(!evaluate_policies(std::slice::from_ref(&policy), &ctx)[0].triggered);
    }

    #[test]
    fn hour_offset_shifts_the_check() {
        let policy = time_policy(PolicyAction::Block);
        let mut ctx = ctx_at(8);
        assert!(!evaluate_policies(std::slice::from_ref(&policy), &ctx)[0].triggered);
        ctx.hour_offset = 1;
        assert!(evaluate_policies(std::slice::from_ref(&policy), &ctx)[0].triggered);
    }

    #[test]
    fn double_validation_triggers_on_scope() {
        let policy = Policy::new(
            2,
            "Prod firewall double check",
            PolicyRuleType::DoubleValidation,
            PolicyCondition {
                environments: vec![Environment::Prod],
                change_types: vec![ChangeType::Firewall],
                required_approvals: Some(2),
                ..Default::default()
            },
            PolicyAction::RequireDoubleApproval,
            Utc::now(),
        );
        let evals = evaluate_policies(std::slice::from_ref(&policy), &ctx_at(3));
        assert!(evals[0].triggered);
        assert_eq!(overall_verdict(&evals), PolicyVerdict::RequireDoubleApproval);
    }

    #[test]
    fn auto_block_on_any_any() {
        let policy = Policy::new(
            3,
            "No ANY-ANY",
            PolicyRuleType::AutoBlock,
            PolicyCondition {
                block_any_any_rules: true,
                ..Default::default()
            },
            PolicyAction::Block,
            Utc::now(),
        );
        let mut ctx = ctx_at(3);
        assert!(!evaluate_policies(std::slice::from_ref(&policy), &ctx)[0].triggered);
        ctx.any_any_involved = true;
        assert!(evaluate_policies(std::slice::from_ref(&policy), &ctx)[0].triggered);
    }

    #[test]
    fn auto_block_env_and_type_lists() {
        let policy = Policy::new(
            4,
            "Freeze prod firewall work",
            PolicyRuleType::AutoBlock,
            PolicyCondition {
                block_environments: vec![Environment::Prod],
                block_change_types: vec![ChangeType::Firewall],
                ..Default::default()
            },
            PolicyAction::Block,
            Utc::now(),
        );
        assert!(evaluate_policies(std::slice::from_ref(&policy), &ctx_at(3))[0].triggered);

        let mut ctx = ctx_at(3);
        ctx.change_type = ChangeType::Vlan;
        assert!(!evaluate_policies(std::slice::from_ref(&policy), &ctx)[0].triggered);
    }

    #[test]
    fn disabled_policies_are_skipped() {
        let mut policy = time_policy(PolicyAction::Block);
        policy.enabled = false;
        let evals = evaluate_policies(std::slice::from_ref(&policy), &ctx_at(10));
        assert!(evals.is_empty());
    }

    #[test]
    fn verdict_ordering_is_block_first() {
        assert!(PolicyVerdict::Block > PolicyVerdict::RequireDoubleApproval);
        assert!(PolicyVerdict::RequireDoubleApproval > PolicyVerdict::Warn);
        assert!(PolicyVerdict::Warn > PolicyVerdict::Ignore);
    }

    #[test]
    fn store_assigns_ids_and_tracks_triggers() {
        let store = PolicyStore::new();
        let a = store.create(
            "a",
            PolicyRuleType::AutoBlock,
            PolicyCondition::default(),
            PolicyAction::Warn,
            Utc::now(),
        );
        let b = store.create(
            "b",
            PolicyRuleType::AutoBlock,
            PolicyCondition::default(),
            PolicyAction::Block,
            Utc::now(),
        );
        assert!(a.id < b.id);

        let now = Utc::now();
        store.mark_triggered(&[b.id], now);
        assert_eq!(store.get(b.id).unwrap().last_triggered_at, Some(now));
        assert_eq!(store.get(a.id).unwrap().last_triggered_at, None);

        store.set_enabled(a.id, false);
        assert_eq!(store.enabled().len(), 1);
        assert!(store.remove(a.id));
        assert_eq!(store.all().len(), 1);
    }
}
