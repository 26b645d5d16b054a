//! Policy guardrail definitions.
//!
//! A policy is a structured predicate plus an action. Conditions are closed
//! records: unknown keys are rejected at the deserialization boundary.

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::change::ChangeType;
use crate::types::Environment;

/// The family of check a policy performs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PolicyRuleType {
    TimeRestriction,
    DoubleValidation,
    AutoBlock,
}

/// What happens when a policy triggers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    Block,
    Warn,
    RequireDoubleApproval,
}

/// Day of week, serialized as the usual three-letter tag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DayOfWeek {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl DayOfWeek {
    pub fn matches(&self, weekday: Weekday) -> bool {
        matches!(
            (self, weekday),
            (DayOfWeek::Mon, Weekday::Mon)
                | (DayOfWeek::Tue, Weekday::Tue)
                | (DayOfWeek::Wed, Weekday::Wed)
                | (DayOfWeek::Thu, Weekday::Thu)
                | (DayOfWeek::Fri, Weekday::Fri)
                | (DayOfWeek::Sat, Weekday::Sat)
                | (DayOfWeek::Sun, Weekday::Sun)
        )
    }
}

/// Structured predicate a policy evaluates against a change.
///
/// Empty or missing fields mean "no constraint on that axis".
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct PolicyCondition {
    pub environments: Vec<Environment>,
    pub change_types: Vec<ChangeType>,
    /// Start of the blocked window, hour of day 0..24. Blocks when
    /// `hour ∈ [start, end)`.
    pub blocked_hours_start: Option<u8>,
    pub blocked_hours_end: Option<u8>,
    pub blocked_days: Vec<DayOfWeek>,
    /// Minimum approvals a double-validation policy enforces (≥ 2).
    pub required_approvals: Option<u32>,
    pub block_any_any_rules: bool,
    pub block_environments: Vec<Environment>,
    pub block_change_types: Vec<ChangeType>,
}

impl PolicyCondition {
    /// Whether the scope axes (environments, change types) apply to a change.
    pub fn scope_matches(&self, environment: Environment, change_type: ChangeType) -> bool {
        let env_ok = self.environments.is_empty() || self.environments.contains(&environment);
        let type_ok = self.change_types.is_empty() || self.change_types.contains(&change_type);
        env_ok && type_ok
    }
}

/// A configured guardrail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: i64,
    pub name: String,
    pub rule_type: PolicyRuleType,
    pub condition: PolicyCondition,
    pub action: PolicyAction,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub last_triggered_at: Option<DateTime<Utc>>,
}

impl Policy {
    pub fn new(
        id: i64,
        name: impl Into<String>,
        rule_type: PolicyRuleType,
        condition: PolicyCondition,
        action: PolicyAction,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            rule_type,
            condition,
            action,
            enabled: true,
            created_at: now,
            last_triggered_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_rejects_unknown_keys() {
        let json = r#"{"environments": ["Prod"], "surprise_field": 1}"#;
        let parsed: Result<PolicyCondition, _> = serde_json::from_str(json);
        assert!(parsed.is_err());
    }

    #[test]
    fn empty_condition_matches_everything() {
        let cond = PolicyCondition::default();
        assert!(cond.scope_matches(Environment::Prod, ChangeType::Firewall));
        assert!(cond.scope_matches(Environment::Dc2, ChangeType::Vlan));
    }

    #[test]
    fn scoped_condition_filters() {
        let cond = PolicyCondition {
            environments: vec![Environment::Prod],
            change_types: vec![ChangeType::Firewall],
            ..Default::default()
        };
        assert!(cond.scope_matches(Environment::Prod, ChangeType::Firewall));
        assert!(!cond.scope_matches(Environment::Preprod, ChangeType::Firewall));
        assert!(!cond.scope_matches(Environment::Prod, ChangeType::Vlan));
    }

    #[test]
    fn day_of_week_matches_chrono() {
        assert!(DayOfWeek::Mon.matches(Weekday::Mon));
        assert!(!DayOfWeek::Mon.matches(Weekday::Sun));
    }
}
