//! Additive risk scoring.
//!
//! Factors accumulate, reductions apply afterwards, and the result is
//! clipped to the configured `[0, 100]` range. The clock used for the
//! maintenance-window check is an explicit input and is carried on the
//! result so every score is reproducible.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use ripple_core::change::{Change, ChangeAction, RiskLevel};
use ripple_core::config::Settings;
use ripple_core::impact::ImpactSnapshot;
use ripple_core::types::{Criticality, Environment};

const W_PROD_ENV: f64 = 30.0;
const W_CORE_DEVICE: f64 = 40.0;
const W_HIGH_DEPS: f64 = 20.0;
const W_NO_ROLLBACK: f64 = 25.0;
const W_OUTSIDE_WINDOW: f64 = 30.0;
const W_INCIDENT_HISTORY: f64 = 15.0;
const W_PER_CRITICAL_APP: f64 = 20.0;
const CAP_CRITICAL_APPS: f64 = 40.0;
const W_ANY_ANY: f64 = 25.0;
const R_REDUNDANT_CRITICALS: f64 = 10.0;
const R_ADDITIVE_LOW: f64 = 5.0;

const DEPENDENCY_THRESHOLD: usize = 10;

/// One factor that fired, with its contribution and a displayable reason.
#[derive(Debug, Clone, Serialize)]
pub struct RiskFactor {
    pub name: &'static str,
    pub score: f64,
    pub reason: String,
}

/// Outcome of a risk evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct RiskResult {
    pub score: f64,
    pub level: RiskLevel,
    /// Hint for the workflow: low-risk changes are auto-approval candidates.
    pub auto_approve: bool,
    pub factors: Vec<RiskFactor>,
    /// The clock value the maintenance check ran against.
    pub clock: DateTime<Utc>,
}

pub struct RiskEngine {
    settings: Arc<Settings>,
}

impl RiskEngine {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// Score a change against its frozen impact snapshot.
    ///
    /// Pure: the same (change, impact, incident_count, now) always produce
    /// the same result.
    pub fn evaluate(
        &self,
        change: &Change,
        impact: &ImpactSnapshot,
        incident_count: usize,
        now: DateTime<Utc>,
    ) -> RiskResult {
        let mut factors = Vec::new();
        let mut score = 0.0;

        if change.environment == Environment::Prod {
            score += W_PROD_ENV;
            factors.push(RiskFactor {
                name: "production_environment",
                score: W_PROD_ENV,
                reason: "Change targets Production environment".to_string(),
            });
        }

        if impact.directly_impacted.iter().any(|n| n.is_core) {
            score += W_CORE_DEVICE;
            factors.push(RiskFactor {
                name: "core_network_device",
                score: W_CORE_DEVICE,
                reason: "Change affects a core network device".to_string(),
            });
        }

        if impact.total_dependency_count > DEPENDENCY_THRESHOLD {
            score += W_HIGH_DEPS;
            factors.push(RiskFactor {
                name: "high_dependency_count",
                score: W_HIGH_DEPS,
                reason: format!(
                    "{} dependencies affected (>{DEPENDENCY_THRESHOLD})",
                    impact.total_dependency_count
                ),
            });
        }

        if !change.has_rollback_plan() {
            score += W_NO_ROLLBACK;
            factors.push(RiskFactor {
                name: "no_rollback_plan",
                score: W_NO_ROLLBACK,
                reason: "No rollback plan provided".to_string(),
            });
        }

        if let Some(reason) = maintenance_window_gap(change, now) {
            score += W_OUTSIDE_WINDOW;
            factors.push(RiskFactor {
                name: "maintenance_window",
                score: W_OUTSIDE_WINDOW,
                reason,
            });
        }

        if incident_count > 0 {
            score += W_INCIDENT_HISTORY;
            factors.push(RiskFactor {
                name: "incident_history",
                score: W_INCIDENT_HISTORY,
                reason: format!(
                    "{incident_count} incident(s) recorded on impacted components within 90 days"
                ),
            });
        }

        let critical_apps = impact.critical_application_count();
        if critical_apps > 0 {
            let contribution = (critical_apps as f64 * W_PER_CRITICAL_APP).min(CAP_CRITICAL_APPS);
            score += contribution;
            factors.push(RiskFactor {
                name: "critical_applications",
                score: contribution,
                reason: format!("{critical_apps} critical application(s) in the blast radius"),
            });
        }

        if impact.any_any_rule_involved {
            score += W_ANY_ANY;
            factors.push(RiskFactor {
                name: "any_any_rule",
                score: W_ANY_ANY,
                reason: "An ANY-ANY firewall rule is involved".to_string(),
            });
        }

        // Reductions apply after the additive pass.
        if impact.all_critical_redundant(Criticality::Critical) {
            score -= R_REDUNDANT_CRITICALS;
            factors.push(RiskFactor {
                name: "redundancy_available",
                score: -R_REDUNDANT_CRITICALS,
                reason: "Every affected critical workload has a redundant path".to_string(),
            });
        }

        if change.action == ChangeAction::AddRule && impact.max_criticality <= Criticality::Low {
            score -= R_ADDITIVE_LOW;
            factors.push(RiskFactor {
                name: "additive_low_criticality",
                score: -R_ADDITIVE_LOW,
                reason: "Additive rule touching only low-criticality targets".to_string(),
            });
        }

        let clipped = score
            .max(self.settings.risk_clip_min)
            .min(self.settings.risk_clip_max);
        let score = (clipped * 10.0).round() / 10.0;
        let level = RiskLevel::from_score(score);

        tracing::info!(
            change_id = %change.id,
            score,
            level = level.as_str(),
            factor_count = factors.len(),
            "Risk evaluated"
        );

        RiskResult {
            score,
            level,
            auto_approve: level == RiskLevel::Low,
            factors,
            clock: now,
        }
    }
}

/// None when `now` sits inside the defined window; otherwise the reason the
/// change counts as out-of-window. The execute-time grace period does not
/// apply here.
fn maintenance_window_gap(change: &Change, now: DateTime<Utc>) -> Option<String> {
    match (
        change.maintenance_window_start,
        change.maintenance_window_end,
    ) {
        (Some(start), Some(end)) => {
            if start <= now && now <= end {
                None
            } else {
                Some("Change is outside the defined maintenance window".to_string())
            }
        }
        _ => Some("No maintenance window defined".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use ripple_core::change::ChangeType;
    use ripple_core::impact::{AffectedEndpoint, ImpactedNode, TraversalStrategy};
    use ripple_core::types::{NodeId, NodeKind};

    fn engine() -> RiskEngine {
        RiskEngine::new(Arc::new(Settings::default()))
    }

    fn empty_impact(strategy: TraversalStrategy) -> ImpactSnapshot {
        ImpactSnapshot {
            directly_impacted: Vec::new(),
            indirectly_impacted: Vec::new(),
            affected_applications: Vec::new(),
            affected_services: Vec::new(),
            affected_vlans: Vec::new(),
            critical_paths: Vec::new(),
            total_dependency_count: 0,
            max_criticality: Criticality::Low,
            traversal_strategy: strategy,
            any_any_rule_involved: false,
            unknown_targets: Vec::new(),
            graph_revision: 1,
        }
    }

    fn critical_app(id: &str, redundant: bool) -> AffectedEndpoint {
        AffectedEndpoint {
            id: NodeId::new(id),
            kind: NodeKind::Application,
            criticality: Criticality::Critical,
            redundancy_available: redundant,
        }
    }

    fn core_target(id: &str) -> ImpactedNode {
        ImpactedNode {
            id: NodeId::new(id),
            kind: NodeKind::Device,
            criticality: Some(Criticality::Critical),
            device_kind: Some(ripple_core::types::DeviceKind::Firewall),
            is_core: true,
        }
    }

    fn change(env: Environment, action: ChangeAction) -> Change {
        Change::draft(
            "test",
            ChangeType::Firewall,
            action,
            env,
            "alice",
            Utc::now(),
        )
    }

    #[test]
    fn decommission_of_core_firewall_caps_at_100() {
        let now = Utc::now();
        let mut c = change(Environment::Prod, ChangeAction::Decommission);
        c.target_components = vec![NodeId::new("FW-DC1-01")];

        let mut impact = empty_impact(TraversalStrategy::DeviceBlast);
        impact.directly_impacted = vec![core_target("FW-DC1-01")];
        impact.affected_applications = vec![
            critical_app("APP-PAYMENTS", false),
            critical_app("APP-TRADING", false),
            critical_app("APP-CRM", false),
        ];
        impact.total_dependency_count = 18;
        impact.max_criticality = Criticality::Critical;

        // Prod 30 + core 40 + deps 20 + no rollback 25 + no window 30
        // + critical apps 40 (capped) = 185, clipped to 100.
        let result = engine().evaluate(&c, &impact, 0, now);
        assert_eq!(result.score, 100.0);
        assert_eq!(result.level, RiskLevel::Critical);
        assert!(!result.auto_approve);
    }

    #[test]
    fn additive_low_criticality_rule_scores_low() {
        let now = Utc::now();
        let mut c = change(Environment::Preprod, ChangeAction::AddRule);
        c.rollback_plan = Some("remove the rule".to_string());
        c.maintenance_window_start = Some(now - Duration::hours(1));
        c.maintenance_window_end = Some(now + Duration::hours(1));

        let mut impact = empty_impact(TraversalStrategy::RuleScope);
        impact.total_dependency_count = 4;
        impact.max_criticality = Criticality::Low;

        let result = engine().evaluate(&c, &impact, 0, now);
        assert!(result.score <= 30.0);
        assert_eq!(result.level, RiskLevel::Low);
        assert!(result.auto_approve);
        // The reduction fired but the floor held.
        assert_eq!(result.score, 0.0);
        assert!(result
            .factors
            .iter()
            .any(|f| f.name == "additive_low_criticality"));
    }

    #[test]
    fn redundancy_reduction_needs_every_critical_covered() {
        let now = Utc::now();
        let mut c = change(Environment::Prod, ChangeAction::RemoveRule);
        c.rollback_plan = Some("re-add".to_string());
        c.maintenance_window_start = Some(now - Duration::hours(1));
        c.maintenance_window_end = Some(now + Duration::hours(1));

        let mut impact = empty_impact(TraversalStrategy::RuleScopeReverse);
        impact.affected_applications =
            vec![critical_app("APP-A", true), critical_app("APP-B", true)];

        // Both redundant: 30 + 40 - 10 = 60.
        let all_redundant = engine().evaluate(&c, &impact, 0, now);
        assert_eq!(all_redundant.score, 60.0);

        impact.affected_applications[1].redundancy_available = false;
        let partially = engine().evaluate(&c, &impact, 0, now);
        assert_eq!(partially.score, 70.0);
    }

    #[test]
    fn missing_window_counts_as_outside() {
        let now = Utc::now();
        let c = change(Environment::Preprod, ChangeAction::ConfigChange);
        let impact = empty_impact(TraversalStrategy::NeighborCrawl);

        let result = engine().evaluate(&c, &impact, 0, now);
        assert!(result
            .factors
            .iter()
            .any(|f| f.name == "maintenance_window" && f.reason.contains("No maintenance window")));
        // 25 (no rollback) + 30 (no window) = 55 → medium boundary.
        assert_eq!(result.score, 55.0);
        assert_eq!(result.level, RiskLevel::Medium);
    }

    #[test]
    fn incident_history_adds_fifteen() {
        let now = Utc::now();
        let mut c = change(Environment::Preprod, ChangeAction::ConfigChange);
        c.rollback_plan = Some("revert".to_string());
        c.maintenance_window_start = Some(now - Duration::hours(1));
        c.maintenance_window_end = Some(now + Duration::hours(1));
        let impact = empty_impact(TraversalStrategy::NeighborCrawl);

        let with = engine().evaluate(&c, &impact, 2, now);
        let without = engine().evaluate(&c, &impact, 0, now);
        assert_eq!(with.score - without.score, 15.0);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let now = Utc::now();
        let mut c = change(Environment::Prod, ChangeAction::Decommission);
        c.target_components = vec![NodeId::new("FW-1")];
        let mut impact = empty_impact(TraversalStrategy::DeviceBlast);
        impact.directly_impacted = vec![core_target("FW-1")];
        impact.any_any_rule_involved = true;

        let a = engine().evaluate(&c, &impact, 1, now);
        let b = engine().evaluate(&c, &impact, 1, now);
        assert_eq!(a.score, b.score);
        assert_eq!(a.level, b.level);
        assert_eq!(a.clock, b.clock);
        assert_eq!(a.factors.len(), b.factors.len());
    }

    #[test]
    fn score_is_always_clipped_to_range() {
        let now = Utc::now();
        let mut c = change(Environment::Prod, ChangeAction::Decommission);
        c.target_components = vec![NodeId::new("FW-1")];
        let mut impact = empty_impact(TraversalStrategy::DeviceBlast);
        impact.directly_impacted = vec![core_target("FW-1")];
        impact.any_any_rule_involved = true;
        impact.total_dependency_count = 99;
        impact.affected_applications = (0..10)
            .map(|i| critical_app(&format!("APP-{i}"), false))
            .collect();

        let result = engine().evaluate(&c, &impact, 5, now);
        assert!(result.score <= 100.0 && result.score >= 0.0);
    }
}
