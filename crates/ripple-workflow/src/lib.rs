//! ripple-workflow: the change lifecycle controller.
//!
//! Drives every change through Draft → Analyzing → Approved → Executing →
//! Completed (with Rejected and RolledBack branches), materializes
//! role-targeted approvals, and gates each transition. The submit pipeline
//! runs impact analysis, policy evaluation, and risk scoring against one
//! graph snapshot, then persists the results on the change record. Every
//! mutation lands in the audit journal.

pub mod approvals;
pub mod error;
pub mod metrics;
pub mod store;

pub use error::WorkflowError;
pub use metrics::Kpis;
pub use store::{ChangeFilter, ChangeStore};

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use ripple_audit::{AuditAction, InMemoryJournal, Journal};
use ripple_core::change::{
    Approval, ApprovalRole, ApprovalStatus, Change, ChangeAction, ChangeId, ChangeStatus,
    ChangeType,
};
use ripple_core::config::Settings;
use ripple_core::types::{Environment, NodeId};
use ripple_graph::GraphStore;
use ripple_impact::{CancelToken, ImpactAnalyzer};
use ripple_risk::{
    evaluate_policies, overall_verdict, PolicyContext, PolicyStore, PolicyVerdict, RiskEngine,
};

use crate::error::Result;

/// Trailing window for the incident-history risk factor.
const INCIDENT_WINDOW_DAYS: i64 = 90;

/// Authoring fields for a new draft.
#[derive(Debug, Clone)]
pub struct NewChange {
    pub title: String,
    pub change_type: ChangeType,
    pub action: ChangeAction,
    pub environment: Environment,
    pub description: String,
    pub execution_plan: String,
    pub rollback_plan: Option<String>,
    pub maintenance_window_start: Option<DateTime<Utc>>,
    pub maintenance_window_end: Option<DateTime<Utc>>,
    pub target_components: Vec<NodeId>,
}

/// Partial edit of an existing change. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ChangeEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub execution_plan: Option<String>,
    pub rollback_plan: Option<Option<String>>,
    pub maintenance_window_start: Option<Option<DateTime<Utc>>>,
    pub maintenance_window_end: Option<Option<DateTime<Utc>>>,
    pub action: Option<ChangeAction>,
    pub target_components: Option<Vec<NodeId>>,
}

pub struct WorkflowController {
    graph: GraphStore,
    store: ChangeStore,
    journal: Arc<InMemoryJournal>,
    policies: Arc<PolicyStore>,
    analyzer: ImpactAnalyzer,
    risk: RiskEngine,
    settings: Arc<Settings>,
}

impl WorkflowController {
    pub fn new(
        graph: GraphStore,
        journal: Arc<InMemoryJournal>,
        policies: Arc<PolicyStore>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            graph,
            store: ChangeStore::new(),
            journal,
            policies,
            analyzer: ImpactAnalyzer::new(settings.clone()),
            risk: RiskEngine::new(settings.clone()),
            settings,
        }
    }

    /// Swap in an analyzer carrying a narrative generator.
    pub fn with_analyzer(mut self, analyzer: ImpactAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn journal(&self) -> &InMemoryJournal {
        &self.journal
    }

    pub fn policies(&self) -> &PolicyStore {
        &self.policies
    }

    // ── Authoring ────────────────────────────────────────────────

    pub fn create_change(&self, new: NewChange, author: &str) -> Result<Change> {
        if !new.action.is_allowed_for(new.change_type) {
            return Err(WorkflowError::Validation(format!(
                "action {:?} is not allowed for change type {:?}",
                new.action, new.change_type
            )));
        }
        validate_window(new.maintenance_window_start, new.maintenance_window_end)?;

        let now = Utc::now();
        let mut change = Change::draft(
            new.title,
            new.change_type,
            new.action,
            new.environment,
            author,
            now,
        );
        change.description = new.description;
        change.execution_plan = new.execution_plan;
        change.rollback_plan = new.rollback_plan;
        change.maintenance_window_start = new.maintenance_window_start;
        change.maintenance_window_end = new.maintenance_window_end;
        change.target_components = new.target_components;

        self.store.insert(change.clone());
        self.journal.append(
            Some(change.id),
            Some(author.to_string()),
            AuditAction::Created,
            json!({
                "title": change.title,
                "change_type": change.change_type,
                "action": change.action,
            }),
        );
        Ok(change)
    }

    pub fn get_change(&self, id: ChangeId) -> Result<Change> {
        self.store
            .get(&id)
            .ok_or_else(|| WorkflowError::NotFound(format!("change {id}")))
    }

    pub fn list_changes(&self, filter: &ChangeFilter) -> Vec<Change> {
        self.store.list(filter)
    }

    pub fn approvals_for(&self, id: ChangeId) -> Vec<Approval> {
        self.store.approvals_for(id)
    }

    /// Edit a change. Allowed while Draft, Pending, or Analyzing; an edit
    /// that touches the target set or the action invalidates the cached
    /// impact snapshot, cancels any in-flight analysis, and drops an
    /// Analyzing change back to Pending.
    pub async fn update_change(&self, id: ChangeId, edit: ChangeEdit, actor: &str) -> Result<Change> {
        let lock = self.store.lock_for(id);
        let _guard = lock.lock().await;

        let change = self.get_change(id)?;
        if !matches!(
            change.status,
            ChangeStatus::Draft | ChangeStatus::Pending | ChangeStatus::Analyzing
        ) {
            return Err(WorkflowError::Validation(format!(
                "change in status {} cannot be edited",
                change.status
            )));
        }

        if let Some(action) = edit.action {
            if !action.is_allowed_for(change.change_type) {
                return Err(WorkflowError::Validation(format!(
                    "action {:?} is not allowed for change type {:?}",
                    action, change.change_type
                )));
            }
        }
        let start = edit
            .maintenance_window_start
            .unwrap_or(change.maintenance_window_start);
        let end = edit
            .maintenance_window_end
            .unwrap_or(change.maintenance_window_end);
        validate_window(start, end)?;

        let invalidates = edit.action.map_or(false, |a| a != change.action)
            || edit
                .target_components
                .as_ref()
                .map_or(false, |t| *t != change.target_components);

        if invalidates {
            if let Some(token) = self.store.take_cancel(&id) {
                token.cancel();
                self.journal.append(
                    Some(id),
                    Some(actor.to_string()),
                    AuditAction::AnalysisSuperseded,
                    json!({"reason": "targets or action edited"}),
                );
            }
        }

        let now = Utc::now();
        let updated = self
            .store
            .update_with(&id, |c| {
                if let Some(title) = edit.title {
                    c.title = title;
                }
                if let Some(description) = edit.description {
                    c.description = description;
                }
                if let Some(plan) = edit.execution_plan {
                    c.execution_plan = plan;
                }
                if let Some(rollback) = edit.rollback_plan {
                    c.rollback_plan = rollback;
                }
                if let Some(start) = edit.maintenance_window_start {
                    c.maintenance_window_start = start;
                }
                if let Some(end) = edit.maintenance_window_end {
                    c.maintenance_window_end = end;
                }
                if let Some(action) = edit.action {
                    c.action = action;
                }
                if let Some(targets) = edit.target_components {
                    c.target_components = targets;
                }
                if invalidates {
                    c.impact_snapshot = None;
                    c.risk_score = None;
                    c.risk_level = None;
                    if c.status == ChangeStatus::Analyzing {
                        c.status = ChangeStatus::Pending;
                    }
                }
                c.updated_at = now;
            })
            .ok_or_else(|| WorkflowError::NotFound(format!("change {id}")))?;

        self.journal.append(
            Some(id),
            Some(actor.to_string()),
            AuditAction::Updated,
            json!({"invalidated_analysis": invalidates}),
        );
        Ok(updated)
    }

    pub async fn delete_change(&self, id: ChangeId, actor: &str) -> Result<()> {
        let lock = self.store.lock_for(id);
        let _guard = lock.lock().await;

        let change = self.get_change(id)?;
        if change.status != ChangeStatus::Draft {
            return Err(WorkflowError::Validation(
                "only Draft changes can be deleted".to_string(),
            ));
        }
        self.store.remove(&id);
        self.store.remove_approvals_for(id);
        self.journal.append(
            Some(id),
            Some(actor.to_string()),
            AuditAction::Deleted,
            json!({"title": change.title}),
        );
        Ok(())
    }

    // ── Submit pipeline ──────────────────────────────────────────

    /// Submit a draft: analyze impact, evaluate policies, score risk,
    /// materialize approvals, and move the change into Analyzing.
    ///
    /// The whole pipeline reads the graph under one snapshot; syncs that
    /// land mid-pipeline do not affect the result.
    pub async fn submit(&self, id: ChangeId, actor: &str) -> Result<Change> {
        let lock = self.store.lock_for(id);
        let _guard = lock.lock().await;

        let change = self.get_change(id)?;
        if change.status != ChangeStatus::Draft {
            return Err(WorkflowError::TransitionForbidden {
                from: change.status,
                to: ChangeStatus::Analyzing,
            });
        }
        if change.target_components.is_empty() {
            return Err(WorkflowError::Validation(
                "at least one target component is required before submit".to_string(),
            ));
        }
        if !change.action.is_allowed_for(change.change_type) {
            return Err(WorkflowError::Validation(format!(
                "action {:?} is not allowed for change type {:?}",
                change.action, change.change_type
            )));
        }
        if change.description.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "description is required before submit".to_string(),
            ));
        }
        if change.execution_plan.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "execution plan is required before submit".to_string(),
            ));
        }
        validate_window(
            change.maintenance_window_start,
            change.maintenance_window_end,
        )?;

        let now = Utc::now();
        let snapshot = self.graph.snapshot();
        let cancel = CancelToken::new();
        self.store.swap_cancel(id, cancel.clone());

        let impact =
            self.analyzer
                .analyze(&snapshot, &change.target_components, change.action, &cancel)?;

        // Policy pass. Triggered policies are stamped and journaled even
        // when the submit is ultimately blocked.
        let ctx = PolicyContext {
            environment: change.environment,
            change_type: change.change_type,
            any_any_involved: impact.any_any_rule_involved,
            now,
            hour_offset: self.settings.policy_hour_offset,
        };
        let evaluations = evaluate_policies(&self.policies.enabled(), &ctx);
        let triggered: Vec<_> = evaluations.iter().filter(|e| e.triggered).collect();
        if !triggered.is_empty() {
            let ids: Vec<i64> = triggered.iter().map(|e| e.policy_id).collect();
            self.policies.mark_triggered(&ids, now);
            for eval in &triggered {
                self.journal.append(
                    Some(id),
                    Some(actor.to_string()),
                    AuditAction::PolicyTriggered,
                    json!({
                        "policy": eval.policy_name,
                        "verdict": eval.verdict,
                        "reason": eval.reason,
                    }),
                );
            }
        }

        let verdict = overall_verdict(&evaluations);
        if verdict == PolicyVerdict::Block {
            let blockers: Vec<&ripple_risk::PolicyEvaluation> = triggered
                .iter()
                .copied()
                .filter(|e| e.verdict == PolicyVerdict::Block)
                .collect();
            return Err(WorkflowError::PolicyBlocked {
                policies: blockers.iter().map(|e| e.policy_name.clone()).collect(),
                reasons: blockers.iter().map(|e| e.reason.clone()).collect(),
            });
        }

        let incident_count = self.journal.incident_count(
            &change.target_components,
            Duration::days(INCIDENT_WINDOW_DAYS),
            now,
        );
        let risk = self.risk.evaluate(&change, &impact, incident_count, now);
        self.journal.append(
            Some(id),
            Some(actor.to_string()),
            AuditAction::RiskCalculated,
            json!({
                "score": risk.score,
                "level": risk.level,
                "factors": risk.factors,
                "clock": risk.clock.to_rfc3339(),
            }),
        );

        let roles = approvals::derive_roles(risk.level, &change, &impact, verdict);
        let expires_at = now + Duration::hours(self.settings.approval_timeout_hours as i64);
        let created = self.store.add_approvals(id, &roles, now, expires_at);

        let updated = self
            .store
            .update_with(&id, |c| {
                c.status = ChangeStatus::Analyzing;
                c.risk_score = Some(risk.score);
                c.risk_level = Some(risk.level);
                c.impact_snapshot = Some(impact.clone());
                c.updated_at = now;
            })
            .ok_or_else(|| WorkflowError::NotFound(format!("change {id}")))?;

        self.journal.append(
            Some(id),
            Some(actor.to_string()),
            AuditAction::Submitted,
            json!({
                "risk_score": risk.score,
                "risk_level": risk.level,
                "approvals": created.iter().map(|a| a.role_required).collect::<Vec<_>>(),
                "components": change.target_components,
            }),
        );

        tracing::info!(
            change_id = %id,
            risk_score = risk.score,
            risk_level = risk.level.as_str(),
            approvals = created.len(),
            "Change submitted"
        );
        Ok(updated)
    }

    /// Re-run impact and risk on the current graph revision, replacing the
    /// cached snapshot.
    pub async fn reanalyze(&self, id: ChangeId, actor: &str) -> Result<Change> {
        let lock = self.store.lock_for(id);
        let _guard = lock.lock().await;

        let change = self.get_change(id)?;
        if !matches!(
            change.status,
            ChangeStatus::Pending | ChangeStatus::Analyzing
        ) {
            return Err(WorkflowError::TransitionForbidden {
                from: change.status,
                to: ChangeStatus::Analyzing,
            });
        }

        let now = Utc::now();
        let snapshot = self.graph.snapshot();
        let cancel = CancelToken::new();
        if let Some(previous) = self.store.swap_cancel(id, cancel.clone()) {
            previous.cancel();
        }
        let impact =
            self.analyzer
                .analyze(&snapshot, &change.target_components, change.action, &cancel)?;
        let incident_count = self.journal.incident_count(
            &change.target_components,
            Duration::days(INCIDENT_WINDOW_DAYS),
            now,
        );
        let risk = self.risk.evaluate(&change, &impact, incident_count, now);
        self.journal.append(
            Some(id),
            Some(actor.to_string()),
            AuditAction::RiskCalculated,
            json!({
                "score": risk.score,
                "level": risk.level,
                "clock": risk.clock.to_rfc3339(),
                "reanalysis": true,
            }),
        );

        self.store
            .update_with(&id, |c| {
                c.status = ChangeStatus::Analyzing;
                c.risk_score = Some(risk.score);
                c.risk_level = Some(risk.level);
                c.impact_snapshot = Some(impact.clone());
                c.updated_at = now;
            })
            .ok_or_else(|| WorkflowError::NotFound(format!("change {id}")))
    }

    // ── Approvals ────────────────────────────────────────────────

    /// Record an approval decision. The per-change lock makes concurrent
    /// decisions on the same row mutually exclusive: the loser observes a
    /// non-Pending row and fails with `ApprovalAlreadyDecided`.
    pub async fn decide(
        &self,
        change_id: ChangeId,
        approval_id: i64,
        actor: &str,
        actor_role: ApprovalRole,
        approve: bool,
        comment: Option<String>,
    ) -> Result<Approval> {
        let lock = self.store.lock_for(change_id);
        let _guard = lock.lock().await;

        let change = self.get_change(change_id)?;
        let approval = self
            .store
            .approval(approval_id)
            .filter(|a| a.change_id == change_id)
            .ok_or_else(|| WorkflowError::NotFound(format!("approval {approval_id}")))?;

        // A lost race reads as "already decided" even when the winning
        // decision has since moved the change on.
        if approval.status != ApprovalStatus::Pending {
            return Err(WorkflowError::ApprovalAlreadyDecided);
        }
        if !matches!(
            change.status,
            ChangeStatus::Pending | ChangeStatus::Analyzing
        ) {
            return Err(WorkflowError::TransitionForbidden {
                from: change.status,
                to: if approve {
                    ChangeStatus::Approved
                } else {
                    ChangeStatus::Rejected
                },
            });
        }
        if actor_role != approval.role_required {
            return Err(WorkflowError::Validation(format!(
                "role {:?} cannot fulfil an approval reserved for {:?}",
                actor_role, approval.role_required
            )));
        }

        let now = Utc::now();
        let decided = self
            .store
            .update_approval_with(approval_id, |a| {
                a.status = if approve {
                    ApprovalStatus::Approved
                } else {
                    ApprovalStatus::Rejected
                };
                a.decided_by = Some(actor.to_string());
                a.decided_at = Some(now);
                a.comment = comment.clone();
            })
            .ok_or_else(|| WorkflowError::NotFound(format!("approval {approval_id}")))?;

        self.journal.append(
            Some(change_id),
            Some(actor.to_string()),
            if approve {
                AuditAction::Approved
            } else {
                AuditAction::Rejected
            },
            json!({
                "approval_id": approval_id,
                "role": decided.role_required,
                "comment": decided.comment,
            }),
        );

        if !approve {
            self.store.update_with(&change_id, |c| {
                c.status = ChangeStatus::Rejected;
                c.reject_reason = Some("Rejected by approver".to_string());
                c.updated_at = now;
            });
            return Ok(decided);
        }

        // Quorum: Approved only when every slot is granted.
        let all = self.store.approvals_for(change_id);
        let quorum_met = all.iter().all(|a| a.status == ApprovalStatus::Approved);
        if quorum_met {
            self.store.update_with(&change_id, |c| {
                c.status = ChangeStatus::Approved;
                c.updated_at = now;
            });
            self.journal.append(
                Some(change_id),
                Some(actor.to_string()),
                AuditAction::Approved,
                json!({"quorum": true}),
            );
        }

        Ok(decided)
    }

    /// Expire unresolved approvals past their deadline. Expired slots count
    /// as rejections: the owning change is rejected.
    pub async fn expire_approvals(&self, now: DateTime<Utc>) -> usize {
        let stale: Vec<Approval> = self
            .store
            .all_approvals()
            .into_iter()
            .filter(|a| a.status == ApprovalStatus::Pending && a.expires_at < now)
            .collect();

        let mut expired = 0;
        for approval in stale {
            let lock = self.store.lock_for(approval.change_id);
            let _guard = lock.lock().await;

            // Re-check under the lock; a concurrent decision may have won.
            let Some(current) = self.store.approval(approval.id) else {
                continue;
            };
            if current.status != ApprovalStatus::Pending {
                continue;
            }

            self.store.update_approval_with(approval.id, |a| {
                a.status = ApprovalStatus::Expired;
                a.decided_at = Some(now);
                a.comment = Some("Expired: approval timeout exceeded".to_string());
            });
            self.journal.append(
                Some(approval.change_id),
                None,
                AuditAction::ApprovalExpired,
                json!({"approval_id": approval.id, "role": approval.role_required}),
            );
            expired += 1;

            if let Some(change) = self.store.get(&approval.change_id) {
                if matches!(
                    change.status,
                    ChangeStatus::Pending | ChangeStatus::Analyzing
                ) {
                    self.store.update_with(&approval.change_id, |c| {
                        c.status = ChangeStatus::Rejected;
                        c.reject_reason = Some("Approval expired".to_string());
                        c.updated_at = now;
                    });
                }
            }
        }
        expired
    }

    // ── Execution lifecycle ──────────────────────────────────────

    /// Move an approved change into Executing. Requires the current time
    /// inside the maintenance window (with the configured grace) or an
    /// explicit admin override, which is itself audited.
    pub async fn execute(&self, id: ChangeId, actor: &str, override_window: bool) -> Result<Change> {
        let lock = self.store.lock_for(id);
        let _guard = lock.lock().await;

        let change = self.get_change(id)?;
        if change.status != ChangeStatus::Approved {
            return Err(WorkflowError::TransitionForbidden {
                from: change.status,
                to: ChangeStatus::Executing,
            });
        }

        let now = Utc::now();
        let grace = Duration::minutes(self.settings.maintenance_window_grace_minutes);
        let in_window = change.within_maintenance_window(now, grace);
        if !in_window && !override_window {
            return Err(WorkflowError::MaintenanceWindowViolation);
        }

        let updated = self
            .store
            .update_with(&id, |c| {
                c.status = ChangeStatus::Executing;
                c.updated_at = now;
            })
            .ok_or_else(|| WorkflowError::NotFound(format!("change {id}")))?;
        self.journal.append(
            Some(id),
            Some(actor.to_string()),
            AuditAction::Executed,
            json!({"window_override": !in_window}),
        );
        Ok(updated)
    }

    pub async fn complete(&self, id: ChangeId, actor: &str) -> Result<Change> {
        self.finish(id, actor, ChangeStatus::Completed, AuditAction::Completed)
            .await
    }

    /// Roll back an executing change. Only legal from Executing.
    pub async fn rollback(&self, id: ChangeId, actor: &str) -> Result<Change> {
        self.finish(id, actor, ChangeStatus::RolledBack, AuditAction::RolledBack)
            .await
    }

    async fn finish(
        &self,
        id: ChangeId,
        actor: &str,
        to: ChangeStatus,
        action: AuditAction,
    ) -> Result<Change> {
        let lock = self.store.lock_for(id);
        let _guard = lock.lock().await;

        let change = self.get_change(id)?;
        if change.status != ChangeStatus::Executing {
            return Err(WorkflowError::TransitionForbidden {
                from: change.status,
                to,
            });
        }

        let now = Utc::now();
        let updated = self
            .store
            .update_with(&id, |c| {
                c.status = to;
                c.updated_at = now;
            })
            .ok_or_else(|| WorkflowError::NotFound(format!("change {id}")))?;
        self.journal.append(
            Some(id),
            Some(actor.to_string()),
            action,
            json!({"components": change.target_components}),
        );
        Ok(updated)
    }

    pub async fn reject(&self, id: ChangeId, actor: &str, reason: &str) -> Result<Change> {
        let lock = self.store.lock_for(id);
        let _guard = lock.lock().await;

        let change = self.get_change(id)?;
        if !matches!(
            change.status,
            ChangeStatus::Pending | ChangeStatus::Analyzing
        ) {
            return Err(WorkflowError::TransitionForbidden {
                from: change.status,
                to: ChangeStatus::Rejected,
            });
        }

        let now = Utc::now();
        let updated = self
            .store
            .update_with(&id, |c| {
                c.status = ChangeStatus::Rejected;
                c.reject_reason = Some(reason.to_string());
                c.updated_at = now;
            })
            .ok_or_else(|| WorkflowError::NotFound(format!("change {id}")))?;
        self.journal.append(
            Some(id),
            Some(actor.to_string()),
            AuditAction::Rejected,
            json!({"reason": reason}),
        );
        Ok(updated)
    }

    /// Record a post-change incident against the change's components; feeds
    /// the incident-history risk factor and the precision KPIs.
    pub fn report_incident(&self, id: ChangeId, description: &str, actor: &str) -> Result<()> {
        let change = self.get_change(id)?;
        self.journal.append(
            Some(id),
            Some(actor.to_string()),
            AuditAction::IncidentReported,
            json!({
                "description": description,
                "components": change.target_components,
            }),
        );
        Ok(())
    }

    /// Periodic reaper loop: expires overdue approvals on an interval.
    /// Runs until the task is dropped.
    pub async fn run_expiration_reaper(self: Arc<Self>, every: std::time::Duration) {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let expired = self.expire_approvals(Utc::now()).await;
            if expired > 0 {
                tracing::info!(expired, "Approval expiration sweep");
            }
        }
    }

    // ── Metrics ──────────────────────────────────────────────────

    pub fn kpis(&self) -> Kpis {
        metrics::compute_kpis(
            &self.store.list(&ChangeFilter::default()),
            &self.store.all_approvals(),
            &self.journal,
        )
    }
}

fn validate_window(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if end <= start {
            return Err(WorkflowError::Validation(
                "maintenance window end must be after start".to_string(),
            ));
        }
    }
    Ok(())
}
