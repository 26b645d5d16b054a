//! KPI roll-ups over the change store and audit journal.

use std::collections::BTreeMap;

use chrono::Duration;
use serde::Serialize;

use ripple_audit::{AuditAction, AuditQuery, InMemoryJournal, Journal};
use ripple_core::change::{Approval, ApprovalStatus, Change, ChangeStatus};

/// Aggregated dashboard numbers. Percentages are 0–100, one decimal.
#[derive(Debug, Clone, Serialize)]
pub struct Kpis {
    pub total_changes: usize,
    pub auto_approved_pct: f64,
    pub avg_validation_minutes: Option<f64>,
    pub incidents_post_change_pct: f64,
    pub scoring_precision_pct: f64,
    pub core_changes_detected_pct: f64,
    pub definitions: BTreeMap<&'static str, &'static str>,
}

pub fn compute_kpis(changes: &[Change], approvals: &[Approval], journal: &InMemoryJournal) -> Kpis {
    let total_changes = changes.len();
    let non_draft: Vec<&Change> = changes
        .iter()
        .filter(|c| c.status != ChangeStatus::Draft)
        .collect();
    let completed: Vec<&Change> = changes
        .iter()
        .filter(|c| c.status == ChangeStatus::Completed)
        .collect();

    let denominator = non_draft.len().max(1);
    let auto_approved = journal
        .entries(&AuditQuery {
            action: Some(AuditAction::AutoApproved),
            ..Default::default()
        })
        .len();
    let auto_approved_pct = pct(auto_approved, denominator);

    // Mean minutes from submit to the first granted approval, over
    // completed changes.
    let mut durations = Vec::new();
    for change in &completed {
        let submitted = journal
            .entries(&AuditQuery {
                change_id: Some(change.id),
                action: Some(AuditAction::Submitted),
                ..Default::default()
            })
            .first()
            .map(|e| e.timestamp);
        let first_approved = approvals
            .iter()
            .filter(|a| a.change_id == change.id && a.status == ApprovalStatus::Approved)
            .filter_map(|a| a.decided_at)
            .min();
        if let (Some(submitted), Some(decided)) = (submitted, first_approved) {
            let minutes = (decided - submitted).num_seconds() as f64 / 60.0;
            if minutes >= 0.0 {
                durations.push(minutes);
            }
        }
    }
    let avg_validation_minutes = if durations.is_empty() {
        None
    } else {
        Some(round1(durations.iter().sum::<f64>() / durations.len() as f64))
    };

    // Completed changes with an incident reported within 7 days of
    // completion.
    let mut incidents = 0;
    for change in &completed {
        let completed_at = journal
            .entries(&AuditQuery {
                change_id: Some(change.id),
                action: Some(AuditAction::Completed),
                ..Default::default()
            })
            .first()
            .map(|e| e.timestamp);
        let Some(completed_at) = completed_at else {
            continue;
        };
        let had_incident = journal
            .entries(&AuditQuery {
                change_id: Some(change.id),
                action: Some(AuditAction::IncidentReported),
                since: Some(completed_at),
                ..Default::default()
            })
            .iter()
            .any(|e| e.timestamp <= completed_at + Duration::days(7));
        if had_incident {
            incidents += 1;
        }
    }
    let completed_count = completed.len().max(1);
    let incidents_post_change_pct = pct(incidents, completed_count);
    let scoring_precision_pct = pct(completed.len() - incidents, completed_count);

    let core_touched = completed
        .iter()
        .filter(|c| {
            c.impact_snapshot
                .as_ref()
                .map(|s| s.directly_impacted.iter().any(|n| n.is_core))
                .unwrap_or(false)
        })
        .count();
    let core_changes_detected_pct = pct(core_touched, completed_count);

    let definitions = BTreeMap::from([
        (
            "auto_approved_pct",
            "Share of non-draft changes auto-approved by the workflow (audit action: auto_approved).",
        ),
        (
            "avg_validation_minutes",
            "Mean elapsed minutes from submit to the first granted approval, over completed changes.",
        ),
        (
            "incidents_post_change_pct",
            "Share of completed changes with an incident reported within 7 days of completion.",
        ),
        (
            "scoring_precision_pct",
            "Share of completed changes with no incident reported within 7 days of completion.",
        ),
        (
            "core_changes_detected_pct",
            "Share of completed changes whose direct targets include a core device.",
        ),
    ]);

    Kpis {
        total_changes,
        auto_approved_pct,
        avg_validation_minutes,
        incidents_post_change_pct,
        scoring_precision_pct,
        core_changes_detected_pct,
        definitions,
    }
}

fn pct(count: usize, denominator: usize) -> f64 {
    round1(count as f64 / denominator as f64 * 100.0)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
