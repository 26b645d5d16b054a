//! Change records, approvals, and the change lifecycle enums.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::impact::ImpactSnapshot;
use crate::types::{Environment, NodeId};

// ── Identity ──────────────────────────────────────────────────────

/// Change identifier: a ULID, rendered as a 26-character sortable string.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChangeId(pub Ulid);

impl ChangeId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ChangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Lifecycle enums ───────────────────────────────────────────────

/// What part of the infrastructure a change touches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ChangeType {
    Firewall,
    Switch,
    #[serde(rename = "VLAN")]
    Vlan,
    Port,
    Rack,
    #[serde(rename = "CloudSG")]
    CloudSg,
}

/// The concrete operation a change performs. Each change type allows a
/// fixed subset (see [`ChangeAction::allowed_for`]).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    AddRule,
    RemoveRule,
    ModifyRule,
    DisableRule,
    ConfigChange,
    RebootDevice,
    FirmwareUpgrade,
    Decommission,
    DisablePort,
    EnablePort,
    ShutdownInterface,
    ChangeVlan,
    DeleteVlan,
    ModifyVlan,
    ModifySg,
    DeleteSg,
}

impl ChangeAction {
    /// The actions allowed for a change type.
    pub fn allowed_for(change_type: ChangeType) -> &'static [ChangeAction] {
        use ChangeAction::*;
        match change_type {
            ChangeType::Firewall => &[
                AddRule,
                RemoveRule,
                ModifyRule,
                DisableRule,
                ConfigChange,
                RebootDevice,
                FirmwareUpgrade,
                Decommission,
            ],
            ChangeType::Switch => &[
                DisablePort,
                EnablePort,
                ShutdownInterface,
                ChangeVlan,
                ConfigChange,
                RebootDevice,
                FirmwareUpgrade,
                Decommission,
            ],
            ChangeType::Vlan => &[ChangeVlan, DeleteVlan, ModifyVlan],
            ChangeType::Port => &[DisablePort, EnablePort, ShutdownInterface],
            ChangeType::Rack => &[Decommission, ConfigChange],
            ChangeType::CloudSg => &[ModifySg, DeleteSg],
        }
    }

    pub fn is_allowed_for(&self, change_type: ChangeType) -> bool {
        Self::allowed_for(change_type).contains(self)
    }
}

/// Lifecycle state of a change.
///
/// `Pending` denotes a submitted change awaiting analysis; `Analyzing`
/// denotes the post-analysis window where the change awaits its approval
/// quorum. Approval decisions are accepted in either state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ChangeStatus {
    Draft,
    Pending,
    Analyzing,
    Approved,
    Rejected,
    Executing,
    Completed,
    RolledBack,
}

impl ChangeStatus {
    /// Terminal states admit no further field edits, only audit linkage.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChangeStatus::Completed | ChangeStatus::RolledBack | ChangeStatus::Rejected
        )
    }
}

impl std::fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeStatus::Draft => "Draft",
            ChangeStatus::Pending => "Pending",
            ChangeStatus::Analyzing => "Analyzing",
            ChangeStatus::Approved => "Approved",
            ChangeStatus::Rejected => "Rejected",
            ChangeStatus::Executing => "Executing",
            ChangeStatus::Completed => "Completed",
            ChangeStatus::RolledBack => "RolledBack",
        };
        write!(f, "{s}")
    }
}

/// Qualitative risk band derived from the numeric score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Band boundaries: 0–30 low, 31–55 medium, 56–75 high, 76–100 critical.
    pub fn from_score(score: f64) -> Self {
        if score <= 30.0 {
            RiskLevel::Low
        } else if score <= 55.0 {
            RiskLevel::Medium
        } else if score <= 75.0 {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

// ── Change record ─────────────────────────────────────────────────

/// A proposed infrastructure change and everything computed about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
    pub id: ChangeId,
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
    pub status: ChangeStatus,
    pub risk_score: Option<f64>,
    pub risk_level: Option<RiskLevel>,
    pub reject_reason: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Frozen result of the last impact analysis. Non-null whenever the
    /// change has progressed past Pending.
    pub impact_snapshot: Option<ImpactSnapshot>,
}

impl Change {
    /// A fresh draft with the given authoring fields.
    pub fn draft(
        title: impl Into<String>,
        change_type: ChangeType,
        action: ChangeAction,
        environment: Environment,
        created_by: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ChangeId::new(),
            title: title.into(),
            change_type,
            action,
            environment,
            description: String::new(),
            execution_plan: String::new(),
            rollback_plan: None,
            maintenance_window_start: None,
            maintenance_window_end: None,
            target_components: Vec::new(),
            status: ChangeStatus::Draft,
            risk_score: None,
            risk_level: None,
            reject_reason: None,
            created_by: created_by.into(),
            created_at: now,
            updated_at: now,
            impact_snapshot: None,
        }
    }

    /// Whether a rollback plan is present and non-blank.
    pub fn has_rollback_plan(&self) -> bool {
        self.rollback_plan
            .as_deref()
            .map(|p| !p.trim().is_empty())
            .unwrap_or(false)
    }

    /// Whether `at` falls inside the maintenance window, with `grace`
    /// tolerance applied on both edges. A missing window is never inside.
    pub fn within_maintenance_window(&self, at: DateTime<Utc>, grace: chrono::Duration) -> bool {
        match (self.maintenance_window_start, self.maintenance_window_end) {
            (Some(start), Some(end)) => at >= start - grace && at <= end + grace,
            _ => false,
        }
    }
}

// ── Approvals ─────────────────────────────────────────────────────

/// Roles that can fulfil an approval slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ApprovalRole {
    Admin,
    NetworkLead,
    SecurityLead,
    #[serde(rename = "DCManager")]
    DcManager,
    Approver,
}

impl ApprovalRole {
    /// Escalation rank. Higher outranks lower when a policy doubles the
    /// "highest role" approval.
    pub fn rank(&self) -> u8 {
        match self {
            ApprovalRole::Admin => 5,
            ApprovalRole::SecurityLead => 4,
            ApprovalRole::NetworkLead => 3,
            ApprovalRole::DcManager => 2,
            ApprovalRole::Approver => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    /// Unresolved past `expires_at`; counts as Rejected for quorum purposes.
    Expired,
}

/// A role-targeted approval slot on a change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
    pub id: i64,
    pub change_id: ChangeId,
    pub role_required: ApprovalRole,
    pub status: ApprovalStatus,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
