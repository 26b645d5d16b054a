//! Approval derivation.
//!
//! The base slate comes from the risk level; change shape adds specialist
//! roles; a double-approval policy verdict duplicates the highest-ranked
//! slot. Duplicates are intentional where listed (critical changes always
//! carry two SecurityLead slots).

use ripple_core::change::{ApprovalRole, Change, ChangeAction, ChangeType, RiskLevel};
use ripple_core::impact::ImpactSnapshot;
use ripple_core::types::{DeviceKind, NodeKind};
use ripple_risk::PolicyVerdict;

/// The ordered approval slots a change must fill.
pub fn derive_roles(
    level: RiskLevel,
    change: &Change,
    impact: &ImpactSnapshot,
    verdict: PolicyVerdict,
) -> Vec<ApprovalRole> {
    let mut roles: Vec<ApprovalRole> = match level {
        RiskLevel::Low | RiskLevel::Medium => vec![ApprovalRole::Approver],
        RiskLevel::High => vec![ApprovalRole::NetworkLead, ApprovalRole::Approver],
        RiskLevel::Critical => vec![
            ApprovalRole::Admin,
            ApprovalRole::SecurityLead,
            ApprovalRole::SecurityLead,
        ],
    };

    let direct_switch_or_router = impact.directly_impacted.iter().any(|n| {
        matches!(
            n.device_kind,
            Some(DeviceKind::Switch) | Some(DeviceKind::Router)
        )
    });
    if direct_switch_or_router && !roles.contains(&ApprovalRole::NetworkLead) {
        roles.push(ApprovalRole::NetworkLead);
    }

    let firewall_involved = change.change_type == ChangeType::Firewall
        || impact.any_any_rule_involved
        || impact
            .directly_impacted
            .iter()
            .chain(impact.indirectly_impacted.iter())
            .any(|n| n.kind == NodeKind::Rule);
    if firewall_involved && !roles.contains(&ApprovalRole::SecurityLead) {
        roles.push(ApprovalRole::SecurityLead);
    }

    if change.action == ChangeAction::Decommission && !roles.contains(&ApprovalRole::DcManager) {
        roles.push(ApprovalRole::DcManager);
    }

    if verdict == PolicyVerdict::RequireDoubleApproval {
        if let Some(&highest) = roles.iter().max_by_key(|r| r.rank()) {
            roles.push(highest);
        }
    }

    roles
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ripple_core::change::ChangeAction;
    use ripple_core::impact::{ImpactedNode, TraversalStrategy};
    use ripple_core::types::{Criticality, Environment, NodeId};

    fn impact() -> ImpactSnapshot {
        ImpactSnapshot {
            directly_impacted: Vec::new(),
            indirectly_impacted: Vec::new(),
            affected_applications: Vec::new(),
            affected_services: Vec::new(),
            affected_vlans: Vec::new(),
            critical_paths: Vec::new(),
            total_dependency_count: 0,
            max_criticality: Criticality::Low,
            traversal_strategy: TraversalStrategy::DeviceBlast,
            any_any_rule_involved: false,
            unknown_targets: Vec::new(),
            graph_revision: 1,
        }
    }

    fn device_target(id: &str, kind: DeviceKind) -> ImpactedNode {
        ImpactedNode {
            id: NodeId::new(id),
            kind: NodeKind::Device,
            criticality: Some(Criticality::High),
            device_kind: Some(kind),
            is_core: false,
        }
    }

    fn change(change_type: ChangeType, action: ChangeAction) -> Change {
        Change::draft("t", change_type, action, Environment::Prod, "alice", Utc::now())
    }

    fn count(roles: &[ApprovalRole], role: ApprovalRole) -> usize {
        roles.iter().filter(|r| **r == role).count()
    }

    #[test]
    fn low_risk_gets_single_approver() {
        let c = change(ChangeType::Vlan, ChangeAction::ModifyVlan);
        let roles = derive_roles(RiskLevel::Low, &c, &impact(), PolicyVerdict::Ignore);
        assert_eq!(roles, vec![ApprovalRole::Approver]);
    }

    #[test]
    fn critical_firewall_decommission_slate() {
        let c = change(ChangeType::Firewall, ChangeAction::Decommission);
        let mut imp = impact();
        imp.directly_impacted = vec![device_target("FW-DC1-01", DeviceKind::Firewall)];

        let roles = derive_roles(RiskLevel::Critical, &c, &imp, PolicyVerdict::Ignore);
        assert_eq!(count(&roles, ApprovalRole::Admin), 1);
        assert_eq!(count(&roles, ApprovalRole::SecurityLead), 2);
        assert_eq!(count(&roles, ApprovalRole::DcManager), 1);
    }

    #[test]
    fn switch_target_adds_network_lead() {
        let c = change(ChangeType::Switch, ChangeAction::RebootDevice);
        let mut imp = impact();
        imp.directly_impacted = vec![device_target("SW-1", DeviceKind::Switch)];

        let roles = derive_roles(RiskLevel::Medium, &c, &imp, PolicyVerdict::Ignore);
        assert_eq!(count(&roles, ApprovalRole::NetworkLead), 1);
        // High risk already carries NetworkLead; no duplicate.
        let high = derive_roles(RiskLevel::High, &c, &imp, PolicyVerdict::Ignore);
        assert_eq!(count(&high, ApprovalRole::NetworkLead), 1);
    }

    #[test]
    fn any_any_involvement_adds_security_lead() {
        let c = change(ChangeType::CloudSg, ChangeAction::ModifySg);
        let mut imp = impact();
        imp.any_any_rule_involved = true;
        let roles = derive_roles(RiskLevel::Medium, &c, &imp, PolicyVerdict::Ignore);
        assert_eq!(count(&roles, ApprovalRole::SecurityLead), 1);
    }

    #[test]
    fn double_approval_duplicates_highest_role() {
        let c = change(ChangeType::Firewall, ChangeAction::ModifyRule);
        let roles = derive_roles(
            RiskLevel::Critical,
            &c,
            &impact(),
            PolicyVerdict::RequireDoubleApproval,
        );
        // Admin outranks SecurityLead and gets the extra slot.
        assert_eq!(count(&roles, ApprovalRole::Admin), 2);

        let medium = derive_roles(
            RiskLevel::Medium,
            &c,
            &impact(),
            PolicyVerdict::RequireDoubleApproval,
        );
        // Firewall adds SecurityLead; it outranks Approver and doubles.
        assert_eq!(count(&medium, ApprovalRole::SecurityLead), 2);
        assert_eq!(count(&medium, ApprovalRole::Approver), 1);
    }
}
