//! Impact snapshot types produced by the analyzer and persisted on changes.

use serde::{Deserialize, Serialize};

use crate::change::ChangeAction;
use crate::types::{Criticality, DeviceKind, EdgeKind, NodeId, NodeKind};

/// How the analyzer selects what to explore from each target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TraversalStrategy {
    /// Additive rule change: newly reachable protected applications.
    RuleScope,
    /// Rule removal/modification: everything the rule protects, transitively.
    RuleScopeReverse,
    /// VLAN change: member interfaces, their devices, dependent applications.
    VlanFanout,
    /// Port/interface change: parent device, downstream neighbors, services.
    InterfaceFanout,
    /// Device-wide change: full blast radius up to the configured depth.
    DeviceBlast,
    /// Cloud security group change: protected workloads and their services.
    CloudSgScope,
    /// Bounded generic crawl for actions without a dedicated strategy.
    NeighborCrawl,
}

impl TraversalStrategy {
    /// Map a change action to its traversal strategy.
    pub fn for_action(action: ChangeAction) -> Self {
        use ChangeAction::*;
        match action {
            AddRule => TraversalStrategy::RuleScope,
            RemoveRule | DisableRule | ModifyRule => TraversalStrategy::RuleScopeReverse,
            DeleteVlan | ModifyVlan | ChangeVlan => TraversalStrategy::VlanFanout,
            DisablePort | EnablePort | ShutdownInterface => TraversalStrategy::InterfaceFanout,
            Decommission | RebootDevice | FirmwareUpgrade => TraversalStrategy::DeviceBlast,
            ModifySg | DeleteSg => TraversalStrategy::CloudSgScope,
            ConfigChange => TraversalStrategy::NeighborCrawl,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TraversalStrategy::RuleScope => "rule_scope",
            TraversalStrategy::RuleScopeReverse => "rule_scope_reverse",
            TraversalStrategy::VlanFanout => "vlan_fanout",
            TraversalStrategy::InterfaceFanout => "interface_fanout",
            TraversalStrategy::DeviceBlast => "device_blast",
            TraversalStrategy::CloudSgScope => "cloud_sg_scope",
            TraversalStrategy::NeighborCrawl => "neighbor_crawl",
        }
    }
}

/// A node touched by a change, as recorded in the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImpactedNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub criticality: Option<Criticality>,
    /// Hardware role when the node is a device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_kind: Option<DeviceKind>,
    /// Carried for devices so risk scoring stays a pure function of the
    /// snapshot.
    #[serde(default)]
    pub is_core: bool,
}

/// An application or service in the blast radius.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AffectedEndpoint {
    pub id: NodeId,
    pub kind: NodeKind,
    pub criticality: Criticality,
    /// True when the endpoint also has a dependency path that avoids every
    /// direct target, so the change degrades rather than severs it.
    pub redundancy_available: bool,
}

/// An ordered dependency path from a direct target to a high- or
/// critical-severity application or service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CriticalPath {
    pub source: NodeId,
    pub endpoint: NodeId,
    pub endpoint_kind: NodeKind,
    /// Maximum criticality among the nodes on the path.
    pub criticality: Criticality,
    pub hops: usize,
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeKind>,
    /// Best-effort narrative decoration. Never an input to scoring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// The frozen result of one impact analysis run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImpactSnapshot {
    pub directly_impacted: Vec<ImpactedNode>,
    pub indirectly_impacted: Vec<ImpactedNode>,
    pub affected_applications: Vec<AffectedEndpoint>,
    pub affected_services: Vec<AffectedEndpoint>,
    pub affected_vlans: Vec<ImpactedNode>,
    pub critical_paths: Vec<CriticalPath>,
    pub total_dependency_count: usize,
    pub max_criticality: Criticality,
    pub traversal_strategy: TraversalStrategy,
    /// True when any impacted rule has unrestricted source and destination.
    #[serde(default)]
    pub any_any_rule_involved: bool,
    /// Target ids that resolved to no graph node. Non-fatal; the ids were
    /// excluded and the remaining targets analyzed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_targets: Vec<NodeId>,
    /// Graph revision the analysis ran against.
    pub graph_revision: u64,
}

impl ImpactSnapshot {
    /// Whether every affected endpoint of at least `threshold` criticality
    /// has a redundant path around the direct targets.
    pub fn all_critical_redundant(&self, threshold: Criticality) -> bool {
        let critical: Vec<&AffectedEndpoint> = self
            .affected_applications
            .iter()
            .chain(self.affected_services.iter())
            .filter(|e| e.criticality >= threshold)
            .collect();
        !critical.is_empty() && critical.iter().all(|e| e.redundancy_available)
    }

    /// Distinct critical applications in the blast radius.
    pub fn critical_application_count(&self) -> usize {
        self.affected_applications
            .iter()
            .filter(|a| a.criticality == Criticality::Critical)
            .count()
    }
}
