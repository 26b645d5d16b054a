//! Per-strategy traversal rules: which edge kinds may be followed, and in
//! which direction, while expanding from a change's targets.

use ripple_core::impact::TraversalStrategy;
use ripple_core::types::EdgeKind;

use crate::graph::Link;

/// Whether a link may be taken under the given strategy.
///
/// Direction is relative to the node being expanded: `outbound` links follow
/// the edge source→target, inbound links walk it in reverse (e.g. from a
/// VLAN back to its `MEMBER_OF` interfaces).
pub fn step_allowed(strategy: TraversalStrategy, link: &Link) -> bool {
    use EdgeKind::*;
    use TraversalStrategy::*;

    match strategy {
        // Device → HAS_RULE → rule → PROTECTS → application → its services.
        RuleScope => matches!(
            (link.edge, link.outbound),
            (HasRule, true) | (Protects, true) | (DependsOn, true)
        ),
        // Rule (or hosting device) → protected endpoints → transitive
        // dependencies in both directions.
        RuleScopeReverse => matches!(
            (link.edge, link.outbound),
            (HasRule, true) | (Protects, true) | (DependsOn, _)
        ),
        // VLAN → member interfaces → parent devices → dependent workloads.
        VlanFanout => matches!(
            (link.edge, link.outbound),
            (MemberOf, false)
                | (HasVlan, false)
                | (PartOf, true)
                | (HasInterface, false)
                | (DependsOn, false)
        ),
        // Interface/Port → parent device → connected neighbors → dependents.
        InterfaceFanout => matches!(
            (link.edge, link.outbound),
            (PartOf, true)
                | (HasInterface, false)
                | (AssignedTo, false)
                | (ConnectsTo, _)
                | (DependsOn, false)
        ),
        // Device-wide blast: everything attached plus the fabric.
        DeviceBlast => matches!(
            (link.edge, link.outbound),
            (HasInterface, true)
                | (HasRule, true)
                | (HasVlan, true)
                | (PartOf, false)
                | (AssignedTo, false)
                | (MemberOf, true)
                | (ConnectsTo, _)
                | (RoutesTo, _)
                | (Protects, true)
                | (DependsOn, _)
        ),
        // Security group → protected workloads → dependent services.
        CloudSgScope => matches!(
            (link.edge, link.outbound),
            (HasRule, true) | (Protects, true) | (DependsOn, _)
        ),
        // Undirected crawl over every edge kind.
        NeighborCrawl => true,
    }
}
