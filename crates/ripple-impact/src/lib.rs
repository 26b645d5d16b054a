//! ripple-impact: action-aware impact analysis.
//!
//! Projects a graph snapshot into a dense in-memory form, expands from the
//! change's targets under a per-action traversal strategy, and produces the
//! frozen [`ImpactSnapshot`] the risk engine and workflow consume: direct
//! and indirect sets, typed roll-ups with redundancy flags, and critical
//! paths with deterministic tie-breaking.

pub mod error;
pub mod graph;
pub mod redundancy;
pub mod strategy;
pub mod traversal;

pub use error::ImpactError;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ripple_core::change::ChangeAction;
use ripple_core::config::Settings;
use ripple_core::impact::{
    AffectedEndpoint, CriticalPath, ImpactSnapshot, ImpactedNode, TraversalStrategy,
};
use ripple_core::types::{Criticality, NodeId, NodeKind};
use ripple_graph::GraphSnapshot;

use crate::graph::{ImpactGraph, NodeMeta};
use crate::traversal::Traversal;

/// Depth bound used when expanding dependency branches for redundancy.
const REDUNDANCY_DEPTH: usize = 4;

/// Cooperative cancellation for an in-flight analysis. An edit that
/// invalidates the analysis flips the flag; the traversal aborts at the
/// next layer boundary.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Optional narrative decoration for critical paths. The engine is fully
/// functional without one; narratives never feed scoring or workflow
/// decisions.
pub trait Narrator: Send + Sync {
    fn annotate(&self, path: &CriticalPath) -> Option<String>;
}

/// The impact analysis engine.
pub struct ImpactAnalyzer {
    settings: Arc<Settings>,
    narrator: Option<Arc<dyn Narrator>>,
}

impl ImpactAnalyzer {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self {
            settings,
            narrator: None,
        }
    }

    /// Attach a narrative generator.
    pub fn with_narrator(mut self, narrator: Arc<dyn Narrator>) -> Self {
        self.narrator = Some(narrator);
        self
    }

    /// Analyze a change against one graph snapshot.
    ///
    /// Targets that resolve to no node are excluded and reported on the
    /// snapshot; an empty or fully unresolvable target set is an error.
    /// The same snapshot and inputs always produce the identical snapshot.
    pub fn analyze(
        &self,
        snapshot: &GraphSnapshot,
        targets: &[NodeId],
        action: ChangeAction,
        cancel: &CancelToken,
    ) -> Result<ImpactSnapshot, ImpactError> {
        if targets.is_empty() {
            return Err(ImpactError::EmptyTargets);
        }

        let graph = ImpactGraph::from_snapshot(snapshot);
        let (roots, unknown_targets) = graph.resolve(targets);
        if roots.is_empty() {
            return Err(ImpactError::EmptyTargets);
        }
        if !unknown_targets.is_empty() {
            tracing::warn!(
                unknown = ?unknown_targets.iter().map(NodeId::as_str).collect::<Vec<_>>(),
                "Unknown targets excluded from impact analysis"
            );
        }

        let strategy = TraversalStrategy::for_action(action);
        let max_depth = self.settings.max_depth(strategy);
        let walk = traversal::traverse(&graph, &roots, strategy, max_depth, cancel)?;

        // An additive rule change has no direct casualties; everything it
        // reaches is new exposure, classified indirect.
        let direct_metas: Vec<&NodeMeta> = if strategy == TraversalStrategy::RuleScope {
            Vec::new()
        } else {
            roots.iter().map(|&i| &graph.nodes[i]).collect()
        };
        let indirect_metas: Vec<&NodeMeta> =
            walk.discovered.iter().map(|&i| &graph.nodes[i]).collect();

        let direct_ids: HashSet<NodeId> = roots.iter().map(|&i| graph.nodes[i].id.clone()).collect();

        let mut directly_impacted: Vec<ImpactedNode> =
            direct_metas.iter().copied().map(impacted).collect();
        let mut indirectly_impacted: Vec<ImpactedNode> =
            indirect_metas.iter().copied().map(impacted).collect();

        let mut affected_applications = Vec::new();
        let mut affected_services = Vec::new();
        let mut affected_vlans = Vec::new();
        for &meta in &indirect_metas {
            match meta.kind {
                NodeKind::Application | NodeKind::Service => {
                    let endpoint = AffectedEndpoint {
                        id: meta.id.clone(),
                        kind: meta.kind,
                        criticality: meta.criticality.unwrap_or_default(),
                        redundancy_available: redundancy::redundancy_available(
                            snapshot,
                            &meta.id,
                            &direct_ids,
                            REDUNDANCY_DEPTH,
                        ),
                    };
                    if meta.kind == NodeKind::Application {
                        affected_applications.push(endpoint);
                    } else {
                        affected_services.push(endpoint);
                    }
                }
                NodeKind::Vlan => affected_vlans.push(impacted(meta)),
                _ => {}
            }
        }

        let critical_paths = self.collect_critical_paths(&graph, &walk);

        let any_any_rule_involved = direct_metas
            .iter()
            .chain(indirect_metas.iter())
            .any(|m| m.is_any_any);

        let max_criticality = direct_metas
            .iter()
            .chain(indirect_metas.iter())
            .filter_map(|m| m.criticality)
            .max()
            .unwrap_or_default();

        directly_impacted.sort_by(|a, b| a.id.cmp(&b.id));
        indirectly_impacted.sort_by(|a, b| a.id.cmp(&b.id));
        affected_applications.sort_by(|a, b| a.id.cmp(&b.id));
        affected_services.sort_by(|a, b| a.id.cmp(&b.id));
        affected_vlans.sort_by(|a, b| a.id.cmp(&b.id));

        let total_dependency_count = directly_impacted.len() + indirectly_impacted.len();

        tracing::info!(
            strategy = strategy.as_str(),
            direct = directly_impacted.len(),
            indirect = indirectly_impacted.len(),
            applications = affected_applications.len(),
            services = affected_services.len(),
            critical_paths = critical_paths.len(),
            revision = graph.revision,
            "Impact analysis complete"
        );

        Ok(ImpactSnapshot {
            directly_impacted,
            indirectly_impacted,
            affected_applications,
            affected_services,
            affected_vlans,
            critical_paths,
            total_dependency_count,
            max_criticality,
            traversal_strategy: strategy,
            any_any_rule_involved,
            unknown_targets,
            graph_revision: graph.revision,
        })
    }

    /// A critical path is recorded for every discovered node of high or
    /// critical severity: the BFS parent chain from its root target, with
    /// the traversed edge kinds retained. Paths are ordered by severity,
    /// then length, then endpoint id.
    fn collect_critical_paths(&self, graph: &ImpactGraph, walk: &Traversal) -> Vec<CriticalPath> {
        let mut paths = Vec::new();

        for &node in &walk.discovered {
            let meta = &graph.nodes[node];
            if !matches!(
                meta.criticality,
                Some(Criticality::High) | Some(Criticality::Critical)
            ) {
                continue;
            }

            let (chain, edges) = walk.chain_to(node);
            let criticality = chain
                .iter()
                .filter_map(|&i| graph.nodes[i].criticality)
                .max()
                .unwrap_or_default();

            let mut path = CriticalPath {
                source: graph.nodes[chain[0]].id.clone(),
                endpoint: meta.id.clone(),
                endpoint_kind: meta.kind,
                criticality,
                hops: edges.len(),
                nodes: chain.iter().map(|&i| graph.nodes[i].id.clone()).collect(),
                edges,
                reasoning: None,
            };
            if let Some(narrator) = &self.narrator {
                path.reasoning = narrator.annotate(&path);
            }
            paths.push(path);
        }

        paths.sort_by(|a, b| {
            b.criticality
                .cmp(&a.criticality)
                .then_with(|| a.hops.cmp(&b.hops))
                .then_with(|| a.endpoint.cmp(&b.endpoint))
        });
        paths
    }
}

fn impacted(meta: &NodeMeta) -> ImpactedNode {
    ImpactedNode {
        id: meta.id.clone(),
        kind: meta.kind,
        criticality: meta.criticality,
        device_kind: meta.device_kind,
        is_core: meta.is_core,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_graph::seed::seed_demo_topology;
    use ripple_graph::GraphStore;

    fn analyzer() -> ImpactAnalyzer {
        ImpactAnalyzer::new(Arc::new(Settings::default()))
    }

    fn seeded() -> GraphStore {
        let store = GraphStore::new();
        seed_demo_topology(&store, 2).unwrap();
        store
    }

    #[test]
    fn decommission_primary_firewall_blasts_critical_apps() {
        let store = seeded();
        let snap = store.snapshot();
        let result = analyzer()
            .analyze(
                &snap,
                &[NodeId::new("FW-DC1-01")],
                ChangeAction::Decommission,
                &CancelToken::new(),
            )
            .unwrap();

        assert_eq!(result.traversal_strategy, TraversalStrategy::DeviceBlast);
        assert_eq!(result.directly_impacted.len(), 1);
        assert_eq!(result.directly_impacted[0].id, NodeId::new("FW-DC1-01"));
        assert!(result.directly_impacted[0].is_core);
        assert!(result.affected_applications.len() >= 3);
        assert_eq!(result.max_criticality, Criticality::Critical);
        assert!(!result.any_any_rule_involved);
        assert!(!result.critical_paths.is_empty());

        // The three single-homed critical apps have no redundancy.
        for app in ["APP-PAYMENTS", "APP-TRADING", "APP-CRM"] {
            let endpoint = result
                .affected_applications
                .iter()
                .find(|a| a.id == NodeId::new(app))
                .unwrap();
            assert!(!endpoint.redundancy_available, "{app} should not be redundant");
        }
    }

    #[test]
    fn delete_production_vlan_fans_out_to_member_devices() {
        let store = seeded();
        let snap = store.snapshot();
        let result = analyzer()
            .analyze(
                &snap,
                &[NodeId::new("VLAN-20")],
                ChangeAction::DeleteVlan,
                &CancelToken::new(),
            )
            .unwrap();

        assert_eq!(result.traversal_strategy, TraversalStrategy::VlanFanout);
        assert_eq!(result.directly_impacted.len(), 1);
        let indirect_ids: Vec<&str> = result
            .indirectly_impacted
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        for device in ["SW-DC1-CORE", "SW-DC1-ACC-01", "SW-DC1-ACC-02"] {
            assert!(indirect_ids.contains(&device), "missing {device}");
        }
        // Seven member interfaces plus three devices.
        assert!(result.total_dependency_count > 10);
    }

    #[test]
    fn add_rule_is_additive_with_empty_direct_set() {
        let store = seeded();
        let snap = store.snapshot();
        let result = analyzer()
            .analyze(
                &snap,
                &[NodeId::new("FW-DC1-02")],
                ChangeAction::AddRule,
                &CancelToken::new(),
            )
            .unwrap();

        assert_eq!(result.traversal_strategy, TraversalStrategy::RuleScope);
        assert!(result.directly_impacted.is_empty());
        assert!(!result.indirectly_impacted.is_empty());
        assert!(result
            .affected_applications
            .iter()
            .any(|a| a.id == NodeId::new("APP-HR")));
        // Direct and indirect sets stay disjoint even for additive changes.
        assert!(result
            .indirectly_impacted
            .iter()
            .all(|n| n.id != NodeId::new("FW-DC1-02")));
    }

    #[test]
    fn unknown_targets_are_excluded_with_warning() {
        let store = seeded();
        let snap = store.snapshot();
        let result = analyzer()
            .analyze(
                &snap,
                &[NodeId::new("FW-DC1-01"), NodeId::new("FW-GHOST-99")],
                ChangeAction::RebootDevice,
                &CancelToken::new(),
            )
            .unwrap();

        assert_eq!(result.unknown_targets, vec![NodeId::new("FW-GHOST-99")]);
        assert_eq!(result.directly_impacted.len(), 1);
    }

    #[test]
    fn fully_unresolvable_targets_error() {
        let store = seeded();
        let snap = store.snapshot();
        let result = analyzer().analyze(
            &snap,
            &[NodeId::new("FW-GHOST-99")],
            ChangeAction::RebootDevice,
            &CancelToken::new(),
        );
        assert!(matches!(result, Err(ImpactError::EmptyTargets)));

        let empty = analyzer().analyze(&snap, &[], ChangeAction::RebootDevice, &CancelToken::new());
        assert!(matches!(empty, Err(ImpactError::EmptyTargets)));
    }

    #[test]
    fn reanalysis_on_same_snapshot_is_byte_identical() {
        let store = seeded();
        let snap = store.snapshot();
        let run = || {
            analyzer()
                .analyze(
                    &snap,
                    &[NodeId::new("FW-DC1-01")],
                    ChangeAction::Decommission,
                    &CancelToken::new(),
                )
                .unwrap()
        };
        let first = run();
        let second = run();
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[test]
    fn direct_and_indirect_sets_are_disjoint() {
        let store = seeded();
        let snap = store.snapshot();
        for (target, action) in [
            ("FW-DC1-01", ChangeAction::Decommission),
            ("VLAN-20", ChangeAction::DeleteVlan),
            ("IF-SW-DC1-ACC-01-gi01", ChangeAction::ShutdownInterface),
            ("SW-DC1-CORE", ChangeAction::ConfigChange),
        ] {
            let result = analyzer()
                .analyze(&snap, &[NodeId::new(target)], action, &CancelToken::new())
                .unwrap();
            let direct: HashSet<&NodeId> =
                result.directly_impacted.iter().map(|n| &n.id).collect();
            assert!(
                result
                    .indirectly_impacted
                    .iter()
                    .all(|n| !direct.contains(&n.id)),
                "overlap for {target}"
            );
        }
    }

    #[test]
    fn critical_paths_are_ordered_and_deduplicated() {
        let store = seeded();
        let snap = store.snapshot();
        let result = analyzer()
            .analyze(
                &snap,
                &[NodeId::new("FW-DC1-01")],
                ChangeAction::Decommission,
                &CancelToken::new(),
            )
            .unwrap();

        // One path per endpoint, ordered by severity then hops.
        let mut endpoints = HashSet::new();
        for path in &result.critical_paths {
            assert!(endpoints.insert(path.endpoint.clone()), "duplicate endpoint");
            assert_eq!(path.nodes.len(), path.hops + 1);
            assert_eq!(path.edges.len(), path.hops);
            assert_eq!(path.source, NodeId::new("FW-DC1-01"));
        }
        for pair in result.critical_paths.windows(2) {
            assert!(pair[0].criticality >= pair[1].criticality);
        }
    }

    struct StubNarrator;

    impl Narrator for StubNarrator {
        fn annotate(&self, path: &CriticalPath) -> Option<String> {
            Some(format!("{} hops to {}", path.hops, path.endpoint))
        }
    }

    #[test]
    fn narrator_decorates_without_changing_structure() {
        let store = seeded();
        let snap = store.snapshot();
        let plain = analyzer()
            .analyze(
                &snap,
                &[NodeId::new("FW-DC1-01")],
                ChangeAction::Decommission,
                &CancelToken::new(),
            )
            .unwrap();
        let narrated = ImpactAnalyzer::new(Arc::new(Settings::default()))
            .with_narrator(Arc::new(StubNarrator))
            .analyze(
                &snap,
                &[NodeId::new("FW-DC1-01")],
                ChangeAction::Decommission,
                &CancelToken::new(),
            )
            .unwrap();

        assert_eq!(plain.critical_paths.len(), narrated.critical_paths.len());
        assert!(narrated.critical_paths.iter().all(|p| p.reasoning.is_some()));
        assert!(plain.critical_paths.iter().all(|p| p.reasoning.is_none()));
    }
}
