//! Dense in-memory projection of a graph snapshot.
//!
//! Converts the store's id-keyed snapshot into a compact adjacency list
//! optimized for traversal. Nodes get dense indices in id order and each
//! node's links are pre-sorted by tie-break priority, which makes every
//! traversal over the same snapshot deterministic.

use std::collections::HashMap;

use ripple_core::types::{Criticality, DeviceKind, EdgeKind, Node, NodeId, NodeKind};
use ripple_graph::GraphSnapshot;

/// Compact node metadata used during traversal and scoring.
#[derive(Debug, Clone)]
pub struct NodeMeta {
    /// Dense index (0..N-1).
    pub index: usize,
    pub id: NodeId,
    pub kind: NodeKind,
    pub criticality: Option<Criticality>,
    pub device_kind: Option<DeviceKind>,
    pub is_core: bool,
    pub is_any_any: bool,
}

/// One traversable link. `outbound` is true when the underlying edge points
/// away from the node holding this link.
#[derive(Debug, Clone, Copy)]
pub struct Link {
    pub edge: EdgeKind,
    pub other: usize,
    pub outbound: bool,
}

/// The dense graph for one snapshot revision.
pub struct ImpactGraph {
    pub nodes: Vec<NodeMeta>,
    pub links: Vec<Vec<Link>>,
    pub index: HashMap<NodeId, usize>,
    pub revision: u64,
}

/// Tie-break priority of a path's final edge: lower wins.
/// `DEPENDS_ON > PROTECTS > CONNECTS_TO > HAS_* > others`.
pub fn edge_priority(kind: EdgeKind) -> u8 {
    match kind {
        EdgeKind::DependsOn => 0,
        EdgeKind::Protects => 1,
        EdgeKind::ConnectsTo => 2,
        EdgeKind::HasInterface | EdgeKind::HasVlan | EdgeKind::HasRule => 3,
        _ => 4,
    }
}

impl ImpactGraph {
    pub fn from_snapshot(snapshot: &GraphSnapshot) -> Self {
        let mut ids: Vec<&NodeId> = Vec::with_capacity(snapshot.node_count());
        for kind in [
            NodeKind::Device,
            NodeKind::Interface,
            NodeKind::Port,
            NodeKind::Vlan,
            NodeKind::Ip,
            NodeKind::Rule,
            NodeKind::Application,
            NodeKind::Service,
            NodeKind::Datacenter,
            NodeKind::Cable,
        ] {
            ids.extend(snapshot.nodes_of_kind(kind));
        }
        ids.sort();

        let mut index = HashMap::with_capacity(ids.len());
        let mut nodes = Vec::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            let node = snapshot.node(id).expect("kind index lists existing nodes");
            index.insert((*id).clone(), i);
            nodes.push(meta_for(i, node));
        }

        let mut links: Vec<Vec<Link>> = vec![Vec::new(); nodes.len()];
        for node in &nodes {
            for edge in snapshot.out(&node.id) {
                if let Some(&target) = index.get(&edge.target) {
                    links[node.index].push(Link {
                        edge: edge.kind,
                        other: target,
                        outbound: true,
                    });
                }
            }
            for edge in snapshot.incoming(&node.id) {
                if let Some(&source) = index.get(&edge.source) {
                    links[node.index].push(Link {
                        edge: edge.kind,
                        other: source,
                        outbound: false,
                    });
                }
            }
        }

        for node_links in links.iter_mut() {
            node_links.sort_by(|a, b| {
                edge_priority(a.edge)
                    .cmp(&edge_priority(b.edge))
                    .then_with(|| nodes[a.other].id.cmp(&nodes[b.other].id))
            });
        }

        Self {
            nodes,
            links,
            index,
            revision: snapshot.revision(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Resolve target ids into dense indices, splitting off the unknowns.
    pub fn resolve(&self, targets: &[NodeId]) -> (Vec<usize>, Vec<NodeId>) {
        let mut resolved = Vec::new();
        let mut unknown = Vec::new();
        for target in targets {
            match self.index.get(target) {
                Some(&i) if !resolved.contains(&i) => resolved.push(i),
                Some(_) => {}
                None => unknown.push(target.clone()),
            }
        }
        resolved.sort();
        unknown.sort();
        (resolved, unknown)
    }
}

fn meta_for(index: usize, node: &Node) -> NodeMeta {
    let (device_kind, is_core) = match node {
        Node::Device(d) => (Some(d.kind), d.is_core),
        _ => (None, false),
    };
    let is_any_any = matches!(node, Node::Rule(r) if r.is_any_any);

    NodeMeta {
        index,
        id: node.id().clone(),
        kind: node.kind(),
        criticality: node.criticality(),
        device_kind,
        is_core,
        is_any_any,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ripple_core::types::{Application, Edge, Environment, Rule, Vlan};
    use ripple_graph::{GraphMutation, GraphStore};

    fn store_with_three_nodes() -> GraphStore {
        let store = GraphStore::new();
        store
            .apply(&[
                GraphMutation::UpsertNode {
                    node: Node::Application(Application {
                        id: NodeId::new("APP-A"),
                        name: "a".to_string(),
                        criticality: Criticality::Critical,
                    }),
                    observed_at: Utc::now(),
                },
                GraphMutation::UpsertNode {
                    node: Node::Rule(Rule {
                        id: NodeId::new("RULE-1"),
                        src: "any".to_string(),
                        dst: "any".to_string(),
                        service: "any".to_string(),
                        action: "allow".to_string(),
                        is_any_any: true,
                    }),
                    observed_at: Utc::now(),
                },
                GraphMutation::UpsertNode {
                    node: Node::Vlan(Vlan {
                        id: NodeId::new("VLAN-20"),
                        vlan_id: 20,
                        environment: Environment::Prod,
                        name: "prod".to_string(),
                    }),
                    observed_at: Utc::now(),
                },
                GraphMutation::UpsertEdge {
                    edge: Edge::new(EdgeKind::Protects, "RULE-1", "APP-A"),
                },
            ])
            .unwrap();
        store
    }

    #[test]
    fn projection_is_id_ordered_and_indexed() {
        let store = store_with_three_nodes();
        let graph = ImpactGraph::from_snapshot(&store.snapshot());

        assert_eq!(graph.node_count(), 3);
        let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["APP-A", "RULE-1", "VLAN-20"]);
        assert_eq!(graph.index.get(&NodeId::new("RULE-1")), Some(&1));
        assert!(graph.nodes[1].is_any_any);
        assert_eq!(graph.nodes[0].criticality, Some(Criticality::Critical));
    }

    #[test]
    fn links_cover_both_directions() {
        let store = store_with_three_nodes();
        let graph = ImpactGraph::from_snapshot(&store.snapshot());

        let rule = graph.index[&NodeId::new("RULE-1")];
        let app = graph.index[&NodeId::new("APP-A")];
        assert!(graph.links[rule]
            .iter()
            .any(|l| l.other == app && l.outbound));
        assert!(graph.links[app]
            .iter()
            .any(|l| l.other == rule && !l.outbound));
    }

    #[test]
    fn resolve_splits_unknown_targets() {
        let store = store_with_three_nodes();
        let graph = ImpactGraph::from_snapshot(&store.snapshot());

        let (resolved, unknown) = graph.resolve(&[
            NodeId::new("APP-A"),
            NodeId::new("GHOST-1"),
            NodeId::new("APP-A"),
        ]);
        assert_eq!(resolved.len(), 1);
        assert_eq!(unknown, vec![NodeId::new("GHOST-1")]);
    }

    #[test]
    fn edge_priority_order() {
        assert!(edge_priority(EdgeKind::DependsOn) < edge_priority(EdgeKind::Protects));
        assert!(edge_priority(EdgeKind::Protects) < edge_priority(EdgeKind::ConnectsTo));
        assert!(edge_priority(EdgeKind::ConnectsTo) < edge_priority(EdgeKind::HasRule));
        assert!(edge_priority(EdgeKind::HasRule) < edge_priority(EdgeKind::LocatedIn));
    }
}
