//! Layered BFS with deterministic tie-breaking and parent chains.
//!
//! The traversal expands one depth layer at a time. Within a layer, every
//! candidate parent for a newly discovered node is considered and the best
//! one wins: highest final-edge priority first (`DEPENDS_ON > PROTECTS >
//! CONNECTS_TO > HAS_* > others`), then lowest parent id. Shorter paths
//! always beat longer ones because a node is claimed by the first layer
//! that reaches it.

use std::collections::HashMap;

use ripple_core::impact::TraversalStrategy;
use ripple_core::types::EdgeKind;

use crate::error::{ImpactError, Result};
use crate::graph::{edge_priority, ImpactGraph};
use crate::strategy::step_allowed;
use crate::CancelToken;

/// Result of one BFS expansion.
pub struct Traversal {
    /// Discovery depth per node; roots are at 0, unvisited are None.
    pub depth: Vec<Option<usize>>,
    /// Winning parent link per node: (parent index, edge kind walked).
    pub parent: Vec<Option<(usize, EdgeKind)>>,
    /// Visited non-root nodes in discovery order.
    pub discovered: Vec<usize>,
}

impl Traversal {
    /// Reconstruct the root→node chain as (node indices, edge kinds).
    pub fn chain_to(&self, node: usize) -> (Vec<usize>, Vec<EdgeKind>) {
        let mut nodes = vec![node];
        let mut edges = Vec::new();
        let mut cursor = node;
        while let Some((parent, edge)) = self.parent[cursor] {
            nodes.push(parent);
            edges.push(edge);
            cursor = parent;
        }
        nodes.reverse();
        edges.reverse();
        (nodes, edges)
    }
}

/// Expand from `roots` under `strategy`, honoring the depth bound exactly:
/// no node beyond `max_depth` hops is ever reported.
pub fn traverse(
    graph: &ImpactGraph,
    roots: &[usize],
    strategy: TraversalStrategy,
    max_depth: usize,
    cancel: &CancelToken,
) -> Result<Traversal> {
    let n = graph.node_count();
    let mut depth: Vec<Option<usize>> = vec![None; n];
    let mut parent: Vec<Option<(usize, EdgeKind)>> = vec![None; n];
    let mut discovered = Vec::new();

    let mut frontier: Vec<usize> = roots.to_vec();
    frontier.sort();
    frontier.dedup();
    for &root in &frontier {
        depth[root] = Some(0);
    }

    let mut layer = 0;
    while !frontier.is_empty() && layer < max_depth {
        if cancel.is_canceled() {
            return Err(ImpactError::Canceled);
        }

        // Best candidate parent per node discovered in this layer.
        let mut candidates: HashMap<usize, (usize, EdgeKind)> = HashMap::new();
        for &node in &frontier {
            for link in &graph.links[node] {
                if depth[link.other].is_some() || !step_allowed(strategy, link) {
                    continue;
                }
                let incumbent = candidates.get(&link.other);
                let better = match incumbent {
                    None => true,
                    Some(&(cur_parent, cur_edge)) => {
                        let new_key = (edge_priority(link.edge), &graph.nodes[node].id);
                        let cur_key = (edge_priority(cur_edge), &graph.nodes[cur_parent].id);
                        new_key < cur_key
                    }
                };
                if better {
                    candidates.insert(link.other, (node, link.edge));
                }
            }
        }

        let mut next: Vec<usize> = candidates.keys().copied().collect();
        next.sort_by(|a, b| graph.nodes[*a].id.cmp(&graph.nodes[*b].id));

        layer += 1;
        for &node in &next {
            depth[node] = Some(layer);
            parent[node] = candidates.get(&node).copied();
            discovered.push(node);
        }
        frontier = next;
    }

    Ok(Traversal {
        depth,
        parent,
        discovered,
    })
}
