//! Immutable snapshot of the topology at one revision.
//!
//! Nodes refer to each other by id only; relationships live in the
//! adjacency maps. Kind indexes support the labeled queries the analyzer
//! and the core-device recomputation rely on.

use std::collections::HashMap;

use ripple_core::types::{Edge, EdgeKind, Node, NodeId, NodeKind};

/// A consistent view of the graph at a single revision.
#[derive(Debug, Clone)]
pub struct GraphSnapshot {
    revision: u64,
    nodes: HashMap<NodeId, Node>,
    out_edges: HashMap<NodeId, Vec<Edge>>,
    in_edges: HashMap<NodeId, Vec<Edge>>,
    by_kind: HashMap<NodeKind, Vec<NodeId>>,
}

impl GraphSnapshot {
    pub fn empty() -> Self {
        Self {
            revision: 0,
            nodes: HashMap::new(),
            out_edges: HashMap::new(),
            in_edges: HashMap::new(),
            by_kind: HashMap::new(),
        }
    }

    /// Deep copy of the contents, used as the working state for the next
    /// revision.
    pub fn clone_contents(other: &GraphSnapshot) -> Self {
        other.clone()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn bump_revision(&mut self, revision: u64) {
        self.revision = revision;
    }

    // ── Lookups ──────────────────────────────────────────────────

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.out_edges.values().map(Vec::len).sum()
    }

    /// Ids of all nodes with the given label, sorted for determinism.
    pub fn nodes_of_kind(&self, kind: NodeKind) -> Vec<&NodeId> {
        let mut ids: Vec<&NodeId> = self
            .by_kind
            .get(&kind)
            .map(|v| v.iter().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Outgoing edges from a node.
    pub fn out(&self, id: &NodeId) -> &[Edge] {
        self.out_edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Incoming edges into a node.
    pub fn incoming(&self, id: &NodeId) -> &[Edge] {
        self.in_edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All edges, source-keyed order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.out_edges.values().flatten()
    }

    /// Outgoing neighbors reached over a specific edge kind.
    pub fn out_neighbors(&self, id: &NodeId, kind: EdgeKind) -> Vec<&NodeId> {
        self.out(id)
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| &e.target)
            .collect()
    }

    /// Incoming neighbors over a specific edge kind.
    pub fn in_neighbors(&self, id: &NodeId, kind: EdgeKind) -> Vec<&NodeId> {
        self.incoming(id)
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| &e.source)
            .collect()
    }

    // ── Mutation primitives (crate-internal; batches go through apply) ──

    pub(crate) fn insert_node(&mut self, node: Node) {
        let id = node.id().clone();
        let kind = node.kind();
        if let Some(previous) = self.nodes.insert(id.clone(), node) {
            // Replacing a node of the same kind keeps the kind index intact.
            debug_assert_eq!(previous.kind(), kind);
        } else {
            self.by_kind.entry(kind).or_default().push(id);
        }
    }

    pub(crate) fn insert_edge(&mut self, edge: Edge) {
        // Duplicate (kind, source, target) upserts replace in place.
        let outgoing = self.out_edges.entry(edge.source.clone()).or_default();
        if let Some(existing) = outgoing
            .iter_mut()
            .find(|e| e.kind == edge.kind && e.target == edge.target)
        {
            *existing = edge.clone();
        } else {
            outgoing.push(edge.clone());
        }

        let incoming = self.in_edges.entry(edge.target.clone()).or_default();
        if let Some(existing) = incoming
            .iter_mut()
            .find(|e| e.kind == edge.kind && e.source == edge.source)
        {
            *existing = edge;
        } else {
            incoming.push(edge);
        }
    }

    pub(crate) fn remove_node(&mut self, id: &NodeId) {
        let Some(node) = self.nodes.remove(id) else {
            return;
        };
        if let Some(ids) = self.by_kind.get_mut(&node.kind()) {
            ids.retain(|n| n != id);
        }

        // Detach every edge touching the node so no dangling endpoint
        // survives the tombstone.
        for edge in self.out_edges.remove(id).unwrap_or_default() {
            if let Some(incoming) = self.in_edges.get_mut(&edge.target) {
                incoming.retain(|e| e.source != *id);
            }
        }
        for edge in self.in_edges.remove(id).unwrap_or_default() {
            if let Some(outgoing) = self.out_edges.get_mut(&edge.source) {
                outgoing.retain(|e| e.target != *id);
            }
        }
    }
}
