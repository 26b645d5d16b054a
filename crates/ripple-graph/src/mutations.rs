//! Mutation records and invariant enforcement.
//!
//! Every write to the graph is a tagged [`GraphMutation`]; unknown kinds are
//! rejected at the serde boundary. Mutations are validated against the
//! working snapshot as they apply, so a batch either lands whole or not at
//! all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ripple_core::types::{Edge, EdgeKind, Node, NodeId};

use crate::snapshot::GraphSnapshot;
use crate::GraphError;

/// A single write operation produced by a connector sync or the seed path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphMutation {
    UpsertNode {
        node: Node,
        observed_at: DateTime<Utc>,
    },
    UpsertEdge {
        edge: Edge,
    },
    Tombstone {
        id: NodeId,
        observed_at: DateTime<Utc>,
    },
}

impl GraphMutation {
    /// The node id a node-level mutation asserts, if any.
    pub fn node_id(&self) -> Option<&NodeId> {
        match self {
            GraphMutation::UpsertNode { node, .. } => Some(node.id()),
            GraphMutation::Tombstone { id, .. } => Some(id),
            GraphMutation::UpsertEdge { .. } => None,
        }
    }

    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            GraphMutation::UpsertNode { observed_at, .. }
            | GraphMutation::Tombstone { observed_at, .. } => Some(*observed_at),
            GraphMutation::UpsertEdge { .. } => None,
        }
    }
}

/// Apply one mutation to the working snapshot, enforcing graph invariants.
pub(crate) fn apply_one(
    working: &mut GraphSnapshot,
    mutation: &GraphMutation,
) -> Result<(), GraphError> {
    match mutation {
        GraphMutation::UpsertNode { node, .. } => upsert_node(working, node),
        GraphMutation::UpsertEdge { edge } => upsert_edge(working, edge),
        GraphMutation::Tombstone { id, .. } => {
            working.remove_node(id);
            Ok(())
        }
    }
}

fn upsert_node(working: &mut GraphSnapshot, node: &Node) -> Result<(), GraphError> {
    // Node ids are globally unique across kinds: an upsert may refresh a
    // node but never change what kind of thing the id names.
    if let Some(existing) = working.node(node.id()) {
        if existing.kind() != node.kind() {
            return Err(GraphError::InvariantViolation(format!(
                "node id {} already names a {:?}, cannot upsert as {:?}",
                node.id(),
                existing.kind(),
                node.kind()
            )));
        }
    }

    // A VLAN id is unique within an environment.
    if let Node::Vlan(vlan) = node {
        let clash = working
            .nodes_of_kind(ripple_core::types::NodeKind::Vlan)
            .into_iter()
            .filter(|id| *id != &vlan.id)
            .filter_map(|id| match working.node(id) {
                Some(Node::Vlan(other)) => Some(other),
                _ => None,
            })
            .any(|other| other.vlan_id == vlan.vlan_id && other.environment == vlan.environment);
        if clash {
            return Err(GraphError::InvariantViolation(format!(
                "VLAN id {} already exists in {:?}",
                vlan.vlan_id, vlan.environment
            )));
        }
    }

    working.insert_node(node.clone());
    Ok(())
}

fn upsert_edge(working: &mut GraphSnapshot, edge: &Edge) -> Result<(), GraphError> {
    // No dangling references.
    for endpoint in [&edge.source, &edge.target] {
        if !working.contains(endpoint) {
            return Err(GraphError::InvariantViolation(format!(
                "{} edge references missing node {}",
                edge.kind.as_str(),
                endpoint
            )));
        }
    }

    // A rule belongs to exactly one device, an interface to exactly one
    // device. Both are expressed as single-owner incoming edges.
    let single_owner = matches!(edge.kind, EdgeKind::HasRule | EdgeKind::HasInterface);
    if single_owner {
        let owned = working
            .in_neighbors(&edge.target, edge.kind)
            .into_iter()
            .any(|owner| owner != &edge.source);
        if owned {
            return Err(GraphError::InvariantViolation(format!(
                "{} already has a {} owner, cannot attach to {}",
                edge.target,
                edge.kind.as_str(),
                edge.source
            )));
        }
    }

    working.insert_edge(edge.clone());
    Ok(())
}
