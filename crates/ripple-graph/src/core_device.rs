//! Core-device recomputation.
//!
//! A device is "core" iff it lies on at least K distinct shortest paths
//! between critical applications and their serving devices. Serving devices
//! are found by walking DEPENDS_ON chains out of the application; the path
//! itself is the shortest route through the physical and protection layers
//! (every edge kind except DEPENDS_ON, which is the logical shortcut being
//! explained). Neighbor order is fixed by node id so the recomputation is
//! deterministic.

use std::collections::{HashMap, HashSet, VecDeque};

use ripple_core::types::{Criticality, EdgeKind, Node, NodeId, NodeKind};

use crate::snapshot::GraphSnapshot;

/// Rewrite every device's `is_core` flag in the working snapshot.
/// Returns how many devices ended up core.
pub(crate) fn mark_core_devices(working: &mut GraphSnapshot, k: usize) -> usize {
    let mut path_counts: HashMap<NodeId, usize> = HashMap::new();

    let critical_apps: Vec<NodeId> = working
        .nodes_of_kind(NodeKind::Application)
        .into_iter()
        .filter(|id| {
            matches!(
                working.node(id),
                Some(Node::Application(app)) if app.criticality == Criticality::Critical
            )
        })
        .cloned()
        .collect();

    for app in &critical_apps {
        for device in serving_devices(working, app) {
            let Some(path) = shortest_transit_path(working, app, &device) else {
                continue;
            };
            // Endpoints carry the dependency; only transit hops count.
            for hop in path.iter().skip(1).take(path.len().saturating_sub(2)) {
                if matches!(working.node(hop), Some(Node::Device(_))) {
                    *path_counts.entry(hop.clone()).or_insert(0) += 1;
                }
            }
        }
    }

    let device_ids: Vec<NodeId> = working
        .nodes_of_kind(NodeKind::Device)
        .into_iter()
        .cloned()
        .collect();

    let mut core_count = 0;
    for id in device_ids {
        let is_core = path_counts.get(&id).copied().unwrap_or(0) >= k;
        if is_core {
            core_count += 1;
        }
        if let Some(Node::Device(device)) = working.node(&id) {
            let mut updated = device.clone();
            updated.is_core = is_core;
            working.insert_node(Node::Device(updated));
        }
    }

    tracing::debug!(core_count, k, "Core device flags recomputed");
    core_count
}

/// Devices reachable from an application along DEPENDS_ON chains.
fn serving_devices(snapshot: &GraphSnapshot, app: &NodeId) -> Vec<NodeId> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from([app.clone()]);
    let mut devices = Vec::new();

    while let Some(current) = queue.pop_front() {
        let mut next: Vec<NodeId> = snapshot
            .out_neighbors(&current, EdgeKind::DependsOn)
            .into_iter()
            .cloned()
            .collect();
        next.sort();

        for neighbor in next {
            if !visited.insert(neighbor.clone()) {
                continue;
            }
            if matches!(snapshot.node(&neighbor), Some(Node::Device(_))) {
                devices.push(neighbor.clone());
            }
            queue.push_back(neighbor);
        }
    }

    devices.sort();
    devices
}

/// One shortest undirected path over non-DEPENDS_ON edges, or None if the
/// endpoints are disconnected at the transit layer.
fn shortest_transit_path(
    snapshot: &GraphSnapshot,
    from: &NodeId,
    to: &NodeId,
) -> Option<Vec<NodeId>> {
    if from == to {
        return Some(vec![from.clone()]);
    }

    let mut parents: HashMap<NodeId, NodeId> = HashMap::new();
    let mut visited: HashSet<NodeId> = HashSet::from([from.clone()]);
    let mut queue = VecDeque::from([from.clone()]);

    while let Some(current) = queue.pop_front() {
        let mut neighbors: Vec<NodeId> = snapshot
            .out(&current)
            .iter()
            .filter(|e| e.kind != EdgeKind::DependsOn)
            .map(|e| e.target.clone())
            .chain(
                snapshot
                    .incoming(&current)
                    .iter()
                    .filter(|e| e.kind != EdgeKind::DependsOn)
                    .map(|e| e.source.clone()),
            )
            .collect();
        neighbors.sort();
        neighbors.dedup();

        for neighbor in neighbors {
            if !visited.insert(neighbor.clone()) {
                continue;
            }
            parents.insert(neighbor.clone(), current.clone());
            if &neighbor == to {
                let mut path = vec![neighbor.clone()];
                let mut cursor = neighbor;
                while let Some(parent) = parents.get(&cursor) {
                    path.push(parent.clone());
                    cursor = parent.clone();
                }
                path.reverse();
                return Some(path);
            }
            queue.push_back(neighbor);
        }
    }

    None
}
