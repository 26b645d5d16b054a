//! Redundancy detection for affected applications and services.
//!
//! An endpoint is marked `redundancy_available` when its dependency
//! attachments demonstrate an alternative to the impacted infrastructure:
//! the endpoint reaches a direct target through one attachment (the tainted
//! branch) and also owns a clean attachment that reaches a replacement of
//! the same kind — another firewall for a lost firewall, another protecting
//! rule for a removed rule. When the impact never flows through the
//! endpoint's own dependency chains (e.g. a VLAN deletion severing the
//! underlay), no redundancy claim is made.

use std::collections::{HashSet, VecDeque};

use ripple_core::types::{DeviceKind, EdgeKind, Node, NodeId, NodeKind};
use ripple_graph::GraphSnapshot;

/// Kind signature used to match a lost dependency against a surviving one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Signature {
    Device(DeviceKind),
    Other(NodeKind),
}

fn signature_of(snapshot: &GraphSnapshot, id: &NodeId) -> Option<Signature> {
    match snapshot.node(id)? {
        Node::Device(d) => Some(Signature::Device(d.kind)),
        node => Some(Signature::Other(node.kind())),
    }
}

/// Decide redundancy for one affected endpoint given the direct target set.
pub(crate) fn redundancy_available(
    snapshot: &GraphSnapshot,
    endpoint: &NodeId,
    direct: &HashSet<NodeId>,
    depth_limit: usize,
) -> bool {
    let branches = attachment_branches(snapshot, endpoint, depth_limit);
    if branches.is_empty() {
        return false;
    }

    // Signatures of every direct target that some branch runs through.
    let mut lost: HashSet<Signature> = HashSet::new();
    let mut clean_branches: Vec<&HashSet<NodeId>> = Vec::new();
    for branch in &branches {
        let tainted: Vec<&NodeId> = branch.iter().filter(|n| direct.contains(*n)).collect();
        if tainted.is_empty() {
            clean_branches.push(branch);
        } else {
            for target in tainted {
                if let Some(sig) = signature_of(snapshot, target) {
                    lost.insert(sig);
                }
            }
        }
    }

    if lost.is_empty() || clean_branches.is_empty() {
        return false;
    }

    // Every lost dependency kind must have a surviving counterpart.
    lost.iter().all(|needed| {
        clean_branches.iter().any(|branch| {
            branch
                .iter()
                .any(|n| signature_of(snapshot, n) == Some(*needed))
        })
    })
}

/// One branch per dependency attachment of the endpoint: each outgoing
/// DEPENDS_ON edge and each incoming PROTECTS edge, expanded transitively
/// over the dependency layer (DEPENDS_ON forward, PROTECTS and HAS_RULE
/// backward to the owning device).
fn attachment_branches(
    snapshot: &GraphSnapshot,
    endpoint: &NodeId,
    depth_limit: usize,
) -> Vec<HashSet<NodeId>> {
    let mut roots: Vec<NodeId> = snapshot
        .out_neighbors(endpoint, EdgeKind::DependsOn)
        .into_iter()
        .cloned()
        .collect();
    roots.extend(
        snapshot
            .in_neighbors(endpoint, EdgeKind::Protects)
            .into_iter()
            .cloned(),
    );
    roots.sort();
    roots.dedup();

    roots
        .into_iter()
        .map(|root| expand_branch(snapshot, endpoint, root, depth_limit))
        .collect()
}

fn expand_branch(
    snapshot: &GraphSnapshot,
    endpoint: &NodeId,
    root: NodeId,
    depth_limit: usize,
) -> HashSet<NodeId> {
    let mut seen: HashSet<NodeId> = HashSet::from([root.clone()]);
    let mut queue: VecDeque<(NodeId, usize)> = VecDeque::from([(root, 0)]);

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= depth_limit {
            continue;
        }
        let next = snapshot
            .out_neighbors(&current, EdgeKind::DependsOn)
            .into_iter()
            .chain(snapshot.in_neighbors(&current, EdgeKind::Protects))
            .chain(snapshot.in_neighbors(&current, EdgeKind::HasRule))
            .cloned()
            .collect::<Vec<_>>();
        for neighbor in next {
            if neighbor == *endpoint || !seen.insert(neighbor.clone()) {
                continue;
            }
            queue.push_back((neighbor, depth + 1));
        }
    }

    seen
}
