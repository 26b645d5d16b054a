//! ripple-graph: the topology store.
//!
//! Holds the infrastructure digital twin as immutable snapshots behind an
//! atomically swapped `Arc`. Readers grab a snapshot and keep it for the
//! length of a pipeline; writers build the next revision off to the side and
//! swap it in, so readers never block writers and an in-flight analysis is
//! insulated from concurrent syncs.
//!
//! All mutations arrive as [`GraphMutation`] batches (from the sync
//! coordinator or the administrative seed) and are validated against the
//! graph invariants before the swap; a failing batch leaves the graph
//! untouched.

pub mod core_device;
pub mod mutations;
pub mod seed;
pub mod snapshot;

pub use mutations::GraphMutation;
pub use snapshot::GraphSnapshot;

use std::sync::{Arc, RwLock};

use ripple_core::types::NodeId;

/// Errors from graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Graph invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Node not found: {0}")]
    NotFound(NodeId),
}

/// Thread-safe topology store. Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct GraphStore {
    current: Arc<RwLock<Arc<GraphSnapshot>>>,
}

impl GraphStore {
    /// An empty graph at revision 0.
    pub fn new() -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(GraphSnapshot::empty()))),
        }
    }

    /// The current snapshot. Cheap; the caller holds the revision for as
    /// long as it needs consistent reads.
    pub fn snapshot(&self) -> Arc<GraphSnapshot> {
        self.current.read().expect("graph lock poisoned").clone()
    }

    /// Current revision number.
    pub fn revision(&self) -> u64 {
        self.snapshot().revision()
    }

    /// Apply a mutation batch atomically and return the new revision.
    ///
    /// The batch is validated against a working copy; on any invariant
    /// violation the error is returned and the published snapshot is
    /// unchanged. An empty batch is a no-op and returns the current
    /// revision without bumping it.
    pub fn apply(&self, batch: &[GraphMutation]) -> Result<u64, GraphError> {
        if batch.is_empty() {
            return Ok(self.revision());
        }

        let mut guard = self.current.write().expect("graph lock poisoned");
        let mut working = GraphSnapshot::clone_contents(&guard);

        for mutation in batch {
            mutations::apply_one(&mut working, mutation)?;
        }

        working.bump_revision(guard.revision() + 1);
        let revision = working.revision();
        *guard = Arc::new(working);

        tracing::debug!(revision, mutation_count = batch.len(), "Graph batch applied");
        Ok(revision)
    }

    /// Recompute every device's `is_core` flag and publish a new revision.
    ///
    /// A device is core iff it lies on at least `k` distinct shortest paths
    /// between critical applications and their serving devices. Returns the
    /// number of core devices.
    pub fn recompute_core_devices(&self, k: usize) -> usize {
        let mut guard = self.current.write().expect("graph lock poisoned");
        let mut working = GraphSnapshot::clone_contents(&guard);
        let core_count = core_device::mark_core_devices(&mut working, k);
        working.bump_revision(guard.revision() + 1);
        *guard = Arc::new(working);
        core_count
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}
