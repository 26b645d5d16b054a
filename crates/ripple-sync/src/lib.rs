//! ripple-sync: connector contract and sync coordination.
//!
//! Connectors pull each backing system's view of the infrastructure as
//! [`ripple_graph::GraphMutation`] batches; the coordinator schedules them
//! through a bounded worker pool, retries transient failures with capped
//! exponential backoff, merges redundant triggers, resolves cross-connector
//! conflicts, and applies each cycle atomically to the graph store.

pub mod connector;
pub mod coordinator;
pub mod error;

pub use connector::{
    Connector, ExecutionReceipt, FileConnector, SimulationReport, ValidationOutcome,
};
pub use coordinator::{ConnectorHealth, ConnectorState, SyncCoordinator, SyncOutcome};
pub use error::SyncError;
