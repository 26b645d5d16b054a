//! Error types for the ripple-sync crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Connector sync failed after {attempt} attempt(s): {cause}")]
    Failed { attempt: u32, cause: String },

    #[error("Connector not found: {0}")]
    UnknownConnector(String),

    #[error("Graph error: {0}")]
    Graph(#[from] ripple_graph::GraphError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
