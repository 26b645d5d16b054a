//! The connector contract and the file-backed reference connector.
//!
//! Real device connectors (vendor APIs, cloud SDKs) live outside this core;
//! anything that can speak the four operations below can feed the graph.
//! The engine never reconfigures devices itself: `apply_change` delegates
//! the write and returns a receipt.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ripple_core::change::Change;
use ripple_graph::GraphMutation;

/// Outcome of a pre-flight validation on a device or cloud API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub ok: bool,
    pub reasons: Vec<String>,
}

/// What a connector predicts the change would do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub summary: String,
    pub details: serde_json::Value,
}

/// Proof that a change was pushed to the device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    pub receipt_id: Uuid,
    pub applied_at: DateTime<Utc>,
    pub detail: String,
}

/// A credentialed endpoint that can describe (and mutate) a slice of the
/// infrastructure.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Stable identifier, used for last-writer-wins attribution.
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    /// Pull the connector's current view as a mutation batch.
    async fn sync(&self) -> anyhow::Result<Vec<GraphMutation>>;

    /// Check whether the change is acceptable to the backing system.
    async fn validate_change(&self, change: &Change) -> anyhow::Result<ValidationOutcome>;

    /// Dry-run the change against the backing system.
    async fn simulate_change(&self, change: &Change) -> anyhow::Result<SimulationReport>;

    /// Push the change to the backing system.
    async fn apply_change(&self, change: &Change) -> anyhow::Result<ExecutionReceipt>;
}

/// Reference connector that serves mutations from a JSON file. Used by the
/// daemon binary and as the lab stand-in for device connectors.
pub struct FileConnector {
    id: String,
    name: String,
    path: std::path::PathBuf,
}

impl FileConnector {
    pub fn new(id: impl Into<String>, path: impl Into<std::path::PathBuf>) -> Self {
        let id = id.into();
        Self {
            name: format!("file:{id}"),
            id,
            path: path.into(),
        }
    }
}

#[async_trait]
impl Connector for FileConnector {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn sync(&self) -> anyhow::Result<Vec<GraphMutation>> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let mutations: Vec<GraphMutation> = serde_json::from_str(&raw)?;
        Ok(mutations)
    }

    async fn validate_change(&self, change: &Change) -> anyhow::Result<ValidationOutcome> {
        // A file has no opinion beyond structural plausibility.
        let ok = !change.target_components.is_empty();
        Ok(ValidationOutcome {
            ok,
            reasons: if ok {
                Vec::new()
            } else {
                vec!["change has no target components".to_string()]
            },
        })
    }

    async fn simulate_change(&self, change: &Change) -> anyhow::Result<SimulationReport> {
        Ok(SimulationReport {
            summary: format!(
                "{:?} {:?} against {} component(s)",
                change.change_type,
                change.action,
                change.target_components.len()
            ),
            details: serde_json::json!({
                "targets": change.target_components,
            }),
        })
    }

    async fn apply_change(&self, change: &Change) -> anyhow::Result<ExecutionReceipt> {
        Ok(ExecutionReceipt {
            receipt_id: Uuid::new_v4(),
            applied_at: Utc::now(),
            detail: format!("recorded {:?} for offline application", change.action),
        })
    }
}
