//! The sync coordinator.
//!
//! Runs one job per connector through a bounded worker pool, retries with
//! capped exponential backoff, merges concurrent sync-now triggers for the
//! same connector, and resolves cross-connector write conflicts with
//! per-node last-writer-wins before applying each cycle atomically to the
//! graph store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::Semaphore;
use tokio::time::{interval, timeout, Duration};

use ripple_audit::{AuditAction, InMemoryJournal, Journal};
use ripple_core::config::Settings;
use ripple_core::types::NodeId;
use ripple_graph::{GraphMutation, GraphStore};

use crate::connector::Connector;
use crate::error::{Result, SyncError};

/// Connector health as surfaced to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorHealth {
    Unknown,
    Active,
    Error,
}

/// Mutable bookkeeping per connector.
#[derive(Debug, Clone)]
pub struct ConnectorState {
    pub health: ConnectorHealth,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Outcome of a sync trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The cycle ran; `accepted` mutations survived conflict resolution.
    Completed { accepted: usize, revision: u64 },
    /// A run was already in flight; this trigger was merged into a
    /// follow-up run.
    Coalesced,
}

struct ConnectorEntry {
    connector: Arc<dyn Connector>,
    interval_secs: u64,
    state: Mutex<ConnectorState>,
    running: AtomicBool,
    pending: AtomicBool,
}

pub struct SyncCoordinator {
    graph: GraphStore,
    journal: Arc<InMemoryJournal>,
    settings: Arc<Settings>,
    workers: Arc<Semaphore>,
    entries: Vec<Arc<ConnectorEntry>>,
    /// node id → (connector id → newest observed_at). Tombstones only apply
    /// to nodes no other connector still asserts.
    assertions: Mutex<HashMap<NodeId, HashMap<String, DateTime<Utc>>>>,
}

impl SyncCoordinator {
    pub fn new(
        graph: GraphStore,
        journal: Arc<InMemoryJournal>,
        settings: Arc<Settings>,
        connectors: Vec<(Arc<dyn Connector>, u64)>,
    ) -> Self {
        let width = connectors.len().clamp(1, settings.sync_pool_cap);
        let entries = connectors
            .into_iter()
            .map(|(connector, interval_secs)| {
                Arc::new(ConnectorEntry {
                    connector,
                    interval_secs,
                    state: Mutex::new(ConnectorState {
                        health: ConnectorHealth::Unknown,
                        last_sync_at: None,
                        last_error: None,
                    }),
                    running: AtomicBool::new(false),
                    pending: AtomicBool::new(false),
                })
            })
            .collect();

        Self {
            graph,
            journal,
            settings,
            workers: Arc::new(Semaphore::new(width)),
            entries,
            assertions: Mutex::new(HashMap::new()),
        }
    }

    pub fn state_of(&self, connector_id: &str) -> Option<ConnectorState> {
        self.entry(connector_id)
            .map(|e| e.state.lock().expect("connector state poisoned").clone())
    }

    fn entry(&self, connector_id: &str) -> Option<&Arc<ConnectorEntry>> {
        self.entries
            .iter()
            .find(|e| e.connector.id() == connector_id)
    }

    /// Trigger a sync for one connector now. Triggers while a run is in
    /// flight are merged into a single follow-up run.
    pub async fn sync_now(&self, connector_id: &str) -> Result<SyncOutcome> {
        let entry = self
            .entry(connector_id)
            .ok_or_else(|| SyncError::UnknownConnector(connector_id.to_string()))?
            .clone();

        if entry.running.swap(true, Ordering::SeqCst) {
            entry.pending.store(true, Ordering::SeqCst);
            tracing::debug!(connector = connector_id, "Sync trigger coalesced");
            return Ok(SyncOutcome::Coalesced);
        }

        let result = self.run_until_drained(&entry).await;
        entry.running.store(false, Ordering::SeqCst);
        result
    }

    /// Run one cycle, then drain any trigger that arrived meanwhile.
    async fn run_until_drained(&self, entry: &Arc<ConnectorEntry>) -> Result<SyncOutcome> {
        let mut outcome = self.run_cycle(entry).await?;
        while entry.pending.swap(false, Ordering::SeqCst) {
            outcome = self.run_cycle(entry).await?;
        }
        Ok(outcome)
    }

    /// One sync cycle with retry and backoff. Applies the accepted
    /// mutations transactionally and refreshes core-device flags.
    async fn run_cycle(&self, entry: &Arc<ConnectorEntry>) -> Result<SyncOutcome> {
        let _permit = self
            .workers
            .acquire()
            .await
            .expect("worker semaphore closed");
        let connector_id = entry.connector.id().to_string();
        let job_timeout = Duration::from_secs(self.settings.sync_job_timeout_seconds);

        let max_attempts = self.settings.sync_retry_max.max(1);
        for attempt in 1..=max_attempts {
            let pulled = match timeout(job_timeout, entry.connector.sync()).await {
                Ok(Ok(mutations)) => Ok(mutations),
                Ok(Err(source)) => Err(source.to_string()),
                Err(_) => Err(format!(
                    "sync timed out after {}s",
                    self.settings.sync_job_timeout_seconds
                )),
            };

            match pulled {
                Ok(mutations) => {
                    let outcome = self.apply_cycle(&connector_id, mutations)?;
                    let now = Utc::now();
                    {
                        let mut state = entry.state.lock().expect("connector state poisoned");
                        state.health = ConnectorHealth::Active;
                        state.last_sync_at = Some(now);
                        state.last_error = None;
                    }
                    if let SyncOutcome::Completed { accepted, revision } = &outcome {
                        self.journal.append(
                            None,
                            None,
                            AuditAction::SyncCompleted,
                            json!({
                                "connector": connector_id,
                                "accepted": accepted,
                                "revision": revision,
                                "attempt": attempt,
                            }),
                        );
                        tracing::info!(
                            connector = %connector_id,
                            accepted,
                            revision,
                            attempt,
                            "Sync cycle complete"
                        );
                    }
                    return Ok(outcome);
                }
                Err(cause) => {
                    self.journal.append(
                        None,
                        None,
                        AuditAction::SyncFailed,
                        json!({"connector": connector_id, "attempt": attempt, "cause": cause}),
                    );
                    tracing::warn!(
                        connector = %connector_id,
                        attempt,
                        cause = %cause,
                        "Sync attempt failed"
                    );

                    if attempt == max_attempts {
                        let mut state = entry.state.lock().expect("connector state poisoned");
                        state.health = ConnectorHealth::Error;
                        state.last_error = Some(cause.clone());
                        return Err(SyncError::Failed {
                            attempt,
                            cause,
                        });
                    }

                    tokio::time::sleep(self.backoff(attempt)).await;
                }
            }
        }

        unreachable!("retry loop returns on success or final failure")
    }

    /// Capped exponential backoff: base × 2^(attempt−1), bounded by the cap.
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.settings.sync_retry_base_seconds;
        let cap = self.settings.sync_retry_cap_seconds;
        let delay = base.saturating_mul(1u64 << (attempt - 1).min(32));
        Duration::from_secs(delay.min(cap))
    }

    /// Resolve conflicts and apply. Within a cycle, per-node writes follow
    /// last-writer-wins on `(connector_id, node_id, observed_at)`; a
    /// tombstone lands only when no other connector still asserts the node.
    fn apply_cycle(
        &self,
        connector_id: &str,
        mutations: Vec<GraphMutation>,
    ) -> Result<SyncOutcome> {
        let mut assertions = self.assertions.lock().expect("assertion table poisoned");
        let mut accepted: Vec<GraphMutation> = Vec::new();

        for mutation in mutations {
            match &mutation {
                GraphMutation::UpsertNode { node, observed_at } => {
                    let per_node = assertions.entry(node.id().clone()).or_default();
                    let newest_other = per_node
                        .iter()
                        .filter(|(owner, _)| owner.as_str() != connector_id)
                        .map(|(_, at)| *at)
                        .max();
                    if newest_other.map_or(true, |other| *observed_at >= other) {
                        accepted.push(mutation.clone());
                    }
                    per_node.insert(connector_id.to_string(), *observed_at);
                }
                GraphMutation::Tombstone { id, .. } => {
                    let still_asserted = match assertions.get_mut(id) {
                        Some(per_node) => {
                            per_node.remove(connector_id);
                            !per_node.is_empty()
                        }
                        None => false,
                    };
                    if still_asserted {
                        tracing::debug!(
                            connector = connector_id,
                            node = %id,
                            "Tombstone skipped: node asserted by another connector"
                        );
                    } else {
                        assertions.remove(id);
                        accepted.push(mutation.clone());
                    }
                }
                GraphMutation::UpsertEdge { .. } => accepted.push(mutation.clone()),
            }
        }
        drop(assertions);

        // An empty cycle is a no-op on the store.
        if accepted.is_empty() {
            return Ok(SyncOutcome::Completed {
                accepted: 0,
                revision: self.graph.revision(),
            });
        }

        let accepted_count = accepted.len();
        self.graph.apply(&accepted)?;
        self.graph.recompute_core_devices(self.settings.core_device_k);
        Ok(SyncOutcome::Completed {
            accepted: accepted_count,
            revision: self.graph.revision(),
        })
    }

    /// Run the daemon: one periodic loop per connector. Blocks until all
    /// loops end (effectively forever).
    pub async fn run(self: Arc<Self>) {
        let mut handles = Vec::new();
        for entry in &self.entries {
            let coordinator = self.clone();
            let connector_id = entry.connector.id().to_string();
            let every = entry.interval_secs;
            let handle = tokio::spawn(async move {
                let mut ticker = interval(Duration::from_secs(every.max(1)));
                loop {
                    ticker.tick().await;
                    if let Err(e) = coordinator.sync_now(&connector_id).await {
                        tracing::error!(connector = %connector_id, error = %e, "Scheduled sync failed");
                    }
                }
            });
            handles.push(handle);
        }

        tracing::info!(connector_count = handles.len(), "Sync coordinator started");

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Connector sync task panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    use ripple_core::change::Change;
    use ripple_core::types::{Environment, Node, NodeId, Vlan};

    use crate::connector::{ExecutionReceipt, SimulationReport, ValidationOutcome};

    fn vlan_node(id: &str, vlan_id: u16, observed_at: DateTime<Utc>) -> GraphMutation {
        GraphMutation::UpsertNode {
            node: Node::Vlan(Vlan {
                id: NodeId::new(id),
                vlan_id,
                environment: Environment::Preprod,
                name: format!("vlan-{vlan_id}"),
            }),
            observed_at,
        }
    }

    /// Scripted connector: a queue of canned results, then steady state.
    struct ScriptedConnector {
        id: String,
        script: Mutex<Vec<std::result::Result<Vec<GraphMutation>, String>>>,
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedConnector {
        fn new(id: &str, script: Vec<std::result::Result<Vec<GraphMutation>, String>>) -> Self {
            Self {
                id: id.to_string(),
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
                gate: None,
            }
        }

        fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        fn id(&self) -> &str {
            &self.id
        }

        fn name(&self) -> &str {
            &self.id
        }

        async fn sync(&self) -> anyhow::Result<Vec<GraphMutation>> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().expect("script poisoned").pop();
            match next {
                Some(Ok(mutations)) => Ok(mutations),
                Some(Err(cause)) => Err(anyhow::anyhow!(cause)),
                None => Ok(Vec::new()),
            }
        }

        async fn validate_change(&self, _change: &Change) -> anyhow::Result<ValidationOutcome> {
            Ok(ValidationOutcome {
                ok: true,
                reasons: Vec::new(),
            })
        }

        async fn simulate_change(&self, _change: &Change) -> anyhow::Result<SimulationReport> {
            Ok(SimulationReport {
                summary: String::new(),
                details: serde_json::Value::Null,
            })
        }

        async fn apply_change(&self, _change: &Change) -> anyhow::Result<ExecutionReceipt> {
            Ok(ExecutionReceipt {
                receipt_id: uuid::Uuid::new_v4(),
                applied_at: Utc::now(),
                detail: String::new(),
            })
        }
    }

    fn fast_settings() -> Arc<Settings> {
        Arc::new(Settings {
            sync_retry_base_seconds: 0,
            sync_retry_max: 8,
            sync_job_timeout_seconds: 5,
            ..Settings::default()
        })
    }

    fn coordinator_with(
        connectors: Vec<Arc<dyn Connector>>,
        settings: Arc<Settings>,
    ) -> (SyncCoordinator, GraphStore, Arc<InMemoryJournal>) {
        let graph = GraphStore::new();
        let journal = Arc::new(InMemoryJournal::new());
        let coordinator = SyncCoordinator::new(
            graph.clone(),
            journal.clone(),
            settings,
            connectors.into_iter().map(|c| (c, 3600)).collect(),
        );
        (coordinator, graph, journal)
    }

    #[tokio::test]
    async fn transient_failures_recover_within_budget() {
        // Scenario: three transient errors, then a good pull.
        let script = vec![
            Ok(vec![vlan_node("VLAN-77", 77, Utc::now())]),
            Err("connection reset".to_string()),
            Err("connection reset".to_string()),
            Err("connection reset".to_string()),
        ];
        let connector = Arc::new(ScriptedConnector::new("flaky", script));
        let (coordinator, graph, journal) =
            coordinator_with(vec![connector.clone()], fast_settings());

        let outcome = coordinator.sync_now("flaky").await.unwrap();
        assert!(matches!(outcome, SyncOutcome::Completed { accepted: 1, .. }));
        assert_eq!(connector.calls(), 4);
        assert!(graph.snapshot().node(&NodeId::new("VLAN-77")).is_some());

        let state = coordinator.state_of("flaky").unwrap();
        assert_eq!(state.health, ConnectorHealth::Active);
        assert!(state.last_error.is_none());

        let failures = journal.entries(&ripple_audit::AuditQuery {
            action: Some(AuditAction::SyncFailed),
            ..Default::default()
        });
        let completions = journal.entries(&ripple_audit::AuditQuery {
            action: Some(AuditAction::SyncCompleted),
            ..Default::default()
        });
        assert_eq!(failures.len(), 3);
        assert_eq!(completions.len(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_error_health() {
        let settings = Arc::new(Settings {
            sync_retry_base_seconds: 0,
            sync_retry_max: 2,
            sync_job_timeout_seconds: 5,
            ..Settings::default()
        });
        let script = vec![
            Err("auth failure".to_string()),
            Err("auth failure".to_string()),
        ];
        let connector = Arc::new(ScriptedConnector::new("dead", script));
        let (coordinator, _graph, _journal) = coordinator_with(vec![connector], settings);

        let result = coordinator.sync_now("dead").await;
        assert!(matches!(result, Err(SyncError::Failed { attempt: 2, .. })));
        let state = coordinator.state_of("dead").unwrap();
        assert_eq!(state.health, ConnectorHealth::Error);
        assert!(state.last_error.is_some());
    }

    #[tokio::test]
    async fn empty_sync_is_a_noop_on_the_store() {
        let connector = Arc::new(ScriptedConnector::new("idle", vec![Ok(Vec::new())]));
        let (coordinator, graph, _journal) = coordinator_with(vec![connector], fast_settings());

        let before = graph.revision();
        let outcome = coordinator.sync_now("idle").await.unwrap();
        assert_eq!(
            outcome,
            SyncOutcome::Completed {
                accepted: 0,
                revision: before,
            }
        );
        assert_eq!(graph.revision(), before);
    }

    #[tokio::test]
    async fn last_writer_wins_across_connectors() {
        let older = Utc::now() - chrono::Duration::minutes(10);
        let newer = Utc::now();

        let first = Arc::new(ScriptedConnector::new(
            "first",
            vec![Ok(vec![vlan_node("VLAN-50", 50, newer)])],
        ));
        let second = Arc::new(ScriptedConnector::new(
            "second",
            vec![Ok(vec![GraphMutation::UpsertNode {
                node: Node::Vlan(Vlan {
                    id: NodeId::new("VLAN-50"),
                    vlan_id: 50,
                    environment: Environment::Preprod,
                    name: "stale-name".to_string(),
                }),
                observed_at: older,
            }])],
        ));

        let (coordinator, graph, _journal) =
            coordinator_with(vec![first, second], fast_settings());

        coordinator.sync_now("first").await.unwrap();
        coordinator.sync_now("second").await.unwrap();

        // The stale observation lost; the first connector's name stands.
        match graph.snapshot().node(&NodeId::new("VLAN-50")) {
            Some(Node::Vlan(v)) => assert_eq!(v.name, "vlan-50"),
            other => panic!("unexpected node: {other:?}"),
        }
    }

    #[tokio::test]
    async fn tombstone_defers_to_other_asserters() {
        let now = Utc::now();
        let keeper = Arc::new(ScriptedConnector::new(
            "keeper",
            vec![Ok(vec![vlan_node("VLAN-60", 60, now)])],
        ));
        let remover = Arc::new(ScriptedConnector::new(
            "remover",
            vec![
                // Second run: tombstone after dropping its own assertion.
                Ok(vec![GraphMutation::Tombstone {
                    id: NodeId::new("VLAN-60"),
                    observed_at: now,
                }]),
                // First run: this connector also asserts the node.
                Ok(vec![vlan_node("VLAN-60", 60, now)]),
            ],
        ));

        let (coordinator, graph, _journal) =
            coordinator_with(vec![keeper, remover], fast_settings());

        coordinator.sync_now("keeper").await.unwrap();
        coordinator.sync_now("remover").await.unwrap();

        // Tombstone from `remover` must not delete a node `keeper` asserts.
        coordinator.sync_now("remover").await.unwrap();
        assert!(graph.snapshot().node(&NodeId::new("VLAN-60")).is_some());
    }

    #[tokio::test]
    async fn concurrent_triggers_coalesce_into_one_followup() {
        let gate = Arc::new(Notify::new());
        let connector = Arc::new(
            ScriptedConnector::new("slow", vec![Ok(Vec::new()), Ok(Vec::new())])
                .gated(gate.clone()),
        );
        let (coordinator, _graph, _journal) =
            coordinator_with(vec![connector.clone()], fast_settings());
        let coordinator = Arc::new(coordinator);

        let background = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.sync_now("slow").await })
        };

        // Let the first run park inside sync(), then pile on triggers.
        tokio::task::yield_now().await;
        assert_eq!(
            coordinator.sync_now("slow").await.unwrap(),
            SyncOutcome::Coalesced
        );
        assert_eq!(
            coordinator.sync_now("slow").await.unwrap(),
            SyncOutcome::Coalesced
        );

        // Release the first run and the single merged follow-up.
        gate.notify_one();
        gate.notify_one();
        background.await.unwrap().unwrap();

        // Two runs total: the original and one merged follow-up.
        assert_eq!(connector.calls(), 2);
    }
}
