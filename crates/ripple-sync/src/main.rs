//! CLI entry point for the ripple sync daemon.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use ripple_audit::InMemoryJournal;
use ripple_core::config::Settings;
use ripple_graph::{seed::seed_demo_topology, GraphStore};
use ripple_sync::{Connector, FileConnector, SyncCoordinator};

#[derive(Parser)]
#[command(name = "ripple-sync")]
#[command(about = "Topology sync daemon for the ripple change intelligence engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: ripple).
    #[arg(short, long, default_value = "ripple")]
    config: String,
}

#[derive(Subcommand)]
enum Command {
    /// Seed the demo topology and print a summary.
    Seed,
    /// Run a single sync cycle from a mutation file and exit.
    Sync {
        /// Path to a JSON file holding a mutation batch.
        #[arg(long)]
        file: String,
        /// Connector id used for conflict attribution.
        #[arg(long, default_value = "file-1")]
        connector_id: String,
    },
    /// Run as daemon, re-reading mutation files on an interval.
    Daemon {
        /// Mutation files, one connector each.
        #[arg(long, required = true)]
        file: Vec<String>,
        /// Sync interval in seconds.
        #[arg(long, default_value_t = 300)]
        interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let cli = Cli::parse();
    let settings = Arc::new(Settings::load(&cli.config)?);
    let graph = GraphStore::new();
    let journal = Arc::new(InMemoryJournal::new());

    match cli.command {
        Command::Seed => {
            let summary = seed_demo_topology(&graph, settings.core_device_k)?;
            println!(
                "{}",
                serde_json::json!({
                    "nodes": summary.nodes,
                    "edges": summary.edges,
                    "core_devices": summary.core_devices,
                    "revision": summary.revision,
                })
            );
        }
        Command::Sync { file, connector_id } => {
            let connector: Arc<dyn Connector> = Arc::new(FileConnector::new(connector_id, file));
            let id = connector.id().to_string();
            let coordinator = SyncCoordinator::new(
                graph.clone(),
                journal,
                settings,
                vec![(connector, 3600)],
            );
            let outcome = coordinator.sync_now(&id).await?;
            tracing::info!(?outcome, "Sync cycle finished");
        }
        Command::Daemon {
            file,
            interval_secs,
        } => {
            let connectors: Vec<(Arc<dyn Connector>, u64)> = file
                .iter()
                .enumerate()
                .map(|(i, path)| {
                    let connector: Arc<dyn Connector> =
                        Arc::new(FileConnector::new(format!("file-{}", i + 1), path));
                    (connector, interval_secs)
                })
                .collect();
            let coordinator = Arc::new(SyncCoordinator::new(
                graph.clone(),
                journal,
                settings,
                connectors,
            ));
            coordinator.run().await;
        }
    }

    Ok(())
}
