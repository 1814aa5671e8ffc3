//! monguardd — the monguard daemon.
//!
//! Runs the mon health checker for one cluster against the local backends:
//! - Endpoint store (redb)
//! - In-memory workload manager with workload-derived quorum status
//! - Node-inventory scheduler
//!
//! # Usage
//!
//! ```text
//! monguardd run --config /etc/monguard/monguard.toml
//! monguardd simulate --config monguard.toml --passes 3 --stop b
//! monguardd show --data-dir /var/lib/monguard --namespace storage
//! ```

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::{Mutex, watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use monguard_health::{HealthChecker, OperatorOverrides};
use monguard_reconcile::local::{InMemoryWorkloads, InventoryScheduler, WorkloadQuorum};
use monguard_reconcile::{Backends, MonCluster, WorkloadManager, resource_name};
use monguard_state::{ConfigStore, RedbConfigStore};

use crate::config::DaemonConfig;

const DEFAULT_LOG_FILTER: &str = "info,monguard=debug";
const STORE_FILE: &str = "monguard.redb";

#[derive(Parser)]
#[command(name = "monguardd", about = "Monitor quorum reconciler")]
struct Cli {
    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the health checker until interrupted.
    Run {
        #[arg(long)]
        config: PathBuf,
    },

    /// Run a fixed number of passes back to back and print the result.
    Simulate {
        #[arg(long)]
        config: PathBuf,

        #[arg(long, default_value = "3")]
        passes: u32,

        /// Stop these members' workloads before the first pass.
        #[arg(long)]
        stop: Vec<String>,
    },

    /// Print the persisted endpoint record.
    Show {
        #[arg(long, default_value = "/var/lib/monguard")]
        data_dir: PathBuf,

        #[arg(long)]
        namespace: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Run { config } => run(DaemonConfig::from_file(&config)?).await,
        Command::Simulate { config, passes, stop } => {
            simulate(DaemonConfig::from_file(&config)?, passes, &stop).await
        }
        Command::Show { data_dir, namespace } => show(data_dir, &namespace),
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// A cluster wired to local backends.
struct LocalCluster {
    cluster: MonCluster,
    workloads: Arc<InMemoryWorkloads>,
    store: Arc<RedbConfigStore>,
}

/// Assemble a cluster on local backends, restoring persisted state.
async fn build_cluster(config: &DaemonConfig) -> anyhow::Result<LocalCluster> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;
    let db_path = config.data_dir.join(STORE_FILE);
    let store = Arc::new(RedbConfigStore::open(&db_path)?);
    info!(path = ?db_path, "endpoint store opened");

    let workloads = Arc::new(InMemoryWorkloads::with_volume_claims());
    let backends = Backends {
        quorum: Arc::new(WorkloadQuorum::new(workloads.clone())),
        scheduler: Arc::new(InventoryScheduler::new(config.nodes.clone())),
        workloads: workloads.clone(),
        store: store.clone(),
    };
    let mut cluster = MonCluster::new(config.cluster.clone(), backends);

    if cluster.load_from_store(&config.fsid)? {
        // In-memory workloads do not survive a restart; bring back the
        // ones the store knows about.
        for (id, placement) in &cluster.state().placement {
            workloads.insert_running(id, &placement.node);
        }
    } else {
        cluster.initialize(&config.fsid, Vec::new());
        let first = cluster.add_member().await?;
        info!(member = %first, "bootstrapped first mon");
    }

    Ok(LocalCluster {
        cluster,
        workloads,
        store,
    })
}

async fn run(config: DaemonConfig) -> anyhow::Result<()> {
    info!(namespace = %config.cluster.namespace, "monguard daemon starting");

    let local = build_cluster(&config).await?;
    let cluster = Arc::new(Mutex::new(local.cluster));
    let checker = HealthChecker::for_cluster(cluster, &OperatorOverrides::from_env()).await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        checker.run(shutdown_rx).await;
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to install CTRL+C handler")?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    let _ = handle.await;

    info!("monguard daemon stopped");
    Ok(())
}

async fn simulate(config: DaemonConfig, passes: u32, stop: &[String]) -> anyhow::Result<()> {
    let LocalCluster {
        cluster,
        workloads,
        store,
    } = build_cluster(&config).await?;
    for id in stop {
        if let Err(e) = workloads.set_running(&resource_name(id), false).await {
            warn!(member = %id, error = %e, "cannot stop member");
        }
    }

    let cluster = Arc::new(Mutex::new(cluster));
    let checker = HealthChecker::for_cluster(cluster.clone(), &OperatorOverrides::from_env()).await;

    for pass in 1..=passes {
        match checker.run_once().await {
            Ok(()) => {
                let cluster = cluster.lock().await;
                info!(
                    pass,
                    members = cluster.state().internal_count(),
                    endpoints = %cluster.endpoint_table(),
                    "pass complete"
                );
            }
            Err(e) => warn!(pass, error = %e, "pass failed"),
        }
    }

    let record = store.load(&config.cluster.namespace)?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn show(data_dir: PathBuf, namespace: &str) -> anyhow::Result<()> {
    let store = RedbConfigStore::open(&data_dir.join(STORE_FILE))?;
    match store.load(namespace)? {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => println!("no endpoint record for namespace {namespace}"),
    }
    Ok(())
}
