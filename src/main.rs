//! keycl - Valkey cluster administration from the command line.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Builds the admin tool driver from flags and environment
//! - Runs one driver or rebalancing operation, cancelled on SIGTERM or SIGINT

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use keycl::client::{CliName, ScalingOps, ValkeyCli, ValkeyCliConfig};
use keycl::slots::{ReshardPlan, SourceSpec};

/// Default log directive when `RUST_LOG` is unset
const DEFAULT_LOG_DIRECTIVE: &str = "keycl=info";

#[derive(Parser)]
#[command(name = "keycl")]
#[command(about = "Valkey/Redis cluster administration through valkey-cli")]
#[command(version)]
struct Cli {
    /// Admin tool to drive (valkey-cli or redis-cli)
    #[arg(long, global = true, env = "KEYCL_CLI", default_value = "valkey-cli")]
    cli: CliName,

    /// Path to the admin tool binary (defaults to a PATH lookup)
    #[arg(long, global = true, env = "KEYCL_CLI_PATH")]
    cli_path: Option<PathBuf>,

    /// Cluster password, passed to the admin tool with -a
    #[arg(long, global = true, env = "KEYCL_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Host of the cluster node to talk to
    #[arg(long, global = true, default_value = "127.0.0.1")]
    host: String,

    /// Port of the cluster node to talk to
    #[arg(short, long, global = true, default_value_t = 6379)]
    port: u16,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a cluster from the given node addresses
    Create {
        /// Replicas per master
        #[arg(long, default_value_t = 0)]
        replicas: u32,

        /// Node addresses as host:port
        #[arg(required = true)]
        addresses: Vec<String>,
    },

    /// Print the parsed `cluster nodes` view as JSON
    Nodes,

    /// Print the parsed `cluster info` view as JSON
    Info,

    /// Add a node to the cluster reachable at --host/--port
    AddNode {
        /// Host of the node joining the cluster
        #[arg(long)]
        new_host: String,

        /// Port of the node joining the cluster
        #[arg(long)]
        new_port: u16,
    },

    /// Make the node at --host/--port forget a node
    Forget {
        /// Node ID to forget
        node_id: String,
    },

    /// Remove a node from the cluster
    Delete {
        /// Node ID to remove
        node_id: String,
    },

    /// Make the node at --host/--port a replica of a master
    Replicate {
        /// Master node ID
        master_id: String,
    },

    /// Even out slots across all masters with the admin tool's rebalancer
    Rebalance,

    /// Move slots into a node
    Reshard {
        /// Receiving node ID
        #[arg(long)]
        to: String,

        /// Number of slots to move
        #[arg(long)]
        slots: u32,

        /// Source node ID, or "all" for every master
        #[arg(long, default_value = "all")]
        from: String,
    },

    /// Give every master without slots an equal share
    ReshardAll,

    /// Move all slots of a master into a bordering master
    Except {
        /// Node ID to empty
        node_id: String,
    },

    /// Move all slots of one node into another
    Merge {
        /// Node receiving the slots
        #[arg(long)]
        target: String,

        /// Node giving up its slots
        #[arg(long)]
        source: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON results on stdout stay machine-readable
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match cli.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }

    let mut config = ValkeyCliConfig::new(cli.cli);
    if let Some(password) = cli.password {
        config = config.with_password(password);
    }
    if let Some(path) = cli.cli_path {
        config = config.with_binary_path(path);
    }
    let valkey = ValkeyCli::new(config);

    let cancel = CancellationToken::new();
    let signal_handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("Received shutdown signal, cancelling running operation");
            cancel.cancel();
        })
    };

    let host = cli.host.as_str();
    let port = cli.port;

    match cli.command {
        Commands::Create {
            replicas,
            addresses,
        } => {
            valkey.create_cluster(&cancel, replicas, &addresses).await?;
        }
        Commands::Nodes => {
            let nodes = valkey.cluster_nodes(&cancel, host, port).await?;
            print_json(&nodes)?;
        }
        Commands::Info => {
            let info = valkey.cluster_info(&cancel, host, port).await?;
            print_json(&info)?;
        }
        Commands::AddNode { new_host, new_port } => {
            valkey
                .add_node(&cancel, &new_host, new_port, host, port)
                .await?;
        }
        Commands::Forget { node_id } => {
            valkey.forget_node(&cancel, host, port, &node_id).await?;
        }
        Commands::Delete { node_id } => {
            valkey.delete_node(&cancel, host, port, &node_id).await?;
        }
        Commands::Replicate { master_id } => {
            valkey.replicate_node(&cancel, host, port, &master_id).await?;
        }
        Commands::Rebalance => {
            valkey.rebalance(&cancel, host, port).await?;
        }
        Commands::Reshard { to, slots, from } => {
            let plan = ReshardPlan::new(to, SourceSpec::from(from.as_str()), slots);
            valkey.reshard(&cancel, host, port, &plan).await?;
        }
        Commands::ReshardAll => {
            let result = valkey.reshard_all(&cancel, host, port).await?;
            print_json(&result)?;
        }
        Commands::Except { node_id } => {
            let result = valkey.except_node(&cancel, host, port, &node_id).await?;
            print_json(&result)?;
        }
        Commands::Merge { target, source } => {
            let result = valkey
                .merge_node(&cancel, host, port, &target, &source)
                .await?;
            print_json(&result)?;
        }
    }

    signal_handle.abort();
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> keycl::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - an operation could not be
/// cancelled cleanly without them. Using expect() here is intentional.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
