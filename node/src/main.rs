//! Ephemera Node Binary

use clap::{Parser, Subcommand};
use ephemera_core::{KeyConfig, NodeConfig};
use ephemera_node::NodeBuilder;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ephemera-node")]
#[command(about = "Ephemera - single-slot ephemeral JSON store")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the node
    Run {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// API listen address
        #[arg(long)]
        api_addr: Option<String>,

        /// Master key with full access
        #[arg(long, env = "EPHEMERA_MASTER_KEY", hide_env_values = true)]
        master_key: Option<String>,

        /// Comma separated read-only keys
        #[arg(long, env = "EPHEMERA_READ_ONLY_KEYS", hide_env_values = true)]
        read_only_keys: Option<String>,

        /// Seconds without an update before the document is dropped
        #[arg(long)]
        timeout: Option<u64>,

        /// Query value that opens the unauthenticated status view
        #[arg(long)]
        status_token: Option<String>,

        /// Log level used when RUST_LOG is not set
        #[arg(long)]
        log_level: Option<String>,
    },

    /// Write a default configuration file
    InitConfig {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            api_addr,
            master_key,
            read_only_keys,
            timeout,
            status_token,
            log_level,
        } => {
            let mut node_config = match config {
                Some(path) => load_config(&path)?,
                None => NodeConfig::default(),
            };

            if let Some(addr) = api_addr {
                node_config.api.listen_addr = addr;
            }
            if let Some(key) = master_key {
                node_config.keys.master_key = key;
            }
            if let Some(keys) = read_only_keys {
                node_config.keys.read_only_keys = KeyConfig::parse_key_list(&keys);
            }
            if let Some(secs) = timeout {
                node_config.store.timeout_seconds = secs;
            }
            if let Some(token) = status_token {
                node_config.store.status_token = token;
            }
            if let Some(level) = log_level {
                node_config.log_level = level;
            }

            init_logging(&node_config.log_level);
            info!("Starting Ephemera node...");

            let node = NodeBuilder::new().config(node_config).build()?;
            node.start().await?;
        }

        Commands::InitConfig { output } => {
            let json = NodeConfig::default().to_json()?;
            std::fs::write(&output, &json)?;

            println!("Configuration saved to: {}", output.display());
            println!("Set keys.master_key (or EPHEMERA_MASTER_KEY) before running the node.");
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<NodeConfig> {
    let content = std::fs::read_to_string(path)?;
    Ok(NodeConfig::from_json(&content)?)
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
