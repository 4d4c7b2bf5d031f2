//! Node lifecycle and builder

use crate::api::{bind_api_listener, start_api_server};
use crate::runtime::NodeRuntime;
use ephemera_core::{Clock, EphemeraResult, NodeConfig, SystemClock};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

/// Ephemera node serving the slot over HTTP
pub struct EphemeraNode {
    runtime: Arc<NodeRuntime>,
}

impl EphemeraNode {
    /// Create a new node from an already validated configuration
    pub fn new(config: NodeConfig, clock: Arc<dyn Clock>) -> Self {
        let runtime = Arc::new(NodeRuntime::with_clock(config, clock));
        Self { runtime }
    }

    /// Start the node and serve until Ctrl-C
    ///
    /// Fails without serving if the listen address cannot be bound.
    pub async fn start(&self) -> anyhow::Result<()> {
        info!("Starting Ephemera node...");

        let config = self.runtime.config();
        let listener = bind_api_listener(&config.api.listen_addr).await?;

        info!("Node started: {}", config.name);
        info!(
            "Data timeout: {}s, read-only keys: {}",
            config.store.timeout_seconds,
            config.keys.read_only_keys.len()
        );

        start_api_server(self.runtime.clone(), listener, shutdown_signal()).await?;

        info!("Node stopped at {}", self.runtime.version());

        Ok(())
    }

    /// Get runtime reference
    pub fn runtime(&self) -> &Arc<NodeRuntime> {
        &self.runtime
    }
}

/// Resolves on Ctrl-C
async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, stopping node...");
        }
        Err(e) => {
            error!("Error waiting for shutdown signal: {}", e);
        }
    }
}

/// Node builder for easier configuration
pub struct NodeBuilder {
    config: NodeConfig,
    clock: Arc<dyn Clock>,
}

impl NodeBuilder {
    pub fn new() -> Self {
        Self {
            config: NodeConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn config(mut self, config: NodeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn api_addr(mut self, addr: &str) -> Self {
        self.config.api.listen_addr = addr.to_string();
        self
    }

    pub fn master_key(mut self, key: &str) -> Self {
        self.config.keys.master_key = key.to_string();
        self
    }

    pub fn read_only_keys(mut self, keys: Vec<String>) -> Self {
        self.config.keys.read_only_keys = keys;
        self
    }

    pub fn timeout_seconds(mut self, secs: u64) -> Self {
        self.config.store.timeout_seconds = secs;
        self
    }

    pub fn status_token(mut self, token: &str) -> Self {
        self.config.store.status_token = token.to_string();
        self
    }

    /// Validate the configuration and build the node
    pub fn build(mut self) -> EphemeraResult<EphemeraNode> {
        self.config.validate()?;
        Ok(EphemeraNode::new(self.config, self.clock))
    }
}

impl Default for NodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
