//! Configuration types for Ephemera

use serde::{Deserialize, Serialize};

use crate::error::EphemeraError;
use crate::traits::EphemeraResult;

/// Main node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node name for logging
    pub name: String,

    /// API configuration
    pub api: ApiConfig,

    /// Slot behaviour
    pub store: StoreConfig,

    /// Credentials accepted by the API
    pub keys: KeyConfig,

    /// Logging level
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "ephemera-node".to_string(),
            api: ApiConfig::default(),
            store: StoreConfig::default(),
            keys: KeyConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl NodeConfig {
    pub fn from_json(json: &str) -> EphemeraResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> EphemeraResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the configuration is usable and normalize the key set
    pub fn validate(&mut self) -> EphemeraResult<()> {
        self.keys.normalize();
        self.keys.validate()?;
        self.store.validate()?;

        if self.api.listen_addr.trim().is_empty() {
            return Err(EphemeraError::ConfigError("api.listen_addr must not be empty".into()));
        }
        if self.api.max_body_bytes == 0 {
            return Err(EphemeraError::ConfigError("api.max_body_bytes must be positive".into()));
        }

        Ok(())
    }
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API listen address
    pub listen_addr: String,

    /// Enable CORS
    pub enable_cors: bool,

    /// CORS allowed origins
    pub cors_origins: Vec<String>,

    /// Largest request body accepted, in bytes
    pub max_body_bytes: usize,
}

impl ApiConfig {
    pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            enable_cors: true,
            cors_origins: vec!["*".to_string()],
            max_body_bytes: Self::DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Slot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Inactivity window after which the document is dropped
    pub timeout_seconds: u64,

    /// Value of the `key` query parameter that opens the status view
    pub status_token: String,

    /// Serve an empty `data` array on the status view
    pub redact_status_document: bool,
}

impl StoreConfig {
    pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
    pub const DEFAULT_STATUS_TOKEN: &'static str = "status";

    fn validate(&self) -> EphemeraResult<()> {
        if self.timeout_seconds == 0 {
            return Err(EphemeraError::ConfigError("store.timeout_seconds must be positive".into()));
        }
        if self.timeout_seconds > i64::MAX as u64 {
            return Err(EphemeraError::ConfigError("store.timeout_seconds is too large".into()));
        }
        if self.status_token.is_empty() {
            return Err(EphemeraError::ConfigError("store.status_token must not be empty".into()));
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: Self::DEFAULT_TIMEOUT_SECONDS,
            status_token: Self::DEFAULT_STATUS_TOKEN.to_string(),
            redact_status_document: false,
        }
    }
}

/// Credential configuration
///
/// Keys are plain strings supplied at startup; there is no built-in default.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Key with full read/write/delete authority
    pub master_key: String,

    /// Keys limited to reads
    pub read_only_keys: Vec<String>,
}

impl KeyConfig {
    pub fn new(master_key: impl Into<String>, read_only_keys: Vec<String>) -> Self {
        Self {
            master_key: master_key.into(),
            read_only_keys,
        }
    }

    /// Parse a comma separated key list, as passed through the environment
    pub fn parse_key_list(list: &str) -> Vec<String> {
        list.split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect()
    }

    fn normalize(&mut self) {
        self.read_only_keys.retain(|k| !k.trim().is_empty());
        self.read_only_keys.sort();
        self.read_only_keys.dedup();
    }

    fn validate(&self) -> EphemeraResult<()> {
        if self.master_key.trim().is_empty() {
            return Err(EphemeraError::ConfigError("keys.master_key must be set".into()));
        }
        if self.read_only_keys.contains(&self.master_key) {
            return Err(EphemeraError::ConfigError(
                "keys.master_key must not also be a read-only key".into(),
            ));
        }
        Ok(())
    }
}

// Keep key material out of logs.
impl std::fmt::Debug for KeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyConfig")
            .field("master_key", &"<redacted>")
            .field("read_only_keys", &self.read_only_keys.len())
            .finish()
    }
}
