//! Node runtime: authenticates requests and drives the store

use ephemera_core::{
    Clock, Document, EphemeraError, EphemeraResult, NodeConfig, StoreVersion, SystemClock,
};
use ephemera_state::{
    Access, AuthOutcome, EphemeralStore, KeyRing, SharedEphemeralStore, Snapshot, WriteReceipt,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Message returned when a POST body cannot be used
pub const FAILED_TO_PROCESS: &str = "Failed to process data";
/// Message returned when a PUT or PATCH body cannot be used
pub const FAILED_TO_UPDATE: &str = "Failed to update data";

/// Node runtime owning the store for the lifetime of the process
pub struct NodeRuntime {
    config: NodeConfig,
    store: SharedEphemeralStore,
}

impl NodeRuntime {
    /// Create a runtime on the system clock
    pub fn new(config: NodeConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: NodeConfig, clock: Arc<dyn Clock>) -> Self {
        let keys = KeyRing::from_config(&config.keys);
        let store = Arc::new(EphemeralStore::new(&config.store, keys, clock));
        Self { config, store }
    }

    fn authenticate(&self, credential: Option<&str>, require_master: bool) -> EphemeraResult<Access> {
        match self.store.authenticate(credential, require_master) {
            AuthOutcome::Unauthenticated(failure) => {
                warn!(reason = failure.reason(), require_master, "Rejected credential");
                Err(failure.into())
            }
            outcome => outcome.into_access(),
        }
    }

    /// Whether `key_param` opens the unauthenticated status view
    pub fn is_status_request(&self, key_param: Option<&str>) -> bool {
        key_param == Some(self.config.store.status_token.as_str())
    }

    /// GET: read the slot, either authenticated or through the status view.
    ///
    /// The status view returns the same payload an authenticated read would,
    /// unless `store.redact_status_document` is set.
    pub fn read(&self, credential: Option<&str>, key_param: Option<&str>) -> EphemeraResult<Snapshot> {
        if self.is_status_request(key_param) {
            debug!("Serving status view without authentication");
            let snapshot = self.store.read();
            if self.config.store.redact_status_document {
                return Ok(snapshot.redacted());
            }
            return Ok(snapshot);
        }

        let access = self.authenticate(credential, false)?;
        debug!(access = access.as_str(), "Authenticated read");
        Ok(self.store.read())
    }

    /// POST: publish a document, stamping a timestamp if absent
    pub fn publish(&self, credential: Option<&str>, body: &[u8]) -> EphemeraResult<WriteReceipt> {
        let access = self.authenticate(credential, false)?;
        if access.is_read_only() {
            warn!("Read-only key attempted to publish");
            return Err(EphemeraError::read_only_write());
        }

        let document = parse_document(body)
            .ok_or_else(|| EphemeraError::MalformedInput(FAILED_TO_PROCESS.into()))?;
        self.store.replace(access, document)
    }

    /// PUT: overwrite the document verbatim
    pub fn force_replace(&self, credential: Option<&str>, body: &[u8]) -> EphemeraResult<WriteReceipt> {
        let access = self.authenticate(credential, true)?;
        let document = parse_document(body)
            .ok_or_else(|| EphemeraError::InternalFailure(FAILED_TO_UPDATE.into()))?;
        self.store.force_replace(access, document)
    }

    /// DELETE: drop the document
    pub fn clear(&self, credential: Option<&str>) -> EphemeraResult<WriteReceipt> {
        let access = self.authenticate(credential, true)?;
        self.store.clear(access)
    }

    /// PATCH: shallow-merge top-level fields into the document
    pub fn patch(&self, credential: Option<&str>, body: &[u8]) -> EphemeraResult<WriteReceipt> {
        let access = self.authenticate(credential, true)?;
        let patch = parse_document(body)
            .ok_or_else(|| EphemeraError::InternalFailure(FAILED_TO_UPDATE.into()))?;
        self.store.merge_patch(access, patch)
    }

    /// Current store version
    pub fn version(&self) -> StoreVersion {
        self.store.version()
    }

    /// Get config reference
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Get store reference
    pub fn store(&self) -> &SharedEphemeralStore {
        &self.store
    }
}

/// Documents must be JSON objects
fn parse_document(body: &[u8]) -> Option<Document> {
    serde_json::from_slice(body).ok().and_then(Document::from_value)
}
