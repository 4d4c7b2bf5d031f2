//! The single-slot ephemeral store
//!
//! Holds at most one document together with its last-update time and a
//! version counter. A stale document is dropped lazily by the first read or
//! write that notices it; nothing sweeps the slot in the background, so an
//! expired document stays in memory until the next access.

use ephemera_core::{
    Clock, Document, EphemeraError, EphemeraResult, EpochSeconds, StoreConfig, StoreVersion,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

use crate::keys::{Access, AuthOutcome, KeyRing};
use crate::snapshot::{ReadMeta, Snapshot, WriteReceipt};

pub const NO_DATA_TO_DELETE: &str = "No data to delete";
pub const NO_DATA_TO_UPDATE: &str = "No data to update";

#[derive(Debug, Default)]
struct Slot {
    document: Option<Document>,
    /// Reported as 0 on the wire while empty
    last_update: Option<EpochSeconds>,
    version: StoreVersion,
}

impl Slot {
    /// Clear the document once it has been idle for `timeout` seconds.
    ///
    /// Returns true if this call cleared it.
    fn expire_if_stale(&mut self, now: EpochSeconds, timeout: i64) -> bool {
        let Some(last_update) = self.last_update.filter(|_| self.document.is_some()) else {
            return false;
        };

        let elapsed = now.seconds_since(last_update);
        if elapsed < timeout {
            return false;
        }

        info!("Data expired after {} seconds, clearing slot", elapsed);
        self.document = None;
        self.last_update = None;
        self.version = self.version.next();
        true
    }

    fn store(&mut self, document: Document, now: EpochSeconds) -> WriteReceipt {
        self.document = Some(document);
        self.last_update = Some(now);
        self.version = self.version.next();
        self.receipt()
    }

    fn receipt(&self) -> WriteReceipt {
        WriteReceipt {
            version: self.version,
            last_update: self.reported_last_update(),
        }
    }

    fn reported_last_update(&self) -> EpochSeconds {
        self.last_update.unwrap_or(EpochSeconds::UNSET)
    }
}

/// Single-slot document store with passive expiry
pub struct EphemeralStore {
    slot: Mutex<Slot>,
    keys: KeyRing,
    clock: Arc<dyn Clock>,
    timeout_seconds: u64,
}

impl EphemeralStore {
    pub fn new(config: &StoreConfig, keys: KeyRing, clock: Arc<dyn Clock>) -> Self {
        Self {
            slot: Mutex::new(Slot::default()),
            keys,
            clock,
            timeout_seconds: config.timeout_seconds,
        }
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    fn timeout(&self) -> i64 {
        i64::try_from(self.timeout_seconds).unwrap_or(i64::MAX)
    }

    /// Resolve a presented key against the configured key ring
    pub fn authenticate(&self, provided: Option<&str>, require_master: bool) -> AuthOutcome {
        self.keys.authenticate(provided, require_master)
    }

    /// Run the expiry check on its own. Returns true if it cleared the slot.
    pub fn expire_if_stale(&self) -> bool {
        let now = self.clock.now();
        self.slot.lock().expire_if_stale(now, self.timeout())
    }

    pub fn version(&self) -> StoreVersion {
        self.slot.lock().version
    }

    /// Read the slot. Authorization is the caller's responsibility.
    pub fn read(&self) -> Snapshot {
        let now = self.clock.now();
        let mut slot = self.slot.lock();
        let expired_just_now = slot.expire_if_stale(now, self.timeout());

        let seconds_since_update = slot
            .last_update
            .map_or(0, |last_update| now.seconds_since(last_update));

        debug!(version = slot.version.0, present = slot.document.is_some(), "slot read");

        Snapshot {
            document: slot.document.clone(),
            meta: ReadMeta {
                last_update: slot.reported_last_update(),
                seconds_since_update,
                timeout_seconds: self.timeout_seconds,
                expired_just_now,
                version: slot.version,
                now,
            },
        }
    }

    /// Publish a new document, stamping `timestamp` when it carries none.
    ///
    /// Any authenticated caller may reach this; read-only callers are refused.
    pub fn replace(&self, access: Access, mut document: Document) -> EphemeraResult<WriteReceipt> {
        if access.is_read_only() {
            return Err(EphemeraError::read_only_write());
        }

        let now = self.clock.now();
        let mut slot = self.slot.lock();
        slot.expire_if_stale(now, self.timeout());

        document.stamp_if_missing(now);
        let receipt = slot.store(document, now);
        info!("Data updated at {} ({})", now, receipt.version);
        Ok(receipt)
    }

    /// Overwrite the document as-is. Master only.
    pub fn force_replace(&self, access: Access, document: Document) -> EphemeraResult<WriteReceipt> {
        Self::require_master(access)?;

        let now = self.clock.now();
        let mut slot = self.slot.lock();
        slot.expire_if_stale(now, self.timeout());

        let receipt = slot.store(document, now);
        info!("Data force-replaced at {} ({})", now, receipt.version);
        Ok(receipt)
    }

    /// Drop the document. Master only.
    pub fn clear(&self, access: Access) -> EphemeraResult<WriteReceipt> {
        Self::require_master(access)?;

        let now = self.clock.now();
        let mut slot = self.slot.lock();
        slot.expire_if_stale(now, self.timeout());

        if slot.document.is_none() {
            return Err(EphemeraError::NotFound(NO_DATA_TO_DELETE.into()));
        }

        slot.document = None;
        slot.last_update = None;
        slot.version = slot.version.next();
        info!("Data deleted ({})", slot.version);
        Ok(slot.receipt())
    }

    /// Shallow-merge `patch` into the stored document. Master only.
    pub fn merge_patch(&self, access: Access, patch: Document) -> EphemeraResult<WriteReceipt> {
        Self::require_master(access)?;

        let now = self.clock.now();
        let mut slot = self.slot.lock();
        slot.expire_if_stale(now, self.timeout());

        let Some(mut document) = slot.document.take() else {
            return Err(EphemeraError::NotFound(NO_DATA_TO_UPDATE.into()));
        };

        document.merge(patch);
        let receipt = slot.store(document, now);
        info!("Data partially updated at {} ({})", now, receipt.version);
        Ok(receipt)
    }

    fn require_master(access: Access) -> EphemeraResult<()> {
        if access.can_write() {
            Ok(())
        } else {
            Err(EphemeraError::master_key_required())
        }
    }
}

impl std::fmt::Debug for EphemeralStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralStore")
            .field("keys", &self.keys)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish_non_exhaustive()
    }
}

/// Thread-safe store handle
pub type SharedEphemeralStore = Arc<EphemeralStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use ephemera_core::ManualClock;
    use serde_json::{json, Value};

    fn doc(value: Value) -> Document {
        Document::from_value(value).unwrap()
    }

    fn setup(start: i64) -> (EphemeralStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(EpochSeconds(start)));
        let keys = KeyRing::new("MASTER", vec!["RO".to_string()]);
        let store = EphemeralStore::new(&StoreConfig::default(), keys, clock.clone());
        (store, clock)
    }

    #[test]
    fn test_empty_store() {
        let (store, _) = setup(1_000);
        let snapshot = store.read();

        assert!(!snapshot.is_present());
        assert_eq!(snapshot.meta.version, StoreVersion(0));
        assert_eq!(snapshot.meta.last_update, EpochSeconds::UNSET);
        assert_eq!(snapshot.meta.seconds_since_update, 0);
        assert_eq!(snapshot.meta.now, EpochSeconds(1_000));
        assert!(!snapshot.meta.expired_just_now);
    }

    #[test]
    fn test_replace_stamps_timestamp() {
        let (store, clock) = setup(1_000);
        let receipt = store.replace(Access::Master, doc(json!({"x": 1}))).unwrap();
        assert_eq!(receipt.version, StoreVersion(1));
        assert_eq!(receipt.last_update, EpochSeconds(1_000));

        clock.advance(5);
        let snapshot = store.read();
        assert_eq!(
            snapshot.document.unwrap().into_value(),
            json!({"x": 1, "timestamp": 1_000})
        );
        assert_eq!(snapshot.meta.seconds_since_update, 5);
    }

    #[test]
    fn test_replace_keeps_client_timestamp() {
        let (store, _) = setup(1_000);
        store.replace(Access::Master, doc(json!({"timestamp": 42}))).unwrap();
        assert_eq!(
            store.read().document.unwrap().into_value(),
            json!({"timestamp": 42})
        );
    }

    #[test]
    fn test_replace_overwrites_without_merge() {
        let (store, _) = setup(1_000);
        store.replace(Access::Master, doc(json!({"a": 1}))).unwrap();
        store.replace(Access::Master, doc(json!({"b": 2}))).unwrap();

        let document = store.read().document.unwrap();
        assert!(document.get("a").is_none());
        assert_eq!(document.get("b"), Some(&json!(2)));
        assert_eq!(store.version(), StoreVersion(2));
    }

    #[test]
    fn test_read_only_cannot_write() {
        let (store, _) = setup(1_000);
        store.replace(Access::Master, doc(json!({"a": 1}))).unwrap();

        let err = store.replace(Access::ReadOnly, doc(json!({"a": 2}))).unwrap_err();
        assert_eq!(err.to_string(), "Read-only API key cannot modify data");
        assert!(store.force_replace(Access::ReadOnly, doc(json!({}))).is_err());
        assert!(store.merge_patch(Access::ReadOnly, doc(json!({"a": 3}))).is_err());
        let err = store.clear(Access::ReadOnly).unwrap_err();
        assert_eq!(err.status_code(), 403);

        assert_eq!(store.version(), StoreVersion(1));
        assert_eq!(store.read().document.unwrap().get("a"), Some(&json!(1)));
    }

    #[test]
    fn test_force_replace_does_not_stamp() {
        let (store, _) = setup(1_000);
        let receipt = store.force_replace(Access::Master, doc(json!({"x": 1}))).unwrap();
        assert_eq!(receipt.version, StoreVersion(1));

        let snapshot = store.read();
        assert_eq!(snapshot.document.unwrap().into_value(), json!({"x": 1}));
        assert_eq!(snapshot.meta.last_update, EpochSeconds(1_000));
    }

    #[test]
    fn test_merge_patch_is_shallow() {
        let (store, clock) = setup(1_000);
        store.force_replace(Access::Master, doc(json!({"a": 1, "b": 2}))).unwrap();

        clock.advance(3);
        let receipt = store.merge_patch(Access::Master, doc(json!({"b": 3}))).unwrap();
        assert_eq!(receipt.version, StoreVersion(2));
        assert_eq!(receipt.last_update, EpochSeconds(1_003));
        assert_eq!(
            store.read().document.unwrap().into_value(),
            json!({"a": 1, "b": 3})
        );
    }

    #[test]
    fn test_merge_patch_on_empty_store() {
        let (store, _) = setup(1_000);
        let err = store.merge_patch(Access::Master, doc(json!({"b": 3}))).unwrap_err();
        assert!(matches!(err, EphemeraError::NotFound(ref m) if m == NO_DATA_TO_UPDATE));
        assert_eq!(store.version(), StoreVersion(0));
    }

    #[test]
    fn test_clear() {
        let (store, _) = setup(1_000);
        let err = store.clear(Access::Master).unwrap_err();
        assert!(matches!(err, EphemeraError::NotFound(ref m) if m == NO_DATA_TO_DELETE));
        assert_eq!(store.version(), StoreVersion(0));

        store.replace(Access::Master, doc(json!({"x": 1}))).unwrap();
        let receipt = store.clear(Access::Master).unwrap();
        assert_eq!(receipt.version, StoreVersion(2));
        assert_eq!(receipt.last_update, EpochSeconds::UNSET);

        let snapshot = store.read();
        assert!(!snapshot.is_present());
        assert_eq!(snapshot.meta.last_update, EpochSeconds::UNSET);
    }

    #[test]
    fn test_expiry_on_read() {
        let (store, clock) = setup(1_000);
        store.replace(Access::Master, doc(json!({"x": 1}))).unwrap();

        clock.advance(29);
        let snapshot = store.read();
        assert!(snapshot.is_present());
        assert!(!snapshot.meta.expired_just_now);

        clock.advance(1);
        let snapshot = store.read();
        assert!(!snapshot.is_present());
        assert!(snapshot.meta.expired_just_now);
        assert_eq!(snapshot.meta.version, StoreVersion(2));
        assert_eq!(snapshot.meta.seconds_since_update, 0);

        // idempotent
        let snapshot = store.read();
        assert!(!snapshot.meta.expired_just_now);
        assert_eq!(snapshot.meta.version, StoreVersion(2));
    }

    #[test]
    fn test_expiry_before_write() {
        let (store, clock) = setup(1_000);
        store.replace(Access::Master, doc(json!({"x": 1}))).unwrap();

        clock.advance(45);
        let receipt = store.replace(Access::Master, doc(json!({"y": 1}))).unwrap();
        // one bump for the expiry, one for the write
        assert_eq!(receipt.version, StoreVersion(3));
        assert_eq!(
            store.read().document.unwrap().into_value(),
            json!({"y": 1, "timestamp": 1_045})
        );
    }

    #[test]
    fn test_expired_document_cannot_be_patched_or_deleted() {
        let (store, clock) = setup(1_000);
        store.replace(Access::Master, doc(json!({"x": 1}))).unwrap();
        clock.advance(30);

        let err = store.merge_patch(Access::Master, doc(json!({"y": 2}))).unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert_eq!(store.version(), StoreVersion(2));

        let err = store.clear(Access::Master).unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert_eq!(store.version(), StoreVersion(2));
    }

    #[test]
    fn test_expire_if_stale_directly() {
        let (store, clock) = setup(1_000);
        assert!(!store.expire_if_stale());

        store.replace(Access::Master, doc(json!({"x": 1}))).unwrap();
        clock.advance(31);
        assert!(store.expire_if_stale());
        assert!(!store.expire_if_stale());
        assert_eq!(store.version(), StoreVersion(2));
    }

    #[test]
    fn test_repeated_reads_are_stable() {
        let (store, clock) = setup(1_000);
        store.replace(Access::Master, doc(json!({"x": 1}))).unwrap();

        let first = store.read();
        clock.advance(10);
        let second = store.read();
        assert_eq!(first.document, second.document);
        assert_eq!(first.meta.version, second.meta.version);
    }

    #[test]
    fn test_custom_timeout() {
        let clock = Arc::new(ManualClock::new(EpochSeconds(500)));
        let config = StoreConfig {
            timeout_seconds: 5,
            ..Default::default()
        };
        let store = EphemeralStore::new(&config, KeyRing::new("M", Vec::new()), clock.clone());
        store.replace(Access::Master, doc(json!({}))).unwrap();

        clock.advance(4);
        assert!(store.read().is_present());
        clock.advance(1);
        assert!(!store.read().is_present());
    }

    #[test]
    fn test_publish_read_expire_from_epoch_zero() {
        let (store, clock) = setup(0);
        store.replace(Access::Master, doc(json!({"x": 1}))).unwrap();
        assert_eq!(store.version(), StoreVersion(1));

        clock.set(EpochSeconds(10));
        let snapshot = store.read();
        assert_eq!(
            snapshot.document.unwrap().into_value(),
            json!({"x": 1, "timestamp": 0})
        );
        assert!(!snapshot.meta.expired_just_now);
        assert_eq!(snapshot.meta.seconds_since_update, 10);

        clock.set(EpochSeconds(31));
        let snapshot = store.read();
        assert!(!snapshot.is_present());
        assert!(snapshot.meta.expired_just_now);
        assert_eq!(snapshot.meta.version, StoreVersion(2));
    }

    #[test]
    fn test_concurrent_writers_bump_version_once_each() {
        let (store, _) = setup(1_000);
        let store = Arc::new(store);

        std::thread::scope(|scope| {
            for i in 0..8 {
                let store = store.clone();
                scope.spawn(move || {
                    for j in 0..25 {
                        store
                            .replace(Access::Master, doc(json!({"writer": i, "n": j})))
                            .unwrap();
                    }
                });
            }
        });

        assert_eq!(store.version(), StoreVersion(200));
    }

    #[test]
    fn test_authenticate_delegates_to_keyring() {
        let (store, _) = setup(1_000);
        assert_eq!(store.authenticate(Some("MASTER"), true), AuthOutcome::AuthenticatedMaster);
        assert_eq!(store.authenticate(Some("RO"), false), AuthOutcome::AuthenticatedReadOnly);
        assert!(!store.authenticate(Some("RO"), true).is_authenticated());
    }
}
