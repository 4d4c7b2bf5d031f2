//! Core types for Ephemera
//!
//! Defines the value types held by the store and reported on the wire.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Name of the field stamped onto documents that arrive without one
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Wall-clock time in whole seconds since Unix epoch
///
/// Zero doubles as the "unset" marker for the last-update time.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct EpochSeconds(pub i64);

impl EpochSeconds {
    pub const UNSET: EpochSeconds = EpochSeconds(0);

    pub fn now() -> Self {
        EpochSeconds(chrono::Utc::now().timestamp())
    }

    pub fn from_secs(secs: i64) -> Self {
        EpochSeconds(secs)
    }

    pub fn as_secs(&self) -> i64 {
        self.0
    }

    /// Seconds elapsed between `earlier` and `self`
    pub fn seconds_since(&self, earlier: EpochSeconds) -> i64 {
        self.0 - earlier.0
    }
}

impl fmt::Display for EpochSeconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for EpochSeconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EpochSeconds({})", self.0)
    }
}

/// Store generation counter, bumped on every accepted mutation
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct StoreVersion(pub u64);

impl StoreVersion {
    pub fn new(value: u64) -> Self {
        StoreVersion(value)
    }

    pub fn next(&self) -> StoreVersion {
        StoreVersion(self.0 + 1)
    }
}

impl fmt::Display for StoreVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Debug for StoreVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoreVersion({})", self.0)
    }
}

/// The JSON object published into the slot
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new() -> Self {
        Document(Map::new())
    }

    /// Build a document from an arbitrary JSON value.
    ///
    /// Returns `None` unless the value is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Document(map)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// A `null` timestamp counts as missing.
    pub fn has_timestamp(&self) -> bool {
        matches!(self.0.get(TIMESTAMP_FIELD), Some(v) if !v.is_null())
    }

    /// Set `timestamp` to `now` when the document carries none.
    ///
    /// Returns true if the field was written.
    pub fn stamp_if_missing(&mut self, now: EpochSeconds) -> bool {
        if self.has_timestamp() {
            return false;
        }
        self.0.insert(TIMESTAMP_FIELD.to_string(), Value::from(now.as_secs()));
        true
    }

    /// Shallow merge: top-level keys of `patch` replace same-named keys here.
    pub fn merge(&mut self, patch: Document) {
        for (key, value) in patch.0 {
            self.0.insert(key, value);
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}
