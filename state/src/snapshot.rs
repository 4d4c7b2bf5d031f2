//! Views of the slot handed back to callers

use ephemera_core::{Document, EpochSeconds, StoreVersion};
use serde::Serialize;

/// Metadata reported alongside every read
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadMeta {
    #[serde(rename = "lastUpdateTime")]
    pub last_update: EpochSeconds,
    /// Zero while no document is stored
    #[serde(rename = "timeSinceLastUpdate")]
    pub seconds_since_update: i64,
    #[serde(rename = "dataTimeout")]
    pub timeout_seconds: u64,
    /// True when this very read cleared a stale document
    #[serde(rename = "dataExpired")]
    pub expired_just_now: bool,
    #[serde(rename = "dataVersion")]
    pub version: StoreVersion,
    #[serde(rename = "serverTime")]
    pub now: EpochSeconds,
}

/// The slot as observed by a single read
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub document: Option<Document>,
    pub meta: ReadMeta,
}

impl Snapshot {
    pub fn is_present(&self) -> bool {
        self.document.is_some()
    }

    /// Drop the document, keeping the metadata
    pub fn redacted(self) -> Self {
        Self {
            document: None,
            meta: self.meta,
        }
    }
}

/// Outcome of an accepted write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteReceipt {
    #[serde(rename = "dataVersion")]
    pub version: StoreVersion,
    #[serde(rename = "lastUpdateTime")]
    pub last_update: EpochSeconds,
}
