//! Records, snapshots, and last-writer-wins merge.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The unit of synchronization.
///
/// The identifier is immutable once assigned and stable across devices.
/// The host application bumps `updated_at` on every local mutation of
/// the same identifier; the engine only ever reads records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Stable unique identifier.
    pub id: String,
    /// Last-modified time in milliseconds since the Unix epoch.
    pub updated_at: u64,
    /// Opaque payload; the engine does not interpret it.
    pub payload: Vec<u8>,
}

impl Record {
    /// Creates a record.
    pub fn new(id: impl Into<String>, updated_at: u64, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            updated_at,
            payload: payload.into(),
        }
    }
}

/// A serialized copy of the entire record set, stored at one remote key.
///
/// The remote key holds exactly one snapshot ("the last pusher's view");
/// it is not a log. A push is a full-state overwrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Snapshot {
    /// The records, in no particular order.
    pub records: Vec<Record>,
}

impl Snapshot {
    /// Creates a snapshot from a record set.
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Encodes the snapshot as CBOR.
    pub fn encode(&self) -> SyncResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(self, &mut buf)
            .map_err(|err| SyncError::Data(format!("snapshot encode: {err}")))?;
        Ok(buf)
    }

    /// Decodes a snapshot from CBOR bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Data`] if the bytes are not a valid
    /// serialized snapshot.
    pub fn decode(bytes: &[u8]) -> SyncResult<Self> {
        ciborium::de::from_reader(bytes)
            .map_err(|err| SyncError::Data(format!("snapshot decode: {err}")))
    }
}

/// Sync bookkeeping, persisted remotely at its own key.
///
/// Owned exclusively by the engine and updated only after a fully
/// successful pull+push round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetadata {
    /// Time of the last successful round, milliseconds since epoch.
    pub last_sync_at_ms: u64,
}

impl SyncMetadata {
    /// Encodes the metadata as CBOR.
    pub fn encode(&self) -> SyncResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(self, &mut buf)
            .map_err(|err| SyncError::Data(format!("metadata encode: {err}")))?;
        Ok(buf)
    }

    /// Decodes metadata from CBOR bytes.
    pub fn decode(bytes: &[u8]) -> SyncResult<Self> {
        ciborium::de::from_reader(bytes)
            .map_err(|err| SyncError::Data(format!("metadata decode: {err}")))
    }
}

/// Merges two record sets by last-writer-wins on timestamp.
///
/// For every identifier in either set the strictly greater `updated_at`
/// wins. Equal timestamps prefer the local version (documented
/// tie-break; without it the winner would depend on iteration order).
/// Identifiers present on only one side are kept: the merge adds and
/// overwrites, it never removes by absence.
///
/// The result is sorted by identifier, so merging is deterministic.
pub fn merge(local: &[Record], remote: &[Record]) -> Vec<Record> {
    let mut merged: BTreeMap<&str, &Record> = BTreeMap::new();

    for record in remote {
        merged.insert(&record.id, record);
    }
    for record in local {
        match merged.get(record.id.as_str()) {
            Some(existing) if existing.updated_at > record.updated_at => {}
            _ => {
                merged.insert(&record.id, record);
            }
        }
    }

    merged.into_values().cloned().collect()
}
