//! Collaborator seams: remote channel, host record store, snapshot cipher.

use crate::error::{SyncError, SyncResult};
use crate::record::Record;
use memora_crypto::{CredentialStore, CryptoError, SecretManager};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;

/// The remote eventually-consistent key-value channel.
///
/// The engine only needs a value-at-key read/write primitive; the
/// channel's own replication and conflict behavior is out of scope.
/// Change notifications arrive out of band through
/// [`SyncEngine::handle_remote_change`](crate::SyncEngine::handle_remote_change).
pub trait RemoteChannel: Send + Sync {
    /// Reads the value at a key. Absence is not an error.
    fn read_value(&self, key: &str) -> SyncResult<Option<Vec<u8>>>;

    /// Writes a value at a key, replacing whatever was there.
    fn write_value(&self, key: &str, value: &[u8]) -> SyncResult<()>;
}

/// The host application's record store.
///
/// The engine never mutates individual records; it reads the full set
/// and requests full-set replacement after a merge.
pub trait RecordStore: Send + Sync {
    /// Returns the current local record set.
    fn records(&self) -> SyncResult<Vec<Record>>;

    /// Replaces the local record set wholesale.
    fn replace_all(&self, records: Vec<Record>) -> SyncResult<()>;
}

/// Protects snapshots at rest.
///
/// Wired to [`memora_crypto::SecretManager`] when the deployment wants
/// encrypted snapshots; the engine works on plaintext when no cipher is
/// configured.
pub trait SnapshotCipher: Send + Sync {
    /// Encrypts snapshot bytes before they leave the engine.
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Decrypts snapshot bytes pulled from the channel.
    fn open(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

impl<S: CredentialStore> SnapshotCipher for SecretManager<S> {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.encrypt(plaintext)
    }

    fn open(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.decrypt(ciphertext)
    }
}

/// An in-memory remote channel for testing.
///
/// Supports one-shot fault injection and counts writes per key so tests
/// can assert that a reactive pull never pushes.
#[derive(Debug, Default)]
pub struct MockChannel {
    values: Mutex<HashMap<String, Vec<u8>>>,
    writes: Mutex<HashMap<String, u64>>,
    fail_next_read: Mutex<Option<SyncError>>,
    fail_next_write: Mutex<Option<SyncError>>,
}

impl MockChannel {
    /// Creates an empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a value at a key.
    pub fn set_value(&self, key: &str, value: impl Into<Vec<u8>>) {
        self.values.lock().insert(key.to_owned(), value.into());
    }

    /// Returns the current value at a key.
    pub fn value(&self, key: &str) -> Option<Vec<u8>> {
        self.values.lock().get(key).cloned()
    }

    /// Returns how many writes a key has received.
    pub fn write_count(&self, key: &str) -> u64 {
        self.writes.lock().get(key).copied().unwrap_or(0)
    }

    /// Makes the next read fail with the given error.
    pub fn fail_next_read(&self, error: SyncError) {
        *self.fail_next_read.lock() = Some(error);
    }

    /// Makes the next write fail with the given error.
    pub fn fail_next_write(&self, error: SyncError) {
        *self.fail_next_write.lock() = Some(error);
    }
}

impl RemoteChannel for MockChannel {
    fn read_value(&self, key: &str) -> SyncResult<Option<Vec<u8>>> {
        if let Some(error) = self.fail_next_read.lock().take() {
            return Err(error);
        }
        Ok(self.values.lock().get(key).cloned())
    }

    fn write_value(&self, key: &str, value: &[u8]) -> SyncResult<()> {
        if let Some(error) = self.fail_next_write.lock().take() {
            return Err(error);
        }
        *self.writes.lock().entry(key.to_owned()).or_insert(0) += 1;
        self.values.lock().insert(key.to_owned(), value.to_vec());
        Ok(())
    }
}

/// An in-memory record store for testing.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<Vec<Record>>,
}

impl MemoryRecordStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with records.
    pub fn with_records(records: Vec<Record>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }
}

impl RecordStore for MemoryRecordStore {
    fn records(&self) -> SyncResult<Vec<Record>> {
        Ok(self.records.read().clone())
    }

    fn replace_all(&self, records: Vec<Record>) -> SyncResult<()> {
        *self.records.write() = records;
        Ok(())
    }
}
