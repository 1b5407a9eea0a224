//! Credential store abstraction.

use crate::error::CredentialStoreError;
use parking_lot::Mutex;
use std::collections::HashMap;

/// A secure credential store holding named secrets.
///
/// This trait is the seam to the platform keychain or equivalent. The
/// one hard requirement on implementations is that a lookup miss is
/// reported as [`CredentialStoreError::NotFound`] and nothing else:
/// the key lifecycle treats a miss as permission to create, and every
/// other failure as a reason to stop.
pub trait CredentialStore: Send + Sync {
    /// Persists secret bytes under a logical name, replacing any
    /// existing entry of the same name.
    fn save(&self, name: &str, secret: &[u8]) -> Result<(), CredentialStoreError>;

    /// Retrieves the secret stored under a logical name.
    fn retrieve(&self, name: &str) -> Result<Vec<u8>, CredentialStoreError>;

    /// Deletes the entry under a logical name, if present.
    fn delete(&self, name: &str) -> Result<(), CredentialStoreError>;
}

/// An in-memory credential store.
///
/// Suitable for tests and ephemeral deployments. Supports one-shot
/// fault injection for exercising error paths.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    fail_next_save: Mutex<Option<CredentialStoreError>>,
    fail_next_retrieve: Mutex<Option<CredentialStoreError>>,
}

impl MemoryCredentialStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `save` call fail with the given error.
    pub fn fail_next_save(&self, error: CredentialStoreError) {
        *self.fail_next_save.lock() = Some(error);
    }

    /// Makes the next `retrieve` call fail with the given error.
    pub fn fail_next_retrieve(&self, error: CredentialStoreError) {
        *self.fail_next_retrieve.lock() = Some(error);
    }

    /// Returns true if an entry exists under the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.lock().contains_key(name)
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn save(&self, name: &str, secret: &[u8]) -> Result<(), CredentialStoreError> {
        if let Some(error) = self.fail_next_save.lock().take() {
            return Err(error);
        }
        self.entries.lock().insert(name.to_owned(), secret.to_vec());
        Ok(())
    }

    fn retrieve(&self, name: &str) -> Result<Vec<u8>, CredentialStoreError> {
        if let Some(error) = self.fail_next_retrieve.lock().take() {
            return Err(error);
        }
        self.entries
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| CredentialStoreError::NotFound {
                name: name.to_owned(),
            })
    }

    fn delete(&self, name: &str) -> Result<(), CredentialStoreError> {
        self.entries.lock().remove(name);
        Ok(())
    }
}
