//! Secret manager: key lifecycle plus authenticated encryption.

use crate::error::{CryptoError, CryptoResult};
use crate::key::{EncryptionKey, NONCE_SIZE, TAG_SIZE};
use crate::store::CredentialStore;
use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use parking_lot::Mutex;
use rand::RngCore;
use tracing::debug;

/// Default logical name for the installation key.
pub const DEFAULT_KEY_NAME: &str = "memora.encryption-key";

/// Manages the single installation key and encrypts/decrypts with it.
///
/// Exactly one key is used for the lifetime of the installation: it is
/// looked up in the credential store on first use, created there if the
/// store reports a miss, and cached in memory afterwards. There is no
/// rotation and no multi-key support.
///
/// Ciphertext layout is `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
pub struct SecretManager<S: CredentialStore> {
    store: S,
    key_name: String,
    // Guards the whole obtain path so two callers cannot both generate.
    cached: Mutex<Option<EncryptionKey>>,
}

impl<S: CredentialStore> SecretManager<S> {
    /// Creates a manager using the default key name.
    pub fn new(store: S) -> Self {
        Self::with_key_name(store, DEFAULT_KEY_NAME)
    }

    /// Creates a manager with a custom logical key name.
    pub fn with_key_name(store: S, key_name: impl Into<String>) -> Self {
        Self {
            store,
            key_name: key_name.into(),
            cached: Mutex::new(None),
        }
    }

    /// Returns the logical name the key is stored under.
    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    /// Encrypts plaintext with the installation key.
    ///
    /// # Errors
    ///
    /// Fails if the key cannot be obtained from the credential store or
    /// the cipher rejects the input.
    pub fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let cipher = self.cipher()?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CryptoError::encryption_failed("cipher error"))?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend(ciphertext);
        Ok(result)
    }

    /// Decrypts ciphertext produced by [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// Fails with [`CryptoError::AuthenticationFailed`] on tampered data
    /// or a wrong key. Never returns truncated or zero-filled plaintext.
    pub fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::AuthenticationFailed);
        }

        let cipher = self.cipher()?;
        let nonce = Nonce::from_slice(&ciphertext[..NONCE_SIZE]);
        cipher
            .decrypt(nonce, &ciphertext[NONCE_SIZE..])
            .map_err(|_| CryptoError::AuthenticationFailed)
    }

    fn cipher(&self) -> CryptoResult<Aes256Gcm> {
        let key = self.obtain_key()?;
        Ok(Aes256Gcm::new(GenericArray::from_slice(key.as_bytes())))
    }

    /// Obtains the installation key: cache, then store, then create.
    ///
    /// Only a `NotFound` from the store permits generating a new key.
    /// Any other store error is surfaced untouched: a fresh key created
    /// over a still-recoverable one would orphan all existing data.
    fn obtain_key(&self) -> CryptoResult<EncryptionKey> {
        let mut cached = self.cached.lock();
        if let Some(key) = cached.as_ref() {
            return Ok(key.clone());
        }

        let key = match self.store.retrieve(&self.key_name) {
            Ok(bytes) => EncryptionKey::from_bytes(&bytes)?,
            Err(err) if err.is_not_found() => {
                debug!(name = %self.key_name, "no stored key, generating");
                let candidate = EncryptionKey::generate();
                self.store.save(&self.key_name, candidate.as_bytes())?;
                // The store is the source of truth: if another writer won
                // a race on creation, adopt its copy and drop ours.
                let persisted = self.store.retrieve(&self.key_name)?;
                EncryptionKey::from_bytes(&persisted)?
            }
            Err(err) => return Err(err.into()),
        };

        *cached = Some(key.clone());
        Ok(key)
    }
}

impl<S: CredentialStore> std::fmt::Debug for SecretManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretManager")
            .field("key_name", &self.key_name)
            .field("cached", &self.cached.lock().is_some())
            .finish()
    }
}
