//! # Memora Crypto
//!
//! Secret key lifecycle and authenticated encryption for Memora.
//!
//! This crate owns exactly one symmetric key per installation. The key is
//! created lazily on first use, persisted to a secure credential store,
//! and cached in memory for the process lifetime. Data is protected with
//! AES-256-GCM, so decryption fails loudly on tampering or a wrong key
//! instead of returning garbage.
//!
//! ## Key recovery rules
//!
//! - A cached key is always preferred over a store lookup.
//! - A store miss (`NotFound`) is the only condition under which a new
//!   key is generated. Any other store failure is surfaced, because
//!   generating a fresh key while an existing one might still be
//!   recoverable would orphan previously encrypted data.
//! - After persisting a freshly generated key, the store copy is
//!   re-fetched and adopted: the credential store is the single source
//!   of truth if two devices or callers raced on creation.
//!
//! ## Example
//!
//! ```rust
//! use memora_crypto::{MemoryCredentialStore, SecretManager};
//!
//! let manager = SecretManager::new(MemoryCredentialStore::new());
//! let ciphertext = manager.encrypt(b"dear diary").unwrap();
//! let plaintext = manager.decrypt(&ciphertext).unwrap();
//! assert_eq!(plaintext, b"dear diary");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod key;
mod manager;
mod store;

pub use error::{CredentialStoreError, CryptoError, CryptoResult};
pub use key::{EncryptionKey, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use manager::{SecretManager, DEFAULT_KEY_NAME};
pub use store::{CredentialStore, MemoryCredentialStore};
