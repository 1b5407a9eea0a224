//! Error types for crypto operations.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors returned by the credential store collaborator.
///
/// `NotFound` must stay distinguishable from every other failure kind:
/// it is the only store outcome that permits generating a new key.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialStoreError {
    /// No item exists under the requested name.
    #[error("credential item not found: {name}")]
    NotFound {
        /// The logical name that was looked up.
        name: String,
    },

    /// The store refused access (locked keychain, denied entitlement).
    #[error("credential store access denied: {0}")]
    AccessDenied(String),

    /// The store returned an entry it could not read back intact.
    #[error("credential store entry corrupted: {0}")]
    Corrupted(String),

    /// Any other store failure.
    #[error("credential store error: {0}")]
    Other(String),
}

impl CredentialStoreError {
    /// Returns true if this is the miss signal rather than a real failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CredentialStoreError::NotFound { .. })
    }
}

/// Errors that can occur during encryption, decryption, or key handling.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The credential store failed in a way that is not a simple miss.
    #[error("credential store failure: {0}")]
    Store(#[from] CredentialStoreError),

    /// Encryption itself failed.
    #[error("encryption failed: {message}")]
    EncryptionFailed {
        /// Description of the failure.
        message: String,
    },

    /// The ciphertext failed authentication: tampered data or wrong key.
    #[error("decryption failed authentication")]
    AuthenticationFailed,

    /// A persisted key had the wrong length.
    #[error("invalid key size: expected {expected} bytes, got {actual}")]
    InvalidKeySize {
        /// Expected key length in bytes.
        expected: usize,
        /// Actual length found.
        actual: usize,
    },
}

impl CryptoError {
    /// Creates an encryption failure with a message.
    pub fn encryption_failed(message: impl Into<String>) -> Self {
        Self::EncryptionFailed {
            message: message.into(),
        }
    }
}
