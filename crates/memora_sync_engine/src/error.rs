//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Pull/push transport failure. Retry is at the caller's
    /// discretion; the engine never retries internally.
    #[error("network error: {message}")]
    Network {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// A snapshot could not be deserialized. The round fails and no
    /// partial merge is ever applied.
    #[error("data error: {0}")]
    Data(String),

    /// Key retrieval or snapshot seal/open failure.
    #[error("crypto error: {0}")]
    Crypto(#[from] memora_crypto::CryptoError),

    /// The host record store failed to read or replace the record set.
    #[error("record store error: {0}")]
    Store(String),
}

impl SyncError {
    /// Creates a retryable network error.
    pub fn network_retryable(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable network error.
    pub fn network_fatal(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Network { retryable: true, .. })
    }
}
