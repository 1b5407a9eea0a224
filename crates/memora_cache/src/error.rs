//! Error types for cache operations.

use std::io;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur in the disk tier.
///
/// These never escape [`crate::TieredCache`]: the composite surface
/// treats the cache as best-effort and downgrades failures to misses.
#[derive(Debug, Error)]
pub enum CacheError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The key cannot be mapped to a file name.
    #[error("invalid cache key: {reason}")]
    InvalidKey {
        /// Why the key was rejected.
        reason: String,
    },
}

impl CacheError {
    /// Creates an invalid-key error.
    pub fn invalid_key(reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            reason: reason.into(),
        }
    }
}
