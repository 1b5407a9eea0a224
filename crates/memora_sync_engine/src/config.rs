//! Configuration for the sync engine.

use std::time::Duration;

/// Well-known remote key for the snapshot by default.
pub const DEFAULT_SNAPSHOT_KEY: &str = "memora/snapshot";
/// Well-known remote key for sync metadata by default.
pub const DEFAULT_METADATA_KEY: &str = "memora/metadata";

/// Configuration for sync rounds.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Remote key the full snapshot is stored at.
    pub snapshot_key: String,
    /// Remote key the sync metadata is stored at.
    pub metadata_key: String,
    /// Quiescent delay before a terminal status returns to idle.
    /// The host schedules [`SyncEngine::reset_to_idle`] after this long
    /// so status observers can display a transient indicator.
    ///
    /// [`SyncEngine::reset_to_idle`]: crate::SyncEngine::reset_to_idle
    pub idle_delay: Duration,
}

impl SyncConfig {
    /// Creates a configuration with the default keys and a 3s idle delay.
    pub fn new() -> Self {
        Self {
            snapshot_key: DEFAULT_SNAPSHOT_KEY.into(),
            metadata_key: DEFAULT_METADATA_KEY.into(),
            idle_delay: Duration::from_secs(3),
        }
    }

    /// Sets the snapshot key.
    pub fn with_snapshot_key(mut self, key: impl Into<String>) -> Self {
        self.snapshot_key = key.into();
        self
    }

    /// Sets the metadata key.
    pub fn with_metadata_key(mut self, key: impl Into<String>) -> Self {
        self.metadata_key = key.into();
        self
    }

    /// Sets the idle-reset delay.
    pub fn with_idle_delay(mut self, delay: Duration) -> Self {
        self.idle_delay = delay;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}
