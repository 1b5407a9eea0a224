//! Composite two-tier cache.

use crate::disk::DiskTier;
use crate::error::CacheResult;
use crate::memory::{MemoryTier, MemoryTierConfig};
use bytes::Bytes;
use std::path::PathBuf;
use tracing::warn;

/// One of the two cache levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// The bounded in-memory tier.
    Memory,
    /// The persistent on-disk tier.
    Disk,
}

/// A two-tier cache for keyed blobs.
///
/// Reads check memory first and fall back to disk, promoting a disk hit
/// into the memory tier. Writes go memory first, then disk, so a crash
/// between the two leaves at worst a memory-only entry that disappears
/// on restart.
///
/// Disk failures are downgraded to misses and logged: the cache is a
/// best-effort optimization and never a correctness path, so nothing
/// here propagates as application-fatal.
#[derive(Debug)]
pub struct TieredCache {
    memory: MemoryTier,
    disk: DiskTier,
}

impl TieredCache {
    /// Opens a cache with its disk tier rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Fails only if the cache directory cannot be created; this is the
    /// one cache error worth surfacing, since without it the disk tier
    /// can never work.
    pub fn open(dir: impl Into<PathBuf>, config: MemoryTierConfig) -> CacheResult<Self> {
        Ok(Self {
            memory: MemoryTier::new(config),
            disk: DiskTier::open(dir)?,
        })
    }

    /// Stores a value at both tiers, memory first.
    ///
    /// `cost_hint` weighs the entry against the memory tier's cost
    /// bound; the payload byte size is used when `None`.
    pub fn put(&self, key: &str, value: Bytes, cost_hint: Option<usize>) {
        let cost = cost_hint.unwrap_or(value.len());
        self.memory.put(key, value.clone(), cost);

        if let Err(err) = self.disk.put(key, &value) {
            warn!(key, %err, "disk cache write failed, entry is memory-only");
        }
    }

    /// Returns the value for a key, checking memory then disk.
    ///
    /// A disk hit is promoted into the memory tier before returning.
    /// Never blocks on a network fetch; a double miss is `None`.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        if let Some(value) = self.memory.get(key) {
            return Some(value);
        }

        match self.disk.get(key) {
            Ok(Some(value)) => {
                self.memory.put(key, value.clone(), value.len());
                Some(value)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(key, %err, "disk cache read failed, treating as miss");
                None
            }
        }
    }

    /// Removes a key from both tiers.
    pub fn remove(&self, key: &str) {
        self.memory.remove(key);
        if let Err(err) = self.disk.remove(key) {
            warn!(key, %err, "disk cache remove failed");
        }
    }

    /// Clears one tier, leaving the other untouched.
    pub fn clear(&self, tier: Tier) {
        match tier {
            Tier::Memory => self.memory.clear(),
            Tier::Disk => {
                if let Err(err) = self.disk.clear() {
                    warn!(%err, "disk cache clear failed");
                }
            }
        }
    }

    /// Drops the whole memory tier. Wire this to the host's low-memory
    /// signal.
    pub fn handle_low_memory(&self) {
        self.memory.clear();
    }

    /// Returns the memory tier, for inspection.
    pub fn memory(&self) -> &MemoryTier {
        &self.memory
    }

    /// Returns the disk tier, for inspection.
    pub fn disk(&self) -> &DiskTier {
        &self.disk
    }
}
