//! Bounded in-memory cache tier.

use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};

/// Configuration for the memory tier bounds.
#[derive(Debug, Clone)]
pub struct MemoryTierConfig {
    /// Maximum number of entries held at once.
    pub max_entries: usize,
    /// Maximum total cost weight held at once. The cost unit is
    /// caller-defined; byte size of the payload when no hint is given.
    pub max_cost: usize,
}

impl MemoryTierConfig {
    /// Creates a configuration with the given bounds.
    pub fn new(max_entries: usize, max_cost: usize) -> Self {
        Self {
            max_entries,
            max_cost,
        }
    }

    /// Sets the entry-count bound.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Sets the total-cost bound.
    pub fn with_max_cost(mut self, max_cost: usize) -> Self {
        self.max_cost = max_cost;
        self
    }
}

impl Default for MemoryTierConfig {
    fn default() -> Self {
        // 256 entries / 32 MiB, sized for thumbnail-class blobs
        Self::new(256, 32 * 1024 * 1024)
    }
}

struct Entry {
    value: Bytes,
    cost: usize,
}

struct Inner {
    entries: HashMap<String, Entry>,
    // Insertion order; front entries are evicted first. Callers get no
    // recency promise beyond "recently set entries are likelier to
    // survive".
    order: VecDeque<String>,
    total_cost: usize,
}

/// The bounded in-memory cache tier.
///
/// Thread-safe for concurrent readers and writers. Entries do not
/// survive a process restart.
pub struct MemoryTier {
    config: MemoryTierConfig,
    inner: RwLock<Inner>,
}

impl MemoryTier {
    /// Creates an empty memory tier with the given bounds.
    pub fn new(config: MemoryTierConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                total_cost: 0,
            }),
        }
    }

    /// Inserts or replaces a value, then evicts until both bounds hold.
    pub fn put(&self, key: &str, value: Bytes, cost: usize) {
        let mut inner = self.inner.write();

        if let Some(old) = inner.entries.remove(key) {
            inner.total_cost -= old.cost;
            inner.order.retain(|k| k != key);
        }

        inner.total_cost += cost;
        inner.order.push_back(key.to_owned());
        inner.entries.insert(key.to_owned(), Entry { value, cost });

        while inner.entries.len() > self.config.max_entries
            || inner.total_cost > self.config.max_cost
        {
            let Some(victim) = inner.order.pop_front() else {
                break;
            };
            if let Some(evicted) = inner.entries.remove(&victim) {
                inner.total_cost -= evicted.cost;
            }
        }
    }

    /// Returns the value for a key, if cached.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.inner.read().entries.get(key).map(|e| e.value.clone())
    }

    /// Removes a key, if present.
    pub fn remove(&self, key: &str) {
        let mut inner = self.inner.write();
        if let Some(old) = inner.entries.remove(key) {
            inner.total_cost -= old.cost;
            inner.order.retain(|k| k != key);
        }
    }

    /// Drops every entry. Wired to the host's low-memory signal.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.order.clear();
        inner.total_cost = 0;
    }

    /// Returns the number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Returns true if the tier holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// Returns the current total cost weight.
    pub fn total_cost(&self) -> usize {
        self.inner.read().total_cost
    }
}

impl std::fmt::Debug for MemoryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("MemoryTier")
            .field("entries", &inner.entries.len())
            .field("total_cost", &inner.total_cost)
            .field("config", &self.config)
            .finish()
    }
}
