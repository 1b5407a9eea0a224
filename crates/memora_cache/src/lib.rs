//! # Memora Cache
//!
//! A two-tier blob cache: a bounded in-memory tier in front of an
//! unbounded on-disk tier.
//!
//! ## Design Principles
//!
//! - The cache is a best-effort optimization, never a correctness path:
//!   disk I/O failures are logged and swallowed, reads degrade to a miss.
//! - A value found only on disk is promoted into the memory tier on hit,
//!   so the second read within the process lifetime is fast.
//! - Writes go memory first, then disk. A crash between the two leaves
//!   at worst a memory-only entry that vanishes on restart; disk entries
//!   are written atomically per key and are never half-written.
//! - The cache never fetches from a network source. Composing a miss
//!   with an external fetch and a `put` of the result is the caller's
//!   job.
//!
//! ## Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use memora_cache::{MemoryTierConfig, TieredCache};
//!
//! let cache = TieredCache::open("cache-dir", MemoryTierConfig::default()).unwrap();
//! cache.put("avatar/jo", Bytes::from_static(b"png bytes"), None);
//! assert_eq!(cache.get("avatar/jo").unwrap(), Bytes::from_static(b"png bytes"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod disk;
mod error;
mod memory;
mod tiered;

pub use disk::DiskTier;
pub use error::{CacheError, CacheResult};
pub use memory::{MemoryTier, MemoryTierConfig};
pub use tiered::{Tier, TieredCache};
