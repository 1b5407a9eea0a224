//! # Memora Sync Engine
//!
//! Snapshot synchronization for Memora's local record set against a
//! remote eventually-consistent key-value channel.
//!
//! This crate provides:
//! - Sync status state machine (idle → syncing → success/error → idle)
//! - Full-snapshot pull-merge-push rounds
//! - Deterministic last-writer-wins merge (ties prefer local)
//! - Reactive pull on remote-change notifications
//! - Optional at-rest snapshot encryption via `memora_crypto`
//!
//! ## Architecture
//!
//! One round is: pull the remote snapshot, merge it with the local set
//! by timestamp, apply the merged set locally, push the merged set as
//! the new remote snapshot. The remote key holds exactly one snapshot,
//! not a log, so pull-before-push ordering is what keeps overlapping
//! pushers from losing each other's records.
//!
//! ## Key Invariants
//!
//! - Pull always completes before push; the pushed state is the merged
//!   state, never the pre-merge local state.
//! - Two rounds never interleave; a sync call during a round is an
//!   idempotent no-op.
//! - A failed round applies nothing partially and never touches the
//!   last-sync metadata.
//! - The merge adds and overwrites; it never removes an identifier by
//!   absence.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod channel;
mod config;
mod error;
mod record;
mod state;

pub use channel::{
    MemoryRecordStore, MockChannel, RecordStore, RemoteChannel, SnapshotCipher,
};
pub use config::{SyncConfig, DEFAULT_METADATA_KEY, DEFAULT_SNAPSHOT_KEY};
pub use error::{SyncError, SyncResult};
pub use record::{merge, Record, Snapshot, SyncMetadata};
pub use state::{ChangeReason, SyncEngine, SyncRoundResult, SyncStats, SyncStatus};
