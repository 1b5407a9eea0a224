//! Sync engine state machine.

use crate::channel::{RecordStore, RemoteChannel, SnapshotCipher};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::record::{merge, Record, Snapshot, SyncMetadata};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// The current status of the sync engine.
///
/// `Success` and `Error` are transient: after the configured quiescent
/// delay the host calls [`SyncEngine::reset_to_idle`] and the status
/// returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// No round in flight.
    Idle,
    /// A full pull-merge-push round is running.
    Syncing,
    /// A pull-only reaction to a remote-change notification is running.
    Loading,
    /// The last round completed successfully.
    Success,
    /// The last round failed; the error is retained for inspection.
    Error,
}

impl SyncStatus {
    /// Returns true while a round or reactive pull is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, SyncStatus::Syncing | SyncStatus::Loading)
    }

    /// Returns true for the transient terminal states.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Success | SyncStatus::Error)
    }
}

/// Reason code attached to a remote-change notification.
///
/// Only the first two are acted on; anything else is ignored without a
/// state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    /// Another device pushed a new snapshot.
    ServerChange,
    /// The channel delivered its initial state after subscribing.
    InitialSync,
    /// Any unrecognized reason.
    Other,
}

/// Statistics about sync rounds.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Completed pull-merge-push rounds.
    pub rounds_completed: u64,
    /// Total records pulled across rounds and reactive pulls.
    pub records_pulled: u64,
    /// Total records pushed.
    pub records_pushed: u64,
    /// Message of the last failure, if any.
    pub last_error: Option<String>,
}

/// Outcome of a [`SyncEngine::sync`] or
/// [`SyncEngine::handle_remote_change`] call.
#[derive(Debug, Clone)]
pub struct SyncRoundResult {
    /// False when the call was an idempotent no-op (a round was already
    /// in flight, or the change reason was not recognized).
    pub started: bool,
    /// Records pulled from the remote snapshot.
    pub records_pulled: usize,
    /// Records pushed in the new snapshot (zero for reactive pulls).
    pub records_pushed: usize,
    /// Token for [`SyncEngine::reset_to_idle`]; the host schedules that
    /// call after the configured idle delay.
    pub idle_epoch: u64,
}

impl SyncRoundResult {
    fn skipped(idle_epoch: u64) -> Self {
        Self {
            started: false,
            records_pulled: 0,
            records_pushed: 0,
            idle_epoch,
        }
    }
}

/// Drives snapshot synchronization against a remote key-value channel.
///
/// One engine instance owns all sync state; pull and push never run for
/// two rounds at once. A call to [`sync`](Self::sync) while a round is
/// in flight is an idempotent no-op, not an error, so callers may fire
/// it freely from UI refresh paths.
///
/// The engine creates no internal threads. Terminal states carry an
/// epoch token; the host schedules [`reset_to_idle`](Self::reset_to_idle)
/// after [`SyncConfig::idle_delay`], and a stale token from a superseded
/// round is a no-op.
pub struct SyncEngine<C: RemoteChannel, R: RecordStore> {
    config: SyncConfig,
    channel: Arc<C>,
    store: Arc<R>,
    cipher: Option<Arc<dyn SnapshotCipher>>,
    status: RwLock<SyncStatus>,
    progress: RwLock<f32>,
    last_error: RwLock<Option<String>>,
    last_sync_at: RwLock<Option<u64>>,
    stats: RwLock<SyncStats>,
    epoch: AtomicU64,
}

impl<C: RemoteChannel, R: RecordStore> SyncEngine<C, R> {
    /// Creates an engine syncing plaintext snapshots.
    pub fn new(config: SyncConfig, channel: Arc<C>, store: Arc<R>) -> Self {
        Self {
            config,
            channel,
            store,
            cipher: None,
            status: RwLock::new(SyncStatus::Idle),
            progress: RwLock::new(0.0),
            last_error: RwLock::new(None),
            last_sync_at: RwLock::new(None),
            stats: RwLock::new(SyncStats::default()),
            epoch: AtomicU64::new(0),
        }
    }

    /// Creates an engine that seals snapshots at rest through a cipher.
    pub fn with_cipher(
        config: SyncConfig,
        channel: Arc<C>,
        store: Arc<R>,
        cipher: Arc<dyn SnapshotCipher>,
    ) -> Self {
        let mut engine = Self::new(config, channel, store);
        engine.cipher = Some(cipher);
        engine
    }

    /// Returns the current status.
    pub fn status(&self) -> SyncStatus {
        *self.status.read()
    }

    /// Returns the progress fraction of the round in flight (0.0..=1.0).
    ///
    /// Purely for observers; carries no correctness meaning.
    pub fn progress(&self) -> f32 {
        *self.progress.read()
    }

    /// Returns the message of the last failed round, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Returns a copy of the engine statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the cached last-successful-sync time, if known.
    pub fn last_sync_at(&self) -> Option<u64> {
        *self.last_sync_at.read()
    }

    /// Returns the last-successful-sync time, reading the remote
    /// metadata key when nothing is cached yet (a fresh install sees
    /// the previous device's sync time this way).
    pub fn fetch_last_sync_at(&self) -> SyncResult<Option<u64>> {
        if let Some(at) = self.last_sync_at() {
            return Ok(Some(at));
        }
        let Some(bytes) = self.channel.read_value(&self.config.metadata_key)? else {
            return Ok(None);
        };
        let meta = SyncMetadata::decode(&bytes)?;
        *self.last_sync_at.write() = Some(meta.last_sync_at_ms);
        Ok(Some(meta.last_sync_at_ms))
    }

    /// Returns the epoch token of the most recent terminal transition.
    pub fn idle_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Performs a full pull-merge-push round.
    ///
    /// Returns with `started == false` when a round is already in
    /// flight. On failure of pull or push the status becomes `Error`,
    /// the error is retained, and sync metadata is not updated.
    pub fn sync(&self) -> SyncResult<SyncRoundResult> {
        if !self.try_begin(SyncStatus::Syncing) {
            debug!("sync requested while a round is in flight, ignoring");
            return Ok(SyncRoundResult::skipped(self.idle_epoch()));
        }

        self.set_progress(0.1);
        let (merged, pulled) = match self.pull_and_merge() {
            Ok(outcome) => outcome,
            Err(err) => return Err(self.fail_round(err)),
        };
        self.set_progress(0.5);

        if let Err(err) = self.push(&merged) {
            return Err(self.fail_round(err));
        }
        self.set_progress(1.0);

        let now = now_ms();
        self.record_metadata(now);

        let idle_epoch = self.complete(SyncStatus::Success);
        let mut stats = self.stats.write();
        stats.rounds_completed += 1;
        stats.records_pulled += pulled as u64;
        stats.records_pushed += merged.len() as u64;

        Ok(SyncRoundResult {
            started: true,
            records_pulled: pulled,
            records_pushed: merged.len(),
            idle_epoch,
        })
    }

    /// Reacts to a remote-change notification: pull and merge only, no
    /// push.
    ///
    /// Unrecognized reasons are ignored without any state change. A
    /// notification arriving while a round is in flight is dropped; the
    /// running round will pull the same state anyway.
    pub fn handle_remote_change(&self, reason: ChangeReason) -> SyncResult<SyncRoundResult> {
        if reason == ChangeReason::Other {
            debug!(?reason, "ignoring unrecognized change reason");
            return Ok(SyncRoundResult::skipped(self.idle_epoch()));
        }
        if !self.try_begin(SyncStatus::Loading) {
            debug!("change notification during a round, ignoring");
            return Ok(SyncRoundResult::skipped(self.idle_epoch()));
        }

        self.set_progress(0.1);
        let (_, pulled) = match self.pull_and_merge() {
            Ok(outcome) => outcome,
            Err(err) => return Err(self.fail_round(err)),
        };
        self.set_progress(1.0);

        let idle_epoch = self.complete(SyncStatus::Success);
        self.stats.write().records_pulled += pulled as u64;

        Ok(SyncRoundResult {
            started: true,
            records_pulled: pulled,
            records_pushed: 0,
            idle_epoch,
        })
    }

    /// Returns a terminal status to `Idle`.
    ///
    /// The host calls this after the quiescent delay with the epoch
    /// token from the round that finished. A stale token from a
    /// superseded round is a no-op, so a slow timer never clobbers a
    /// newer transition. Returns true if the reset happened.
    pub fn reset_to_idle(&self, idle_epoch: u64) -> bool {
        let mut status = self.status.write();
        if self.epoch.load(Ordering::SeqCst) != idle_epoch || !status.is_terminal() {
            return false;
        }
        *status = SyncStatus::Idle;
        true
    }

    /// Atomically claims the engine for a round.
    fn try_begin(&self, target: SyncStatus) -> bool {
        let mut status = self.status.write();
        if status.is_busy() {
            return false;
        }
        *status = target;
        *self.progress.write() = 0.0;
        *self.last_error.write() = None;
        true
    }

    /// Pull + merge + apply. Either everything is applied or nothing is.
    fn pull_and_merge(&self) -> SyncResult<(Vec<Record>, usize)> {
        let remote = match self.channel.read_value(&self.config.snapshot_key)? {
            // An absent snapshot is an empty remote set, not an error
            None => Vec::new(),
            Some(bytes) => {
                let plain = match &self.cipher {
                    Some(cipher) => cipher.open(&bytes)?,
                    None => bytes,
                };
                Snapshot::decode(&plain)?.records
            }
        };

        let local = self.store.records()?;
        let merged = merge(&local, &remote);
        self.store.replace_all(merged.clone())?;

        Ok((merged, remote.len()))
    }

    /// Serializes the merged set and overwrites the remote snapshot.
    fn push(&self, records: &[Record]) -> SyncResult<()> {
        let mut bytes = Snapshot::new(records.to_vec()).encode()?;
        if let Some(cipher) = &self.cipher {
            bytes = cipher.seal(&bytes)?;
        }
        self.channel.write_value(&self.config.snapshot_key, &bytes)
    }

    /// Persists the last-sync timestamp after a successful round.
    ///
    /// The round has already succeeded; a metadata write failure is
    /// logged and the local copy still updates.
    fn record_metadata(&self, now: u64) {
        let meta = SyncMetadata {
            last_sync_at_ms: now,
        };
        match meta.encode() {
            Ok(bytes) => {
                if let Err(err) = self.channel.write_value(&self.config.metadata_key, &bytes) {
                    warn!(%err, "failed to persist sync metadata remotely");
                }
            }
            Err(err) => warn!(%err, "failed to encode sync metadata"),
        }
        *self.last_sync_at.write() = Some(now);
    }

    fn fail_round(&self, err: SyncError) -> SyncError {
        warn!(%err, "sync round failed");
        *self.last_error.write() = Some(err.to_string());
        self.stats.write().last_error = Some(err.to_string());
        self.complete(SyncStatus::Error);
        err
    }

    /// Enters a terminal status and returns its fresh epoch token.
    fn complete(&self, status: SyncStatus) -> u64 {
        let mut current = self.status.write();
        *current = status;
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn set_progress(&self, fraction: f32) {
        *self.progress.write() = fraction;
    }
}

/// Current time in milliseconds since the Unix epoch.
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{MemoryRecordStore, MockChannel};
    use crate::config::DEFAULT_SNAPSHOT_KEY;

    fn rec(id: &str, t: u64, payload: &str) -> Record {
        Record::new(id, t, payload.as_bytes())
    }

    fn engine_with(
        local: Vec<Record>,
    ) -> (
        Arc<MockChannel>,
        Arc<MemoryRecordStore>,
        SyncEngine<MockChannel, MemoryRecordStore>,
    ) {
        let channel = Arc::new(MockChannel::new());
        let store = Arc::new(MemoryRecordStore::with_records(local));
        let engine = SyncEngine::new(SyncConfig::new(), Arc::clone(&channel), Arc::clone(&store));
        (channel, store, engine)
    }

    fn remote_snapshot(channel: &MockChannel) -> Snapshot {
        Snapshot::decode(&channel.value(DEFAULT_SNAPSHOT_KEY).unwrap()).unwrap()
    }

    #[test]
    fn status_helpers() {
        assert!(SyncStatus::Syncing.is_busy());
        assert!(SyncStatus::Loading.is_busy());
        assert!(!SyncStatus::Idle.is_busy());
        assert!(SyncStatus::Success.is_terminal());
        assert!(SyncStatus::Error.is_terminal());
        assert!(!SyncStatus::Syncing.is_terminal());
    }

    #[test]
    fn initial_state() {
        let (_, _, engine) = engine_with(vec![]);
        assert_eq!(engine.status(), SyncStatus::Idle);
        assert_eq!(engine.progress(), 0.0);
        assert!(engine.last_error().is_none());
        assert!(engine.last_sync_at().is_none());
    }

    #[test]
    fn round_with_absent_remote_pushes_local_set() {
        let (channel, _, engine) = engine_with(vec![rec("a", 100, "v1")]);

        let result = engine.sync().unwrap();
        assert!(result.started);
        assert_eq!(result.records_pulled, 0);
        assert_eq!(result.records_pushed, 1);

        assert_eq!(engine.status(), SyncStatus::Success);
        assert_eq!(engine.progress(), 1.0);
        assert_eq!(remote_snapshot(&channel).records, vec![rec("a", 100, "v1")]);
        assert!(engine.last_sync_at().is_some());
    }

    #[test]
    fn round_keeps_newer_local_version() {
        let (channel, store, engine) = engine_with(vec![rec("a", 200, "local")]);
        channel.set_value(
            DEFAULT_SNAPSHOT_KEY,
            Snapshot::new(vec![rec("a", 100, "remote")]).encode().unwrap(),
        );

        engine.sync().unwrap();

        assert_eq!(store.records().unwrap(), vec![rec("a", 200, "local")]);
        assert_eq!(
            remote_snapshot(&channel).records,
            vec![rec("a", 200, "local")]
        );
    }

    #[test]
    fn round_takes_newer_remote_version() {
        let (channel, store, engine) = engine_with(vec![rec("a", 100, "local")]);
        channel.set_value(
            DEFAULT_SNAPSHOT_KEY,
            Snapshot::new(vec![rec("a", 300, "remote"), rec("b", 50, "new")])
                .encode()
                .unwrap(),
        );

        let result = engine.sync().unwrap();
        assert_eq!(result.records_pulled, 2);
        assert_eq!(
            store.records().unwrap(),
            vec![rec("a", 300, "remote"), rec("b", 50, "new")]
        );
    }

    #[test]
    fn corrupted_snapshot_fails_round_without_side_effects() {
        let (channel, store, engine) = engine_with(vec![rec("a", 100, "v1")]);
        channel.set_value(DEFAULT_SNAPSHOT_KEY, b"not a snapshot".to_vec());

        let err = engine.sync().unwrap_err();
        assert!(matches!(err, SyncError::Data(_)));

        assert_eq!(engine.status(), SyncStatus::Error);
        assert!(engine.last_error().is_some());
        // Local set unchanged, metadata not updated
        assert_eq!(store.records().unwrap(), vec![rec("a", 100, "v1")]);
        assert!(engine.last_sync_at().is_none());
        // The corrupt remote value was not overwritten
        assert_eq!(channel.write_count(DEFAULT_SNAPSHOT_KEY), 0);
    }

    #[test]
    fn pull_failure_sets_error_state() {
        let (channel, _, engine) = engine_with(vec![rec("a", 100, "v1")]);
        channel.fail_next_read(SyncError::network_retryable("offline"));

        let err = engine.sync().unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(engine.status(), SyncStatus::Error);
        assert!(engine.last_sync_at().is_none());
    }

    #[test]
    fn push_failure_sets_error_state_after_merge_applied() {
        let (channel, store, engine) = engine_with(vec![rec("a", 100, "local")]);
        channel.set_value(
            DEFAULT_SNAPSHOT_KEY,
            Snapshot::new(vec![rec("b", 200, "remote")]).encode().unwrap(),
        );
        channel.fail_next_write(SyncError::network_retryable("offline"));

        assert!(engine.sync().is_err());
        assert_eq!(engine.status(), SyncStatus::Error);
        // Merge had already been applied locally before the push failed
        assert_eq!(store.records().unwrap().len(), 2);
        // Metadata untouched
        assert!(engine.last_sync_at().is_none());
    }

    #[test]
    fn reactive_pull_applies_remote_without_pushing() {
        let (channel, store, engine) = engine_with(vec![]);
        channel.set_value(
            DEFAULT_SNAPSHOT_KEY,
            Snapshot::new(vec![rec("a", 100, "remote")]).encode().unwrap(),
        );

        let result = engine.handle_remote_change(ChangeReason::ServerChange).unwrap();
        assert!(result.started);
        assert_eq!(result.records_pulled, 1);
        assert_eq!(result.records_pushed, 0);

        assert_eq!(engine.status(), SyncStatus::Success);
        assert_eq!(store.records().unwrap(), vec![rec("a", 100, "remote")]);
        assert_eq!(channel.write_count(DEFAULT_SNAPSHOT_KEY), 0);
    }

    #[test]
    fn initial_sync_reason_is_recognized() {
        let (_, _, engine) = engine_with(vec![]);
        let result = engine.handle_remote_change(ChangeReason::InitialSync).unwrap();
        assert!(result.started);
        assert_eq!(engine.status(), SyncStatus::Success);
    }

    #[test]
    fn unrecognized_reason_is_ignored() {
        let (_, _, engine) = engine_with(vec![]);
        let result = engine.handle_remote_change(ChangeReason::Other).unwrap();
        assert!(!result.started);
        assert_eq!(engine.status(), SyncStatus::Idle);
    }

    #[test]
    fn reset_to_idle_with_fresh_epoch() {
        let (_, _, engine) = engine_with(vec![]);
        let result = engine.sync().unwrap();
        assert_eq!(engine.status(), SyncStatus::Success);

        assert!(engine.reset_to_idle(result.idle_epoch));
        assert_eq!(engine.status(), SyncStatus::Idle);
    }

    #[test]
    fn stale_epoch_does_not_clobber_newer_round() {
        let (_, _, engine) = engine_with(vec![]);
        let first = engine.sync().unwrap();
        assert!(engine.reset_to_idle(first.idle_epoch));

        let second = engine.sync().unwrap();
        // The first round's timer fires late: no-op
        assert!(!engine.reset_to_idle(first.idle_epoch));
        assert_eq!(engine.status(), SyncStatus::Success);

        assert!(engine.reset_to_idle(second.idle_epoch));
        assert_eq!(engine.status(), SyncStatus::Idle);
    }

    #[test]
    fn reset_from_idle_is_noop() {
        let (_, _, engine) = engine_with(vec![]);
        assert!(!engine.reset_to_idle(engine.idle_epoch()));
    }

    #[test]
    fn stats_accumulate_across_rounds() {
        let (channel, _, engine) = engine_with(vec![rec("a", 100, "v1")]);
        let first = engine.sync().unwrap();
        engine.reset_to_idle(first.idle_epoch);

        channel.set_value(
            DEFAULT_SNAPSHOT_KEY,
            Snapshot::new(vec![rec("b", 50, "remote")]).encode().unwrap(),
        );
        engine.sync().unwrap();

        let stats = engine.stats();
        assert_eq!(stats.rounds_completed, 2);
        assert_eq!(stats.records_pulled, 1); // only the second round had a remote snapshot
        assert_eq!(stats.records_pushed, 3); // 1 then 2
        assert!(stats.last_error.is_none());
    }

    #[test]
    fn metadata_round_trip_via_remote_key() {
        let (channel, _, first) = engine_with(vec![rec("a", 1, "v")]);
        first.sync().unwrap();
        let synced_at = first.last_sync_at().unwrap();

        // A second device with no local metadata reads the remote copy
        let other_store = Arc::new(MemoryRecordStore::new());
        let second = SyncEngine::new(SyncConfig::new(), Arc::clone(&channel), other_store);
        assert_eq!(second.fetch_last_sync_at().unwrap(), Some(synced_at));
        assert_eq!(second.last_sync_at(), Some(synced_at));
    }

    #[test]
    fn fetch_last_sync_at_absent_metadata_is_none() {
        let (_, _, engine) = engine_with(vec![]);
        assert_eq!(engine.fetch_last_sync_at().unwrap(), None);
    }
}
