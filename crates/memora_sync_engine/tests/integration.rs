//! Integration tests: multi-device convergence, encrypted snapshots,
//! and the concurrency contract.

use memora_crypto::{MemoryCredentialStore, SecretManager};
use memora_sync_engine::{
    ChangeReason, MemoryRecordStore, MockChannel, Record, RecordStore, RemoteChannel, Snapshot,
    SnapshotCipher, SyncConfig, SyncEngine, SyncError, SyncResult, SyncStatus,
    DEFAULT_SNAPSHOT_KEY,
};
use std::sync::{Arc, Barrier};

fn rec(id: &str, t: u64, payload: &str) -> Record {
    Record::new(id, t, payload.as_bytes())
}

fn engine_for(
    channel: &Arc<MockChannel>,
    store: &Arc<MemoryRecordStore>,
) -> SyncEngine<MockChannel, MemoryRecordStore> {
    SyncEngine::new(SyncConfig::new(), Arc::clone(channel), Arc::clone(store))
}

#[test]
fn two_devices_converge_through_the_shared_channel() {
    let channel = Arc::new(MockChannel::new());

    let store_a = Arc::new(MemoryRecordStore::with_records(vec![
        rec("breakfast", 100, "porridge"),
        rec("walk", 300, "forest, device A edit"),
    ]));
    let store_b = Arc::new(MemoryRecordStore::with_records(vec![
        rec("walk", 200, "forest"),
        rec("dinner", 150, "soup"),
    ]));

    let engine_a = engine_for(&channel, &store_a);
    let engine_b = engine_for(&channel, &store_b);

    // A pushes first, B pulls A's state, merges, pushes, then A pulls
    engine_a.sync().unwrap();
    engine_b.sync().unwrap();
    let a_first = engine_a.sync().unwrap();
    assert!(a_first.started);

    let expected = vec![
        rec("breakfast", 100, "porridge"),
        rec("dinner", 150, "soup"),
        rec("walk", 300, "forest, device A edit"),
    ];
    assert_eq!(store_a.records().unwrap(), expected);
    assert_eq!(store_b.records().unwrap(), expected);

    // Push-then-pull returns exactly the pushed set
    let remote = Snapshot::decode(&channel.value(DEFAULT_SNAPSHOT_KEY).unwrap()).unwrap();
    assert_eq!(remote.records, expected);
}

#[test]
fn reactive_pull_propagates_another_devices_push() {
    let channel = Arc::new(MockChannel::new());
    let store_a = Arc::new(MemoryRecordStore::with_records(vec![rec("a", 1, "hello")]));
    let store_b = Arc::new(MemoryRecordStore::new());

    let engine_a = engine_for(&channel, &store_a);
    let engine_b = engine_for(&channel, &store_b);

    engine_a.sync().unwrap();
    engine_b
        .handle_remote_change(ChangeReason::ServerChange)
        .unwrap();

    assert_eq!(store_b.records().unwrap(), vec![rec("a", 1, "hello")]);
    // B never pushed
    assert_eq!(channel.write_count(DEFAULT_SNAPSHOT_KEY), 1);
}

#[test]
fn encrypted_snapshots_roundtrip_between_engines_sharing_a_key() {
    let channel = Arc::new(MockChannel::new());
    let cipher: Arc<dyn SnapshotCipher> =
        Arc::new(SecretManager::new(MemoryCredentialStore::new()));

    let store_a = Arc::new(MemoryRecordStore::with_records(vec![rec("a", 10, "secret")]));
    let engine_a = SyncEngine::with_cipher(
        SyncConfig::new(),
        Arc::clone(&channel),
        Arc::clone(&store_a),
        Arc::clone(&cipher),
    );
    engine_a.sync().unwrap();

    // The stored bytes are sealed: not a decodable snapshot
    let raw = channel.value(DEFAULT_SNAPSHOT_KEY).unwrap();
    assert!(Snapshot::decode(&raw).is_err());

    // A second engine with the same installation key reads it fine
    let store_b = Arc::new(MemoryRecordStore::new());
    let engine_b = SyncEngine::with_cipher(
        SyncConfig::new(),
        Arc::clone(&channel),
        Arc::clone(&store_b),
        cipher,
    );
    engine_b.sync().unwrap();
    assert_eq!(store_b.records().unwrap(), vec![rec("a", 10, "secret")]);
}

#[test]
fn tampered_encrypted_snapshot_fails_the_round() {
    let channel = Arc::new(MockChannel::new());
    let cipher: Arc<dyn SnapshotCipher> =
        Arc::new(SecretManager::new(MemoryCredentialStore::new()));

    let store = Arc::new(MemoryRecordStore::with_records(vec![rec("a", 10, "secret")]));
    let engine = SyncEngine::with_cipher(
        SyncConfig::new(),
        Arc::clone(&channel),
        Arc::clone(&store),
        cipher,
    );
    engine.sync().unwrap();

    // Flip one bit in the sealed snapshot
    let mut raw = channel.value(DEFAULT_SNAPSHOT_KEY).unwrap();
    let len = raw.len();
    raw[len - 1] ^= 0x01;
    channel.set_value(DEFAULT_SNAPSHOT_KEY, raw);

    let err = engine.sync().unwrap_err();
    assert!(matches!(err, SyncError::Crypto(_)));
    assert_eq!(engine.status(), SyncStatus::Error);
    // The local set was not touched by the failed round
    assert_eq!(store.records().unwrap(), vec![rec("a", 10, "secret")]);
}

/// A channel whose first read parks on a barrier, holding a round in
/// flight so a second sync call can be observed as a no-op.
struct BlockingChannel {
    inner: MockChannel,
    gate: Barrier,
}

impl RemoteChannel for BlockingChannel {
    fn read_value(&self, key: &str) -> SyncResult<Option<Vec<u8>>> {
        self.gate.wait();
        self.gate.wait();
        self.inner.read_value(key)
    }

    fn write_value(&self, key: &str, value: &[u8]) -> SyncResult<()> {
        self.inner.write_value(key, value)
    }
}

#[test]
fn sync_during_a_round_is_an_idempotent_noop() {
    let channel = Arc::new(BlockingChannel {
        inner: MockChannel::new(),
        gate: Barrier::new(2),
    });
    let store = Arc::new(MemoryRecordStore::with_records(vec![rec("a", 1, "v")]));
    let engine = Arc::new(SyncEngine::new(
        SyncConfig::new(),
        Arc::clone(&channel),
        Arc::clone(&store),
    ));

    let background = {
        let engine = Arc::clone(&engine);
        std::thread::spawn(move || engine.sync().unwrap())
    };

    // Wait until the background round is parked inside its pull
    channel.gate.wait();
    assert_eq!(engine.status(), SyncStatus::Syncing);

    let second = engine.sync().unwrap();
    assert!(!second.started);

    // Release the first round and let it finish
    channel.gate.wait();
    let first = background.join().unwrap();
    assert!(first.started);
    assert_eq!(engine.status(), SyncStatus::Success);

    // Exactly one push happened
    assert_eq!(channel.inner.write_count(DEFAULT_SNAPSHOT_KEY), 1);
}

#[test]
fn notification_during_a_round_is_dropped() {
    let channel = Arc::new(BlockingChannel {
        inner: MockChannel::new(),
        gate: Barrier::new(2),
    });
    let store = Arc::new(MemoryRecordStore::new());
    let engine = Arc::new(SyncEngine::new(
        SyncConfig::new(),
        Arc::clone(&channel),
        store,
    ));

    let background = {
        let engine = Arc::clone(&engine);
        std::thread::spawn(move || engine.sync().unwrap())
    };

    channel.gate.wait();
    let reaction = engine.handle_remote_change(ChangeReason::ServerChange).unwrap();
    assert!(!reaction.started);

    channel.gate.wait();
    background.join().unwrap();
}
