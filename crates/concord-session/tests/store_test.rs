//! Room store integration tests with Oracle checks
//!
//! These tests verify the store abstraction's invariants:
//! - Load returns the last saved snapshot
//! - Room names survive arbitrary characters
//! - Fresh processes seed rooms from the store and list stored rooms
//! - Deleting a room removes its stored snapshot

use std::{
    collections::BTreeSet,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use concord_core::{Environment, RoomSnapshot, StateMap, SyncOutcome, Timestamp, Value};
use concord_session::{
    DirectoryStore, HubConfig, MemoryStore, RoomStore, Rooms, RoomsConfig, StoreError,
};
use proptest::prelude::*;

#[derive(Clone, Default)]
struct TestEnv {
    clock: Arc<AtomicU64>,
}

impl Environment for TestEnv {
    fn wall_clock_micros(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        let next = self.clock.fetch_add(1, Ordering::SeqCst);
        for (byte, id_byte) in buffer.iter_mut().zip(next.to_le_bytes().iter().cycle()) {
            *byte = *id_byte;
        }
    }
}

fn snapshot(name: &str, micros: u64, pairs: &[(&str, i64)]) -> RoomSnapshot {
    RoomSnapshot {
        name: name.to_string(),
        last_updated: Timestamp::from_micros(micros),
        state: pairs.iter().map(|(k, v)| ((*k).to_string(), Value::from(*v))).collect(),
    }
}

// Oracle: every store behaves the same on the basic contract
fn verify_store_contract(store: &dyn RoomStore) {
    assert!(store.room_names().expect("room_names failed").is_empty());
    assert_eq!(store.load("r1").expect("load failed"), None);

    let first = snapshot("r1", 10, &[("x", 1)]);
    store.save(&first).expect("save failed");
    assert_eq!(store.load("r1").expect("load failed"), Some(first));

    let second = snapshot("r1", 20, &[("x", 1), ("y", 2)]);
    store.save(&second).expect("save failed");
    assert_eq!(store.load("r1").expect("load failed"), Some(second));

    store.save(&snapshot("r2", 5, &[])).expect("save failed");
    assert_eq!(
        store.room_names().expect("room_names failed"),
        BTreeSet::from(["r1".to_string(), "r2".to_string()])
    );

    store.remove("r1").expect("remove failed");
    store.remove("never-saved").expect("remove of unknown room must succeed");
    assert_eq!(store.load("r1").expect("load failed"), None);
    assert_eq!(store.room_names().expect("room_names failed"), BTreeSet::from(["r2".to_string()]));
}

#[test]
fn memory_store_contract() {
    verify_store_contract(&MemoryStore::new());
}

#[test]
fn directory_store_contract() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    verify_store_contract(&DirectoryStore::open(dir.path()).expect("open failed"));
}

#[test]
fn directory_store_ignores_foreign_files() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    std::fs::write(dir.path().join("README.txt"), b"not a room").expect("write failed");
    let store = DirectoryStore::open(dir.path()).expect("open failed");

    assert!(store.room_names().expect("room_names failed").is_empty());
}

#[test]
fn directory_store_reports_corrupt_files() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    let store = DirectoryStore::open(dir.path()).expect("open failed");
    store.save(&snapshot("r1", 1, &[("x", 1)])).expect("save failed");

    let path = dir.path().join(format!("{}.room", hex::encode("r1")));
    std::fs::write(&path, b"\xff\xff garbage").expect("write failed");

    assert!(matches!(store.load("r1"), Err(StoreError::Decode { .. })));
}

#[test]
fn fresh_process_seeds_from_store() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    let config = RoomsConfig { hub: HubConfig::default(), store_dir: Some(dir.path().into()) };

    {
        let rooms = Rooms::new(TestEnv::default(), config.clone()).expect("rooms failed");
        let mut a = rooms.connect();
        rooms.enter(&mut a, "lobby").expect("enter failed");
        a.set("x", 1);
        assert!(matches!(rooms.sync_now(&mut a), Ok(SyncOutcome::Pushed { .. })));
    }

    let rooms = Rooms::new(TestEnv::default(), config).expect("rooms failed");
    assert_eq!(rooms.list_known_rooms(), BTreeSet::from(["lobby".to_string()]));

    let mut b = rooms.connect();
    rooms.enter(&mut b, "lobby").expect("enter failed");
    assert!(rooms.sync_now(&mut b).expect("sync failed").requires_restart());
    assert_eq!(b.get("x"), Some(&Value::from(1)));

    rooms.delete("lobby");
    assert!(rooms.list_known_rooms().is_empty());
    let reopened = DirectoryStore::open(dir.path()).expect("open failed");
    assert!(reopened.room_names().expect("room_names failed").is_empty());
}

#[test]
fn seeding_never_overrides_live_state() {
    let store = Arc::new(MemoryStore::new());
    store.save(&snapshot("r1", 5, &[("x", 100)])).expect("save failed");

    let rooms = Rooms::with_store(TestEnv::default(), HubConfig::default(), store.clone());
    let mut a = rooms.connect();
    rooms.enter(&mut a, "r1").expect("enter failed");

    // First access seeds; the session is stale and pulls
    assert!(rooms.sync_now(&mut a).expect("sync failed").requires_restart());
    a.set("x", 1);
    rooms.sync_now(&mut a).expect("sync failed");

    let stored = store.load("r1").expect("load failed").expect("room persisted");
    assert_eq!(stored.state, StateMap::from([("x".to_string(), Value::from(1))]));
    assert_eq!(stored, rooms.room_snapshot("r1"));
}

#[test]
fn directory_store_survives_concurrent_saves() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    let store = Arc::new(DirectoryStore::open(dir.path()).expect("open failed"));

    let handles: Vec<_> = (0..4_u64)
        .map(|writer| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for round in 0..100_u64 {
                    let micros = round * 4 + writer + 1;
                    store.save(&snapshot("r", micros, &[("w", writer as i64)])).expect("save");
                    let loaded = store.load("r").expect("load").expect("room missing");
                    assert_eq!(loaded.name, "r");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("writer panicked");
    }

    assert_eq!(store.room_names().expect("room_names failed"), BTreeSet::from(["r".to_string()]));
    let leftovers = std::fs::read_dir(dir.path()).expect("read_dir failed").count();
    assert_eq!(leftovers, 1, "temporary files must not linger");
}

#[test]
fn concurrent_pushes_persist_the_latest_state() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    let config = RoomsConfig { hub: HubConfig::default(), store_dir: Some(dir.path().into()) };
    let rooms = Arc::new(Rooms::new(TestEnv::default(), config).expect("rooms failed"));

    let handles: Vec<_> = (0..4_i64)
        .map(|index| {
            let rooms = Arc::clone(&rooms);
            std::thread::spawn(move || {
                let mut session = rooms.connect();
                rooms.enter(&mut session, "shared").expect("enter failed");
                let mut pushed = 0;
                while pushed < 20 {
                    session.set(format!("k{index}"), pushed);
                    let outcome = rooms.sync_now(&mut session).expect("sync failed");
                    if matches!(outcome, SyncOutcome::Pushed { .. }) {
                        pushed += 1;
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("session panicked");
    }

    let stored = DirectoryStore::open(dir.path())
        .expect("open failed")
        .load("shared")
        .expect("load failed")
        .expect("room persisted");
    assert_eq!(stored, rooms.room_snapshot("shared"));
}

proptest! {
    /// Any room name survives the directory store's file naming.
    #[test]
    fn prop_directory_store_room_names(names in prop::collection::btree_set("\\PC{0,24}", 1..6)) {
        let names: BTreeSet<String> = names.into_iter().filter(|n| !n.is_empty()).collect();
        let dir = tempfile::tempdir().expect("tempdir failed");
        let store = DirectoryStore::open(dir.path()).expect("open failed");

        for (i, name) in names.iter().enumerate() {
            store.save(&snapshot(name, i as u64 + 1, &[("i", i as i64)])).expect("save failed");
        }

        prop_assert_eq!(store.room_names().expect("room_names failed"), names.clone());
        for name in &names {
            let loaded = store.load(name).expect("load failed").expect("room missing");
            prop_assert_eq!(&loaded.name, name);
        }
    }
}
