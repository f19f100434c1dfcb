//! Room selection and per-pass reconciliation for local sessions.
//!
//! [`Rooms`] owns the room registry, the session hub and the optional store,
//! and is the only thing session-driving code talks to:
//!
//! ```text
//! connect() ──► enter(room) ──► run_pass(body) ─┬─► Completed
//!                                ▲              └─► Restart ──┐
//!                                └────────────────────────────┘
//! ```
//!
//! Store access is best-effort. A failing store is logged and otherwise
//! ignored; the in-process registry stays authoritative. Saves and deletes
//! of one room are serialized, and a save never replaces a newer one.

use std::{collections::BTreeSet, fmt, path::PathBuf, sync::Arc};

use concord_core::{
    Environment, Room, RoomRegistry, RoomSnapshot, SessionAdapter, StateMap, SyncOutcome,
    Timestamp,
};
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;

use crate::{
    error::SessionError,
    hub::{HubConfig, SessionHub},
    local::LocalSession,
    store::{DirectoryStore, RoomStore},
};

/// Configuration for [`Rooms`].
#[derive(Debug, Clone, Default)]
pub struct RoomsConfig {
    /// Restart channel settings.
    pub hub: HubConfig,
    /// Directory for persisted rooms. `None` keeps rooms in memory only.
    pub store_dir: Option<PathBuf>,
}

/// Result of [`Rooms::run_pass`].
#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome<T> {
    /// The body ran and the closing reconciliation did not invalidate it.
    Completed {
        /// Value returned by the body.
        output: T,
        /// Closing reconciliation.
        sync: SyncOutcome,
    },
    /// The room moved on; start the pass over.
    Restart,
}

impl<T> PassOutcome<T> {
    /// Whether the caller must run the pass again.
    pub fn requires_restart(&self) -> bool {
        matches!(self, Self::Restart)
    }
}

/// Human-readable room occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomStatus {
    /// Registered sessions.
    pub active_sessions: usize,
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.active_sessions {
            0 => f.write_str("empty"),
            1 => f.write_str("1 active session"),
            n => write!(f, "{n} active sessions"),
        }
    }
}

/// Entry point for session-driving code.
pub struct Rooms<E>
where
    E: Environment,
{
    registry: RoomRegistry<E>,
    hub: SessionHub,
    store: Option<Arc<dyn RoomStore>>,
    /// Rooms already checked against the store since creation or deletion.
    seeded: DashSet<String>,
    /// Per-room store lock holding the timestamp of the last save.
    saved: DashMap<String, Arc<Mutex<Timestamp>>>,
}

impl<E> Rooms<E>
where
    E: Environment,
{
    /// Create rooms with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Store` if `config.store_dir` cannot be opened.
    pub fn new(env: E, config: RoomsConfig) -> Result<Self, SessionError> {
        let store: Option<Arc<dyn RoomStore>> = match config.store_dir {
            Some(dir) => Some(Arc::new(DirectoryStore::open(dir)?)),
            None => None,
        };
        Ok(Self::build(env, config.hub, store))
    }

    /// Create in-memory rooms with default settings.
    pub fn in_memory(env: E) -> Self {
        Self::build(env, HubConfig::default(), None)
    }

    /// Create rooms persisted to `store`.
    pub fn with_store(env: E, hub: HubConfig, store: Arc<dyn RoomStore>) -> Self {
        Self::build(env, hub, Some(store))
    }

    fn build(env: E, hub: HubConfig, store: Option<Arc<dyn RoomStore>>) -> Self {
        Self {
            registry: RoomRegistry::new(env),
            hub: SessionHub::new(hub),
            store,
            seeded: DashSet::new(),
            saved: DashMap::new(),
        }
    }

    /// Room registry, for inspection.
    pub fn registry(&self) -> &RoomRegistry<E> {
        &self.registry
    }

    /// Session hub, for inspection.
    pub fn hub(&self) -> &SessionHub {
        &self.hub
    }

    /// Start a new session, not yet in any room.
    pub fn connect(&self) -> LocalSession {
        let (id, signals) = self.hub.connect(self.registry.env());
        LocalSession::new(id, signals)
    }

    /// End a session: leave its room and drop its restart channel.
    pub fn disconnect(&self, session: LocalSession) {
        if let Some(room) = session.room().and_then(|name| self.registry.get(name)) {
            room.unregister(session.id());
        }
        self.hub.disconnect(session.id());
    }

    /// Select `name` as the session's room.
    ///
    /// Switching from another room unregisters from it and resets the
    /// marker. The session registers and pulls on its next reconciliation;
    /// the caller should start a new pass.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidRoomName` for an empty name.
    pub fn enter(&self, session: &mut LocalSession, name: &str) -> Result<(), SessionError> {
        if name.is_empty() {
            return Err(SessionError::InvalidRoomName(name.to_owned()));
        }
        if session.room() == Some(name) {
            return Ok(());
        }
        if session.room().is_some() {
            self.exit(session)?;
        }

        session.set_room(name);
        tracing::info!(session = %session.id(), room = name, "entered room");
        Ok(())
    }

    /// Leave the current room.
    ///
    /// Unregisters the session and forgets its marker and every value the
    /// room provided. Session-private values survive. The caller should
    /// start a new pass.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotInRoom` if the session has no room.
    pub fn exit(&self, session: &mut LocalSession) -> Result<(), SessionError> {
        let name = session.room().ok_or(SessionError::NotInRoom)?.to_owned();

        let room_keys = match self.registry.get(&name) {
            Some(room) => {
                room.unregister(session.id());
                room.snapshot().state
            },
            None => StateMap::new(),
        };
        session.clear_room(room_keys.keys());

        tracing::info!(session = %session.id(), room = %name, "left room");
        Ok(())
    }

    /// Delete a room: clear its state, timestamp and sessions, forget its
    /// name and remove its stored snapshot.
    ///
    /// Sessions still pointing at the room pull the empty state on their
    /// next reconciliation.
    pub fn delete(&self, name: &str) {
        let guard = self.save_guard(name);
        let mut saved = guard.lock();

        self.registry.get_or_create(name).delete();
        self.seeded.remove(name);
        if let Some(store) = &self.store {
            if let Err(e) = store.remove(name) {
                tracing::warn!(room = name, "failed to remove stored room: {}", e);
            }
        }
        *saved = Timestamp::EPOCH;
    }

    /// Names of rooms known in this process or present in the store.
    pub fn list_known_rooms(&self) -> BTreeSet<String> {
        let mut names = self.registry.known_names();
        if let Some(store) = &self.store {
            match store.room_names() {
                Ok(stored) => names.extend(stored),
                Err(e) => tracing::warn!("failed to list stored rooms: {}", e),
            }
        }
        names
    }

    /// Sessions registered in `name`.
    pub fn active_session_count(&self, name: &str) -> usize {
        self.registry.get(name).map_or(0, |room| room.active_session_count())
    }

    /// Occupancy of `name`, e.g. "2 active sessions".
    pub fn room_status(&self, name: &str) -> RoomStatus {
        RoomStatus { active_sessions: self.active_session_count(name) }
    }

    /// Current contents of `name`.
    pub fn room_snapshot(&self, name: &str) -> RoomSnapshot {
        self.registry.get(name).map_or_else(|| RoomSnapshot::empty(name), |room| room.snapshot())
    }

    /// Register the session in its room and reconcile once.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotInRoom` if the session has no room, and
    /// `SessionError::Room` if its keys break the adapter contract.
    pub fn sync_now(&self, session: &mut LocalSession) -> Result<SyncOutcome, SessionError> {
        let name = session.room().ok_or(SessionError::NotInRoom)?.to_owned();
        let room = self.room(&name);

        room.register(session.session_id());
        let outcome = room.sync(self.registry.env(), session, &self.hub)?;

        if matches!(outcome, SyncOutcome::Pushed { .. }) {
            self.persist(&room);
        }
        Ok(outcome)
    }

    /// Run one pass: reconcile, run `body`, reconcile again.
    ///
    /// If the opening reconciliation pulls newer state the body is skipped.
    /// If the closing one does, the body's output is discarded. Either way
    /// the caller gets [`PassOutcome::Restart`] and should run the pass
    /// again. End-of-pass bookkeeping runs whenever the body ran.
    ///
    /// # Errors
    ///
    /// Propagates [`Rooms::sync_now`] errors.
    pub fn run_pass<T, F>(
        &self,
        session: &mut LocalSession,
        body: F,
    ) -> Result<PassOutcome<T>, SessionError>
    where
        F: FnOnce(&mut LocalSession) -> T,
    {
        if self.sync_now(session)?.requires_restart() {
            return Ok(PassOutcome::Restart);
        }

        let output = body(session);
        let closing = self.sync_now(session);
        session.finish_pass();

        let sync = closing?;
        if sync.requires_restart() {
            return Ok(PassOutcome::Restart);
        }
        Ok(PassOutcome::Completed { output, sync })
    }

    /// Room instance for `name`, seeded from the store on first use.
    fn room(&self, name: &str) -> Arc<Room> {
        let room = self.registry.get_or_create(name);
        let Some(store) = &self.store else {
            return room;
        };
        if !self.seeded.insert(name.to_owned()) {
            return room;
        }

        match store.load(name) {
            Ok(Some(snapshot)) => {
                if room.seed(snapshot) {
                    tracing::info!(room = name, "restored room from store");
                }
            },
            Ok(None) => {},
            Err(e) => tracing::warn!(room = name, "failed to load stored room: {}", e),
        }
        room
    }

    /// Save the room's current state unless a newer save already landed.
    ///
    /// The snapshot is taken under the room's store lock, so a concurrent
    /// [`Rooms::delete`] either precedes it (and the empty room is skipped)
    /// or follows it (and removes what was saved).
    fn persist(&self, room: &Room) {
        let Some(store) = &self.store else {
            return;
        };
        let guard = self.save_guard(room.name());
        let mut saved = guard.lock();

        let snapshot = room.snapshot();
        if snapshot.last_updated <= *saved {
            tracing::trace!(room = room.name(), at = %snapshot.last_updated, "save superseded");
            return;
        }
        match store.save(&snapshot) {
            Ok(()) => *saved = snapshot.last_updated,
            Err(e) => tracing::warn!(room = room.name(), "failed to persist room: {}", e),
        }
    }

    fn save_guard(&self, name: &str) -> Arc<Mutex<Timestamp>> {
        Arc::clone(
            &self
                .saved
                .entry(name.to_owned())
                .or_insert_with(|| Arc::new(Mutex::new(Timestamp::EPOCH))),
        )
    }
}

impl<E> fmt::Debug for Rooms<E>
where
    E: Environment,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rooms")
            .field("registry", &self.registry)
            .field("sessions", &self.hub.len())
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn room_status_wording() {
        assert_eq!(RoomStatus { active_sessions: 0 }.to_string(), "empty");
        assert_eq!(RoomStatus { active_sessions: 1 }.to_string(), "1 active session");
        assert_eq!(RoomStatus { active_sessions: 3 }.to_string(), "3 active sessions");
    }

    #[derive(Clone, Default)]
    struct CounterEnv(Arc<std::sync::atomic::AtomicU64>);

    impl Environment for CounterEnv {
        fn wall_clock_micros(&self) -> u64 {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            let next = self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            for (byte, id_byte) in buffer.iter_mut().zip(next.to_le_bytes().iter().cycle()) {
                *byte = *id_byte;
            }
        }
    }

    fn stored_rooms() -> (Rooms<CounterEnv>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let rooms = Rooms::with_store(CounterEnv::default(), HubConfig::default(), store.clone());
        (rooms, store)
    }

    #[test]
    fn late_save_after_delete_does_not_resurrect_room() {
        let (rooms, store) = stored_rooms();
        let mut a = rooms.connect();
        rooms.enter(&mut a, "r1").unwrap();
        a.set("x", 1);
        rooms.sync_now(&mut a).unwrap();
        let room = rooms.registry().get("r1").unwrap();

        rooms.delete("r1");
        // A save from the push above that lost the race with the delete
        rooms.persist(&room);

        assert_eq!(store.load("r1").unwrap(), None);
        assert!(!rooms.list_known_rooms().contains("r1"));
    }

    #[test]
    fn stale_save_never_replaces_newer_one() {
        let (rooms, store) = stored_rooms();
        let mut a = rooms.connect();
        rooms.enter(&mut a, "r1").unwrap();
        a.set("x", 1);
        rooms.sync_now(&mut a).unwrap();
        let saved = store.load("r1").unwrap().unwrap();

        // Overwrite behind the lock's back, then replay the same save
        store.save(&RoomSnapshot::empty("r1")).unwrap();
        rooms.persist(&rooms.registry().get("r1").unwrap());
        assert_eq!(store.load("r1").unwrap(), Some(RoomSnapshot::empty("r1")));

        a.set("x", 2);
        rooms.sync_now(&mut a).unwrap();
        let newer = store.load("r1").unwrap().unwrap();
        assert!(newer.last_updated > saved.last_updated);
        assert_eq!(newer, rooms.room_snapshot("r1"));
    }

    #[test]
    fn pass_outcome_restart_flag() {
        assert!(PassOutcome::<()>::Restart.requires_restart());
        let done = PassOutcome::Completed { output: 1, sync: SyncOutcome::UpToDate };
        assert!(!done.requires_restart());
    }
}
