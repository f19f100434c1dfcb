//! Room Registry
//!
//! Process-wide mapping from room name to [`Room`], plus the set of room
//! names that are currently discoverable.
//!
//! ## Design
//!
//! - Explicit service object: constructed once and passed by reference to
//!   every session-handling path, no ambient globals
//! - One instance per name: the dashmap entry API makes concurrent first
//!   lookups of a new name agree on a single `Room`
//! - Append-only names: rooms are reset, never removed, so every holder of an
//!   `Arc<Room>` keeps pointing at the live instance

use std::{collections::BTreeSet, fmt, sync::Arc};

use dashmap::{DashMap, DashSet};

use crate::{
    adapter::{RestartNotifier, SessionAdapter},
    env::Environment,
    error::RoomError,
    room::{Room, SyncOutcome},
};

/// Names of rooms that have been registered into and not since deleted.
///
/// Used for discovery only. Reads may be slightly stale under concurrent
/// registration or deletion.
#[derive(Debug, Default)]
pub struct KnownRooms {
    names: DashSet<String>,
}

impl KnownRooms {
    /// Mark a room name as known.
    pub fn insert(&self, name: &str) {
        if !self.names.contains(name) {
            self.names.insert(name.to_owned());
        }
    }

    /// Forget a room name.
    pub fn remove(&self, name: &str) {
        self.names.remove(name);
    }

    /// Whether a room name is known.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Sorted copy of the known names.
    pub fn snapshot(&self) -> BTreeSet<String> {
        self.names.iter().map(|name| name.key().clone()).collect()
    }
}

/// Registry of all rooms in the process.
pub struct RoomRegistry<E>
where
    E: Environment,
{
    /// Clock and randomness shared by every room.
    env: E,
    /// Room instances by name.
    rooms: DashMap<String, Arc<Room>>,
    /// Discoverable room names.
    known: Arc<KnownRooms>,
}

impl<E> RoomRegistry<E>
where
    E: Environment,
{
    /// Create an empty registry.
    pub fn new(env: E) -> Self {
        Self { env, rooms: DashMap::new(), known: Arc::new(KnownRooms::default()) }
    }

    /// Environment used for room timestamps.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Return the room called `name`, creating it on first use.
    ///
    /// Every caller gets the same instance for the same name.
    pub fn get_or_create(&self, name: &str) -> Arc<Room> {
        if let Some(room) = self.rooms.get(name) {
            return Arc::clone(room.value());
        }

        let room = self.rooms.entry(name.to_owned()).or_insert_with(|| {
            tracing::debug!(room = name, "creating room");
            Arc::new(Room::new(name, Arc::clone(&self.known)))
        });
        Arc::clone(room.value())
    }

    /// Return the room called `name` if it was ever referenced.
    pub fn get(&self, name: &str) -> Option<Arc<Room>> {
        self.rooms.get(name).map(|room| Arc::clone(room.value()))
    }

    /// Names of rooms that are currently discoverable.
    pub fn known_names(&self) -> BTreeSet<String> {
        self.known.snapshot()
    }

    /// Number of room instances ever created.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether no room has been referenced yet.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Register `session` in room `name` and reconcile it.
    ///
    /// This is the "sync now" step a session runs at the start and at the end
    /// of every pass.
    ///
    /// # Errors
    ///
    /// Returns `RoomError::AdapterContract` if the session's keys violate the
    /// adapter contract.
    pub fn sync<A, N>(
        &self,
        name: &str,
        session: &mut A,
        notifier: &N,
    ) -> Result<SyncOutcome, RoomError>
    where
        A: SessionAdapter + ?Sized,
        N: RestartNotifier + ?Sized,
    {
        let room = self.get_or_create(name);
        room.register(session.session_id());
        room.sync(&self.env, session, notifier)
    }
}

impl<E> fmt::Debug for RoomRegistry<E>
where
    E: Environment,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomRegistry")
            .field("room_count", &self.rooms.len())
            .field("known_rooms", &self.known.names.len())
            .finish()
    }
}
