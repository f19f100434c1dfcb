//! In-memory room store for tests and single-process use.

use std::collections::{BTreeSet, HashMap};

use concord_core::RoomSnapshot;
use parking_lot::RwLock;

use super::{RoomStore, StoreError};

/// Room store backed by a map.
///
/// Never fails.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rooms: RwLock<HashMap<String, RoomSnapshot>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rooms.
    pub fn len(&self) -> usize {
        self.rooms.read().len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.rooms.read().is_empty()
    }
}

impl RoomStore for MemoryStore {
    fn room_names(&self) -> Result<BTreeSet<String>, StoreError> {
        Ok(self.rooms.read().keys().cloned().collect())
    }

    fn load(&self, name: &str) -> Result<Option<RoomSnapshot>, StoreError> {
        Ok(self.rooms.read().get(name).cloned())
    }

    fn save(&self, snapshot: &RoomSnapshot) -> Result<(), StoreError> {
        self.rooms.write().insert(snapshot.name.clone(), snapshot.clone());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), StoreError> {
        self.rooms.write().remove(name);
        Ok(())
    }
}
