//! Room state values and snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::timestamp::Timestamp;

/// Opaque room value.
///
/// Rooms never look inside values, they only compare them. The CBOR data
/// model covers anything a session can serialize and lets stores persist
/// room state without knowing its shape.
pub type Value = ciborium::Value;

/// Key/value mapping held by a room.
pub type StateMap = BTreeMap<String, Value>;

/// Point-in-time copy of a room, as persisted by stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    /// Room name.
    pub name: String,
    /// Room timestamp when the snapshot was taken.
    pub last_updated: Timestamp,
    /// Room state.
    pub state: StateMap,
}

impl RoomSnapshot {
    /// An empty snapshot at the epoch.
    pub fn empty(name: impl Into<String>) -> Self {
        Self { name: name.into(), last_updated: Timestamp::EPOCH, state: StateMap::new() }
    }
}
