//! Room persistence.
//!
//! A store keeps the last pushed snapshot of each room so a fresh process can
//! seed pristine rooms and list rooms that exist on disk. Stores are
//! best-effort: the room registry stays authoritative while the process runs,
//! and callers log store failures instead of failing a reconciliation.
//!
//! # Invariants
//!
//! - `load(name)` after `save(snapshot)` returns that snapshot until the next
//!   `save` or `remove` for the same name
//! - `room_names()` lists exactly the rooms with a saved snapshot
//! - `remove` of an unknown room succeeds

mod directory;
mod memory;

use std::{collections::BTreeSet, path::PathBuf};

use concord_core::RoomSnapshot;
pub use directory::DirectoryStore;
pub use memory::MemoryStore;
use thiserror::Error;

/// Errors raised by room stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be encoded.
    #[error("failed to encode room {room:?}: {reason}")]
    Encode {
        /// Room name.
        room: String,
        /// Encoder message.
        reason: String,
    },

    /// A stored snapshot could not be decoded.
    #[error("failed to decode {path}: {reason}")]
    Decode {
        /// Offending file.
        path: PathBuf,
        /// Decoder message.
        reason: String,
    },
}

/// Persistent room snapshots.
pub trait RoomStore: Send + Sync {
    /// Names of every stored room.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be listed.
    fn room_names(&self) -> Result<BTreeSet<String>, StoreError>;

    /// Stored snapshot for `name`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot exists but cannot be read.
    fn load(&self, name: &str) -> Result<Option<RoomSnapshot>, StoreError>;

    /// Replace the stored snapshot for `snapshot.name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    fn save(&self, snapshot: &RoomSnapshot) -> Result<(), StoreError>;

    /// Forget the stored snapshot for `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing snapshot cannot be removed.
    fn remove(&self, name: &str) -> Result<(), StoreError>;
}
