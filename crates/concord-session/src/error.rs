//! Session layer error types.

use concord_core::RoomError;
use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced to code driving a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The operation needs a current room and the session has none.
    #[error("session is not in a room")]
    NotInRoom,

    /// Room names must be non-empty.
    #[error("invalid room name {0:?}")]
    InvalidRoomName(String),

    /// Reconciliation failed.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The room store could not be opened.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Whether the error means the session layer itself is misconfigured, as
    /// opposed to a caller mistake that can be corrected.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::NotInRoom | Self::InvalidRoomName(_) => false,
            Self::Room(e) => e.is_fatal(),
            Self::Store(_) => true,
        }
    }
}
