//! Session adapter boundary.
//!
//! Rooms know nothing about how a session stores its values or how control
//! ids are generated. Everything session-specific goes through two traits:
//!
//! - [`SessionAdapter`]: the calling session, borrowed mutably for the
//!   duration of one reconciliation
//! - [`RestartNotifier`]: a handle able to poke *other* sessions
//!
//! # Contract
//!
//! - `snapshot()` covers plain session values and control values for the
//!   current pass
//! - `normalize_key()` must map a control id and its user key to the same
//!   room key, and must fail rather than guess on unknown id shapes
//! - `request_restart()` must not block: it is called with the room lock held

use std::fmt;

use crate::{
    keys::KeyError,
    state::{StateMap, Value},
    timestamp::Timestamp,
};

/// Identifier of a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Wrap a raw identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw identifier.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Outcome of asking another session to restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    /// The session is live and will restart.
    Reachable,
    /// The session is gone; it should be pruned from the room.
    Unreachable,
}

/// The calling session, as seen by a room during reconciliation.
pub trait SessionAdapter {
    /// Identifier of this session.
    fn session_id(&self) -> SessionId;

    /// Room timestamp this session last observed as synchronized.
    fn last_synced(&self) -> Timestamp;

    /// Record the room timestamp this session is now synchronized with.
    fn mark_synced(&mut self, timestamp: Timestamp);

    /// Locally observed key/value pairs for the current pass.
    ///
    /// Keys are raw: they may be control ids, private keys or bookkeeping.
    fn snapshot(&self) -> Vec<(String, Value)>;

    /// Whether `key` may leave the session at all.
    fn is_synchronizable(&self, key: &str) -> bool;

    /// Whether `key` holds a one-shot trigger, such as a button press.
    fn is_transient_action(&self, key: &str) -> bool;

    /// Whether `key` belongs to a form that has not been submitted.
    fn is_form_pending_submit(&self, key: &str) -> bool;

    /// Canonical room key for a raw key.
    fn normalize_key(&self, raw_key: &str) -> Result<String, KeyError>;

    /// Write room values back into the session's live value store.
    fn write_local_values(&mut self, values: &StateMap);
}

/// Delivers restart requests to other sessions.
pub trait RestartNotifier {
    /// Ask `session_id` to restart its current pass.
    ///
    /// Best-effort and non-blocking.
    fn request_restart(&self, session_id: SessionId) -> Reachability;
}

impl<N: RestartNotifier + ?Sized> RestartNotifier for &N {
    fn request_restart(&self, session_id: SessionId) -> Reachability {
        (**self).request_restart(session_id)
    }
}

impl<N: RestartNotifier + ?Sized> RestartNotifier for std::sync::Arc<N> {
    fn request_restart(&self, session_id: SessionId) -> Reachability {
        (**self).request_restart(session_id)
    }
}
