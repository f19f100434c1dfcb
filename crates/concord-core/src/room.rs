//! Room
//!
//! The synchronization unit shared by every session in a named room.
//!
//! ## Responsibilities
//!
//! - Session Lifecycle: register, unregister, estimated active count
//! - Reconciliation: pull when the session is behind, otherwise diff and push
//! - Broadcast: ask every other session to restart after a push, pruning the
//!   ones that are gone
//! - Reset / Delete: wipe the room in place
//!
//! ## Design
//!
//! - One lock: state, timestamp and registered sessions live behind a single
//!   mutex, and `sync` holds it from the first read to the last write
//! - Outcome-based: a session that must restart gets
//!   [`SyncOutcome::Restart`] back, the caller unwinds its own pass
//! - Last writer wins: concurrent pushes are ordered by lock acquisition,
//!   each one applied atomically with a single timestamp bump

use std::{collections::HashSet, fmt, sync::Arc};

use parking_lot::Mutex;

use crate::{
    adapter::{Reachability, RestartNotifier, SessionAdapter, SessionId},
    env::Environment,
    error::RoomError,
    registry::KnownRooms,
    state::{RoomSnapshot, StateMap},
    timestamp::Timestamp,
};

/// Result of one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Session and room already agree; nothing changed.
    UpToDate,

    /// The session's changes were merged into the room.
    Pushed {
        /// Room keys that changed, in key order.
        changed: Vec<String>,
        /// New room timestamp.
        last_updated: Timestamp,
        /// Sessions pruned because they could not be reached.
        pruned: Vec<SessionId>,
    },

    /// The session was behind: room state was written back into it and the
    /// current pass must be restarted. No local change reached the room.
    Restart {
        /// Room timestamp the session is now synchronized with.
        last_updated: Timestamp,
    },
}

impl SyncOutcome {
    /// Whether the caller must abandon its pass and start over.
    pub fn requires_restart(&self) -> bool {
        matches!(self, Self::Restart { .. })
    }
}

/// Mutable room state, only touched under the room lock.
struct RoomState {
    state: StateMap,
    last_updated: Timestamp,
    sessions: HashSet<SessionId>,
}

impl RoomState {
    fn empty() -> Self {
        Self { state: StateMap::new(), last_updated: Timestamp::EPOCH, sessions: HashSet::new() }
    }

    /// Ask every registered session except `exclude` to restart.
    ///
    /// Unreachable sessions are removed once the fan-out is done.
    fn broadcast_restart<N>(&mut self, exclude: SessionId, notifier: &N) -> Vec<SessionId>
    where
        N: RestartNotifier + ?Sized,
    {
        let mut unreachable: Vec<SessionId> = self
            .sessions
            .iter()
            .copied()
            .filter(|id| *id != exclude)
            .filter(|id| notifier.request_restart(*id) == Reachability::Unreachable)
            .collect();

        for session_id in &unreachable {
            self.sessions.remove(session_id);
        }

        unreachable.sort_unstable();
        unreachable
    }
}

/// A named room.
pub struct Room {
    name: String,
    inner: Mutex<RoomState>,
    known: Arc<KnownRooms>,
}

impl Room {
    /// Create an empty room that reports itself to `known` on registration.
    ///
    /// Rooms are normally obtained through
    /// [`RoomRegistry::get_or_create`](crate::RoomRegistry::get_or_create),
    /// which guarantees one instance per name.
    pub fn new(name: impl Into<String>, known: Arc<KnownRooms>) -> Self {
        Self { name: name.into(), inner: Mutex::new(RoomState::empty()), known }
    }

    /// Room name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a session in the room.
    ///
    /// Idempotent. Also makes the room name discoverable.
    pub fn register(&self, session_id: SessionId) {
        let mut inner = self.inner.lock();
        if inner.sessions.insert(session_id) {
            tracing::debug!(room = %self.name, session = %session_id, "session registered");
        }
        self.known.insert(&self.name);
    }

    /// Unregister a session. No-op if it was not registered.
    pub fn unregister(&self, session_id: SessionId) {
        let mut inner = self.inner.lock();
        if inner.sessions.remove(&session_id) {
            tracing::debug!(room = %self.name, session = %session_id, "session unregistered");
        }
    }

    /// Whether a session is currently registered.
    pub fn is_registered(&self, session_id: SessionId) -> bool {
        self.inner.lock().sessions.contains(&session_id)
    }

    /// Estimated number of active sessions.
    ///
    /// A session that disappeared without unregistering is still counted
    /// until the next push prunes it.
    pub fn active_session_count(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    /// Timestamp of the last update.
    pub fn last_updated(&self) -> Timestamp {
        self.inner.lock().last_updated
    }

    /// Copy of the current room state.
    pub fn snapshot(&self) -> RoomSnapshot {
        let inner = self.inner.lock();
        RoomSnapshot {
            name: self.name.clone(),
            last_updated: inner.last_updated,
            state: inner.state.clone(),
        }
    }

    /// Install persisted state into a pristine room.
    ///
    /// Returns `false` without touching anything if the room has already
    /// been updated, or if the snapshot itself is at the epoch.
    pub fn seed(&self, snapshot: RoomSnapshot) -> bool {
        let mut inner = self.inner.lock();
        if !inner.last_updated.is_epoch() || snapshot.last_updated.is_epoch() {
            return false;
        }

        tracing::debug!(
            room = %self.name,
            last_updated = %snapshot.last_updated,
            keys = snapshot.state.len(),
            "seeding room"
        );
        inner.state = snapshot.state;
        inner.last_updated = snapshot.last_updated;
        true
    }

    /// Reconcile a session with the room.
    ///
    /// 1. If the session's marker differs from the room timestamp, write the
    ///    whole room state into the session, move its marker and return
    ///    [`SyncOutcome::Restart`]. Pending local edits are not looked at.
    /// 2. Otherwise collect every synchronizable local value that differs
    ///    from the room. If there are any, merge them, bump the timestamp,
    ///    move the marker and wake every other session.
    ///
    /// The room lock is held for the whole call.
    ///
    /// # Errors
    ///
    /// Returns `RoomError::AdapterContract` if a key cannot be normalized.
    /// The room is left untouched in that case.
    pub fn sync<E, A, N>(
        &self,
        env: &E,
        session: &mut A,
        notifier: &N,
    ) -> Result<SyncOutcome, RoomError>
    where
        E: Environment,
        A: SessionAdapter + ?Sized,
        N: RestartNotifier + ?Sized,
    {
        let mut inner = self.inner.lock();
        let session_id = session.session_id();

        if session.last_synced() != inner.last_updated {
            tracing::debug!(
                room = %self.name,
                session = %session_id,
                marker = %session.last_synced(),
                last_updated = %inner.last_updated,
                "session behind room, pulling"
            );
            session.write_local_values(&inner.state);
            session.mark_synced(inner.last_updated);
            return Ok(SyncOutcome::Restart { last_updated: inner.last_updated });
        }

        let changes = collect_changes(&inner.state, session)?;
        if changes.is_empty() {
            return Ok(SyncOutcome::UpToDate);
        }

        let last_updated = inner.last_updated.advance(env.now());
        debug_assert!(last_updated > inner.last_updated, "room timestamp must strictly increase");

        let changed: Vec<String> = changes.keys().cloned().collect();
        inner.state.extend(changes);
        inner.last_updated = last_updated;
        session.mark_synced(last_updated);

        let pruned = inner.broadcast_restart(session_id, notifier);

        tracing::debug!(
            room = %self.name,
            session = %session_id,
            %last_updated,
            changed = changed.len(),
            pruned = pruned.len(),
            "pushed session changes"
        );
        if !pruned.is_empty() {
            tracing::info!(room = %self.name, ?pruned, "pruned unreachable sessions");
        }

        Ok(SyncOutcome::Pushed { changed, last_updated, pruned })
    }

    /// Clear state, timestamp and sessions in place.
    pub fn reset(&self) {
        *self.inner.lock() = RoomState::empty();
        tracing::debug!(room = %self.name, "room reset");
    }

    /// Reset the room and drop it from the known room names.
    ///
    /// The instance survives; registering into it again makes it known with
    /// empty state.
    pub fn delete(&self) {
        let mut inner = self.inner.lock();
        *inner = RoomState::empty();
        self.known.remove(&self.name);
        tracing::info!(room = %self.name, "room deleted");
    }
}

/// Local values that differ from the room, keyed by canonical room key.
///
/// Entries are visited in snapshot order; only values that differ from the
/// room are recorded, so a stale alias never overwrites a fresher one.
fn collect_changes<A>(state: &StateMap, session: &A) -> Result<StateMap, RoomError>
where
    A: SessionAdapter + ?Sized,
{
    let mut changes = StateMap::new();

    for (raw_key, value) in session.snapshot() {
        if session.is_form_pending_submit(&raw_key) {
            continue;
        }
        // Replaying a trigger on other sessions would fire the action twice.
        if session.is_transient_action(&raw_key) {
            continue;
        }
        if !session.is_synchronizable(&raw_key) {
            continue;
        }

        let key = session.normalize_key(&raw_key)?;
        if state.get(&key) != Some(&value) {
            changes.insert(key, value);
        }
    }

    Ok(changes)
}

impl fmt::Debug for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Room")
            .field("name", &self.name)
            .field("active_sessions", &inner.sessions.len())
            .field("last_updated", &inner.last_updated)
            .field("keys", &inner.state.len())
            .finish()
    }
}
