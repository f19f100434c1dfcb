//! Model world - one room and its sessions.
//!
//! The world applies operations to the reference model and exposes the
//! observable state compared against the real implementation.

use std::collections::{BTreeMap, BTreeSet};

use super::{
    operation::{Operation, OperationError, OperationResult, SessionIndex, SyncKind, shared_key},
    session::{DRAFT_KEY, ModelSession, SessionView},
};

/// Observable state for oracle comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Room contents.
    pub room_state: BTreeMap<String, i64>,
    /// Registered sessions.
    pub active_sessions: usize,
    /// Whether the room is discoverable.
    pub room_known: bool,
    /// Per-session state; `None` once disconnected.
    pub sessions: Vec<Option<SessionView>>,
}

/// Reference room.
#[derive(Debug, Clone, Default)]
pub struct ModelRoom {
    /// Room contents.
    pub state: BTreeMap<String, i64>,
    /// Current version; 0 is the epoch.
    pub version: u64,
    /// Registered sessions.
    pub members: BTreeSet<SessionIndex>,
    /// Whether the room is discoverable.
    pub known: bool,
}

/// Model world - the reference implementation.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    sessions: Vec<ModelSession>,
    room: ModelRoom,
    /// Versions are never reused, not even after deletion.
    next_version: u64,
}

impl ModelWorld {
    /// Create a world with `num_sessions` sessions, none in the room yet.
    pub fn new(num_sessions: usize) -> Self {
        Self {
            sessions: (0..num_sessions).map(|_| ModelSession::new()).collect(),
            room: ModelRoom::default(),
            next_version: 1,
        }
    }

    /// Number of sessions in the world.
    pub fn num_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// The shared room.
    pub fn room(&self) -> &ModelRoom {
        &self.room
    }

    /// Get a session by index.
    pub fn session(&self, index: SessionIndex) -> Option<&ModelSession> {
        self.sessions.get(usize::from(index))
    }

    /// Apply an operation and return the result.
    ///
    /// The result should match the real implementation's result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        if let Some(index) = op.session() {
            if !self.session(index).is_some_and(ModelSession::is_alive) {
                return OperationResult::Error(OperationError::InvalidSession);
            }
        }

        match op {
            Operation::Edit { session, slot, value } => {
                let session = &mut self.sessions[usize::from(*session)];
                session.values.insert(shared_key(*slot), (*value).into());
                OperationResult::Ok
            },
            Operation::Draft { session, value } => {
                self.sessions[usize::from(*session)].draft = (*value).into();
                OperationResult::Ok
            },
            Operation::SubmitForm { session } => {
                self.sessions[usize::from(*session)].form_submitted = true;
                OperationResult::Ok
            },
            Operation::FinishPass { session } => {
                self.sessions[usize::from(*session)].form_submitted = false;
                OperationResult::Ok
            },
            Operation::Sync { session } => self.apply_sync(*session),
            Operation::Enter { session } => {
                self.sessions[usize::from(*session)].in_room = true;
                OperationResult::Ok
            },
            Operation::Exit { session } => self.apply_exit(*session),
            Operation::Disconnect { session } => {
                self.sessions[usize::from(*session)].alive = false;
                OperationResult::Ok
            },
            Operation::DeleteRoom => {
                self.room = ModelRoom::default();
                OperationResult::Ok
            },
            // Private values and triggers never leave the session; time only
            // matters for ordering, which versions already capture.
            Operation::SetPrivate { .. }
            | Operation::Press { .. }
            | Operation::AdvanceTime { .. } => OperationResult::Ok,
        }
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        ObservableState {
            room_state: self.room.state.clone(),
            active_sessions: self.room.members.len(),
            room_known: self.room.known,
            sessions: self
                .sessions
                .iter()
                .map(|session| session.alive.then(|| session.view()))
                .collect(),
        }
    }

    fn apply_sync(&mut self, index: SessionIndex) -> OperationResult {
        let session = &mut self.sessions[usize::from(index)];
        if !session.in_room {
            return OperationResult::Error(OperationError::NotInRoom);
        }

        self.room.members.insert(index);
        self.room.known = true;

        if session.marker != self.room.version {
            session.pull(&self.room.state);
            session.marker = self.room.version;
            return OperationResult::Synced(SyncKind::Restart);
        }

        let changes: BTreeMap<String, i64> = session
            .shareable()
            .filter(|(key, value)| self.room.state.get(*key) != Some(value))
            .map(|(key, value)| (key.to_owned(), value))
            .collect();
        if changes.is_empty() {
            return OperationResult::Synced(SyncKind::UpToDate);
        }

        self.room.state.extend(changes);
        self.room.version = self.next_version;
        self.next_version += 1;
        session.marker = self.room.version;

        // Every other member is asked to restart; dead ones are dropped.
        let sessions = &self.sessions;
        self.room
            .members
            .retain(|&member| member == index || sessions[usize::from(member)].alive);

        OperationResult::Synced(SyncKind::Pushed)
    }

    fn apply_exit(&mut self, index: SessionIndex) -> OperationResult {
        let session = &mut self.sessions[usize::from(index)];
        if !session.in_room {
            return OperationResult::Error(OperationError::NotInRoom);
        }

        self.room.members.remove(&index);
        for key in self.room.state.keys() {
            session.values.remove(key);
        }
        // The form control aliases a room key and goes back to its default
        if self.room.state.contains_key(DRAFT_KEY) {
            session.draft = 0;
        }
        session.marker = 0;
        session.in_room = false;
        OperationResult::Ok
    }
}
