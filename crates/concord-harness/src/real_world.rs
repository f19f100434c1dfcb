//! Real system wrapper that mirrors [`ModelWorld`]'s interface.
//!
//! Runs the same operations against `Rooms` with simulated time and
//! randomness.
//!
//! [`ModelWorld`]: crate::model::ModelWorld

use std::{collections::BTreeMap, time::Duration};

use concord_core::{Environment, StateMap, SyncOutcome, Value, keys};
use concord_session::{ControlKind, LocalSession, Rooms, SessionError};

use crate::{
    model::{
        DRAFT_KEY, ObservableState, Operation, OperationError, OperationResult, SessionView,
        SyncKind, shared_key,
    },
    sim_env::SimEnv,
};

/// Name of the room every session uses.
pub const ROOM: &str = "room";

/// Form every session's draft control belongs to.
const FORM: &str = "form";

/// One real session plus the ids of the controls it rendered.
struct RealSession {
    session: LocalSession,
    trigger: String,
    draft: String,
}

impl RealSession {
    /// Render both controls, recreating any the session dropped.
    fn render(&mut self) {
        self.session.control(&self.trigger, ControlKind::Trigger, false);
        self.session.form_control(FORM, &self.draft, 0);
    }
}

/// Real system under test.
pub struct RealWorld {
    env: SimEnv,
    rooms: Rooms<SimEnv>,
    sessions: Vec<Option<RealSession>>,
}

impl RealWorld {
    /// Create `num_sessions` connected sessions, none in the room yet.
    pub fn new(num_sessions: usize, seed: u64) -> Self {
        let env = SimEnv::with_seed(seed);
        let rooms = Rooms::in_memory(env.clone());
        let sessions = (0..num_sessions)
            .map(|_| {
                let mut real = RealSession {
                    session: rooms.connect(),
                    trigger: keys::control_id(env.random_u128(), Some("click")),
                    draft: keys::control_id(env.random_u128(), Some(DRAFT_KEY)),
                };
                real.render();
                Some(real)
            })
            .collect();

        Self { env, rooms, sessions }
    }

    /// Rooms under test.
    pub fn rooms(&self) -> &Rooms<SimEnv> {
        &self.rooms
    }

    /// Apply an operation to the real system.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match op {
            Operation::DeleteRoom => {
                self.rooms.delete(ROOM);
                OperationResult::Ok
            },
            Operation::AdvanceTime { millis } => {
                self.env.advance(Duration::from_millis(u64::from(*millis)));
                OperationResult::Ok
            },
            Operation::Disconnect { session } => {
                match self.sessions.get_mut(usize::from(*session)).and_then(Option::take) {
                    Some(real) => {
                        drop(real);
                        OperationResult::Ok
                    },
                    None => OperationResult::Error(OperationError::InvalidSession),
                }
            },
            other => {
                let Some(index) = other.session() else {
                    return OperationResult::Ok;
                };
                let Some(Some(real)) = self.sessions.get_mut(usize::from(index)) else {
                    return OperationResult::Error(OperationError::InvalidSession);
                };
                apply_to_session(&self.rooms, real, other)
            },
        }
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        let room = self.rooms.room_snapshot(ROOM);
        ObservableState {
            room_state: as_ints(&room.state),
            active_sessions: self.rooms.active_session_count(ROOM),
            room_known: self.rooms.list_known_rooms().contains(ROOM),
            sessions: self
                .sessions
                .iter()
                .map(|slot| {
                    slot.as_ref().map(|real| SessionView {
                        in_room: real.session.room().is_some(),
                        values: as_ints(&real.session.synced_values()),
                        draft: real.session.get(DRAFT_KEY).and_then(as_int).unwrap_or_default(),
                    })
                })
                .collect(),
        }
    }
}

fn apply_to_session(
    rooms: &Rooms<SimEnv>,
    real: &mut RealSession,
    op: &Operation,
) -> OperationResult {
    real.render();
    let session = &mut real.session;
    match op {
        Operation::Edit { slot, value, .. } => {
            session.set(shared_key(*slot), i64::from(*value));
            OperationResult::Ok
        },
        Operation::SetPrivate { value, .. } => {
            session.set_private("private", i64::from(*value));
            OperationResult::Ok
        },
        Operation::Press { .. } => {
            session.press(&real.trigger);
            OperationResult::Ok
        },
        Operation::Draft { value, .. } => {
            session.set_control(&real.draft, i64::from(*value));
            OperationResult::Ok
        },
        Operation::SubmitForm { .. } => {
            session.submit_form(FORM);
            OperationResult::Ok
        },
        Operation::FinishPass { .. } => {
            session.finish_pass();
            OperationResult::Ok
        },
        Operation::Sync { .. } => match rooms.sync_now(session) {
            Ok(SyncOutcome::UpToDate) => OperationResult::Synced(SyncKind::UpToDate),
            Ok(SyncOutcome::Pushed { .. }) => OperationResult::Synced(SyncKind::Pushed),
            Ok(SyncOutcome::Restart { .. }) => OperationResult::Synced(SyncKind::Restart),
            Err(e) => error_result(&e),
        },
        Operation::Enter { .. } => match rooms.enter(session, ROOM) {
            Ok(()) => OperationResult::Ok,
            Err(e) => error_result(&e),
        },
        Operation::Exit { .. } => match rooms.exit(session) {
            Ok(()) => OperationResult::Ok,
            Err(e) => error_result(&e),
        },
        Operation::Disconnect { .. } | Operation::DeleteRoom | Operation::AdvanceTime { .. } => {
            OperationResult::Ok
        },
    }
}

fn error_result(error: &SessionError) -> OperationResult {
    match error {
        SessionError::NotInRoom => OperationResult::Error(OperationError::NotInRoom),
        other => OperationResult::Error(OperationError::Unexpected(other.to_string())),
    }
}

fn as_int(value: &Value) -> Option<i64> {
    value.as_integer().and_then(|n| i64::try_from(n).ok())
}

fn as_ints(state: &StateMap) -> BTreeMap<String, i64> {
    state.iter().filter_map(|(key, value)| Some((key.clone(), as_int(value)?))).collect()
}
