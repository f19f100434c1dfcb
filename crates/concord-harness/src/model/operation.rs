//! Operations for model-based testing.
//!
//! Operations represent everything a host framework can do to sessions and
//! rooms. They are generated randomly by proptest or the fuzzer and applied
//! to both the model and the real implementation.

use arbitrary::Arbitrary;

/// Session index (0-indexed).
pub type SessionIndex = u8;

/// Number of distinct shared keys operations write to.
pub const KEY_SPACE: u8 = 4;

/// Shared key for a key slot, e.g. `k2`.
pub fn shared_key(slot: u8) -> String {
    format!("k{}", slot % KEY_SPACE)
}

/// Operations that can be applied to the system.
///
/// All sessions share a single room. Each session renders one trigger
/// control and one form control aliasing the shared key `draft`.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Session writes a shared plain value.
    Edit {
        /// Session performing the edit.
        session: SessionIndex,
        /// Key slot, mapped onto [`KEY_SPACE`] keys.
        slot: u8,
        /// New value.
        value: i8,
    },

    /// Session writes a private value.
    SetPrivate {
        /// Session performing the edit.
        session: SessionIndex,
        /// New value.
        value: i8,
    },

    /// User presses the session's trigger control.
    Press {
        /// Target session.
        session: SessionIndex,
    },

    /// User types into the session's form control.
    Draft {
        /// Target session.
        session: SessionIndex,
        /// New control value.
        value: i8,
    },

    /// User submits the session's form.
    SubmitForm {
        /// Target session.
        session: SessionIndex,
    },

    /// End-of-pass bookkeeping.
    FinishPass {
        /// Target session.
        session: SessionIndex,
    },

    /// Session reconciles with its room.
    Sync {
        /// Target session.
        session: SessionIndex,
    },

    /// Session enters the room.
    Enter {
        /// Target session.
        session: SessionIndex,
    },

    /// Session leaves the room.
    Exit {
        /// Target session.
        session: SessionIndex,
    },

    /// Session disappears without leaving.
    Disconnect {
        /// Target session.
        session: SessionIndex,
    },

    /// The room is deleted.
    DeleteRoom,

    /// Advance simulation time.
    ///
    /// In the model, this is a no-op (only ordering matters).
    AdvanceTime {
        /// Milliseconds to advance.
        millis: u16,
    },
}

impl Operation {
    /// Target session, if the operation has one.
    pub fn session(&self) -> Option<SessionIndex> {
        match self {
            Self::Edit { session, .. }
            | Self::SetPrivate { session, .. }
            | Self::Press { session }
            | Self::Draft { session, .. }
            | Self::SubmitForm { session }
            | Self::FinishPass { session }
            | Self::Sync { session }
            | Self::Enter { session }
            | Self::Exit { session }
            | Self::Disconnect { session } => Some(*session),
            Self::DeleteRoom | Self::AdvanceTime { .. } => None,
        }
    }

    /// Same operation with its session index wrapped into `0..num_sessions`.
    #[must_use]
    pub fn clamped(self, num_sessions: usize) -> Self {
        let n = u8::try_from(num_sessions.clamp(1, usize::from(u8::MAX))).unwrap_or(u8::MAX);
        let wrap = |session: SessionIndex| session % n;
        match self {
            Self::Edit { session, slot, value } => {
                Self::Edit { session: wrap(session), slot, value }
            },
            Self::SetPrivate { session, value } => {
                Self::SetPrivate { session: wrap(session), value }
            },
            Self::Press { session } => Self::Press { session: wrap(session) },
            Self::Draft { session, value } => Self::Draft { session: wrap(session), value },
            Self::SubmitForm { session } => Self::SubmitForm { session: wrap(session) },
            Self::FinishPass { session } => Self::FinishPass { session: wrap(session) },
            Self::Sync { session } => Self::Sync { session: wrap(session) },
            Self::Enter { session } => Self::Enter { session: wrap(session) },
            Self::Exit { session } => Self::Exit { session: wrap(session) },
            Self::Disconnect { session } => Self::Disconnect { session: wrap(session) },
            other @ (Self::DeleteRoom | Self::AdvanceTime { .. }) => other,
        }
    }
}

/// Kind of reconciliation outcome, without timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    /// Nothing to do.
    UpToDate,
    /// Local changes merged into the room.
    Pushed,
    /// Room state pulled; the pass restarts.
    Restart,
}

/// Result of applying an operation.
///
/// Used to compare model and real system behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation succeeded.
    Ok,

    /// Reconciliation ran.
    Synced(SyncKind),

    /// Operation failed with expected error.
    Error(OperationError),
}

/// Expected errors that can occur during operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// Session has no room.
    NotInRoom,

    /// Session was disconnected.
    InvalidSession,

    /// Real system failed in a way the model never does.
    Unexpected(String),
}

impl OperationResult {
    /// Check if operation succeeded.
    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::Error(_))
    }

    /// Check if operation failed.
    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }
}
