//! Model session.

use std::collections::BTreeMap;

/// Room key aliased by every session's form control.
pub const DRAFT_KEY: &str = "draft";

/// Observable per-session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    /// Whether the session has a room.
    pub in_room: bool,
    /// Shared plain values held locally.
    pub values: BTreeMap<String, i64>,
    /// Current value of the form control.
    pub draft: i64,
}

/// Reference session.
#[derive(Debug, Clone)]
pub struct ModelSession {
    /// Shared plain values.
    pub(super) values: BTreeMap<String, i64>,
    /// Form control value, shared only once the form is submitted.
    pub(super) draft: i64,
    pub(super) form_submitted: bool,
    pub(super) in_room: bool,
    /// Room version last synchronized with; 0 is the epoch.
    pub(super) marker: u64,
    pub(super) alive: bool,
}

impl ModelSession {
    pub(super) fn new() -> Self {
        Self {
            values: BTreeMap::new(),
            draft: 0,
            form_submitted: false,
            in_room: false,
            marker: 0,
            alive: true,
        }
    }

    /// Whether the session is still connected.
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Local values the session would push: plain values, plus the draft
    /// once its form is submitted.
    pub(super) fn shareable(&self) -> impl Iterator<Item = (&str, i64)> {
        let draft = self.form_submitted.then_some((DRAFT_KEY, self.draft));
        self.values.iter().map(|(k, v)| (k.as_str(), *v)).chain(draft)
    }

    /// Apply pulled room state.
    pub(super) fn pull(&mut self, state: &BTreeMap<String, i64>) {
        for (key, value) in state {
            if key == DRAFT_KEY {
                self.draft = *value;
            } else {
                self.values.insert(key.clone(), *value);
            }
        }
    }

    pub(super) fn view(&self) -> SessionView {
        SessionView { in_room: self.in_room, values: self.values.clone(), draft: self.draft }
    }
}
