//! In-process session state.
//!
//! A [`LocalSession`] is what one user's script sees during a pass: plain
//! values by key, controls by generated id, and the forms submitted during
//! the pass. Bookkeeping (current room, last synchronized timestamp) lives
//! in the value map under private keys, so it is never synchronized.

use std::collections::{BTreeMap, BTreeSet};

use concord_core::{
    KeyError, SessionAdapter, SessionId, StateMap, Timestamp, Value,
    keys::{self, LAST_SYNCED_KEY, ROOM_NAME_KEY},
};

use crate::hub::{SessionSignal, SignalReceiver};

/// How a control's value behaves between passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// Holds a value until the user changes it.
    Input,
    /// Fires for exactly one pass, like a button press.
    Trigger,
}

/// A rendered control.
#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    /// Current value.
    pub value: Value,
    /// Pass-to-pass behavior.
    pub kind: ControlKind,
    /// Form the control belongs to, if any.
    pub form: Option<String>,
}

/// One session's local state.
#[derive(Debug)]
pub struct LocalSession {
    id: SessionId,
    values: BTreeMap<String, Value>,
    controls: BTreeMap<String, Control>,
    submitted_forms: BTreeSet<String>,
    signals: SignalReceiver,
}

impl LocalSession {
    pub(crate) fn new(id: SessionId, signals: SignalReceiver) -> Self {
        Self {
            id,
            values: BTreeMap::new(),
            controls: BTreeMap::new(),
            submitted_forms: BTreeSet::new(),
            signals,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Room the session is currently in.
    pub fn room(&self) -> Option<&str> {
        self.values.get(ROOM_NAME_KEY).and_then(Value::as_text)
    }

    pub(crate) fn set_room(&mut self, name: &str) {
        self.values.insert(ROOM_NAME_KEY.to_owned(), Value::Text(name.to_owned()));
    }

    /// Leave the current room locally: forget the room name, the marker and
    /// every value the room provided.
    ///
    /// Input controls aliasing a room key are dropped, so the next render
    /// recreates them with their default.
    pub(crate) fn clear_room<'a>(&mut self, room_keys: impl IntoIterator<Item = &'a String>) {
        self.values.remove(ROOM_NAME_KEY);
        self.values.remove(LAST_SYNCED_KEY);
        for key in room_keys {
            self.values.remove(key);
            if let Some(id) = self.control_for(key).map(|(id, _)| id.clone()) {
                self.controls.remove(&id);
            }
        }
    }

    /// Value stored under `key`, or the value of the control aliasing it.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).or_else(|| self.control_for(key).map(|(_, control)| &control.value))
    }

    /// Store a plain value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Store a value that never leaves this session.
    pub fn set_private(&mut self, user_key: &str, value: impl Into<Value>) {
        self.values.insert(keys::not_synced_key(user_key), value.into());
    }

    /// Remove a plain value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Render a control, creating it with `default` on first use.
    ///
    /// Returns the control's current value.
    pub fn control(&mut self, id: &str, kind: ControlKind, default: impl Into<Value>) -> &Value {
        &self
            .controls
            .entry(id.to_owned())
            .or_insert_with(|| Control { value: default.into(), kind, form: None })
            .value
    }

    /// Render a control that belongs to `form`.
    pub fn form_control(&mut self, form: &str, id: &str, default: impl Into<Value>) -> &Value {
        &self
            .controls
            .entry(id.to_owned())
            .or_insert_with(|| Control {
                value: default.into(),
                kind: ControlKind::Input,
                form: Some(form.to_owned()),
            })
            .value
    }

    /// User interaction: change a control's value.
    ///
    /// Returns `false` if no such control was rendered.
    pub fn set_control(&mut self, id: &str, value: impl Into<Value>) -> bool {
        match self.controls.get_mut(id) {
            Some(control) => {
                control.value = value.into();
                true
            },
            None => false,
        }
    }

    /// User interaction: fire a trigger control for the next pass.
    pub fn press(&mut self, id: &str) -> bool {
        self.set_control(id, true)
    }

    /// User interaction: submit a form, releasing its controls' values.
    pub fn submit_form(&mut self, form: &str) {
        self.submitted_forms.insert(form.to_owned());
    }

    /// End-of-pass bookkeeping: triggers fall back to `false` and submitted
    /// forms close again.
    pub fn finish_pass(&mut self) {
        for control in self.controls.values_mut() {
            if control.kind == ControlKind::Trigger {
                control.value = Value::Bool(false);
            }
        }
        self.submitted_forms.clear();
    }

    /// Drain pending restart requests without waiting.
    pub fn take_restart_request(&mut self) -> bool {
        self.signals.take_restart()
    }

    /// Wait until another session asks this one to restart.
    ///
    /// Returns `false` if the hub forgot this session.
    pub async fn restart_requested(&mut self) -> bool {
        matches!(self.signals.recv().await, Some(SessionSignal::Restart))
    }

    /// Synchronizable plain values, for inspection.
    pub fn synced_values(&self) -> StateMap {
        self.values
            .iter()
            .filter(|(key, _)| keys::is_synced(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// The non-trigger control whose id aliases `user_key`.
    fn control_for(&self, user_key: &str) -> Option<(&String, &Control)> {
        self.controls.iter().find(|(id, control)| {
            control.kind == ControlKind::Input
                && keys::is_keyed_control_id(id)
                && keys::control_id_to_user_key(id).is_ok_and(|key| key == user_key)
        })
    }
}

impl SessionAdapter for LocalSession {
    fn session_id(&self) -> SessionId {
        self.id
    }

    fn last_synced(&self) -> Timestamp {
        self.values
            .get(LAST_SYNCED_KEY)
            .and_then(Value::as_integer)
            .and_then(|micros| u64::try_from(micros).ok())
            .map_or(Timestamp::EPOCH, Timestamp::from_micros)
    }

    fn mark_synced(&mut self, timestamp: Timestamp) {
        self.values.insert(LAST_SYNCED_KEY.to_owned(), Value::from(timestamp.as_micros()));
    }

    fn snapshot(&self) -> Vec<(String, Value)> {
        self.controls
            .iter()
            .map(|(id, control)| (id.clone(), control.value.clone()))
            .chain(self.values.iter().map(|(key, value)| (key.clone(), value.clone())))
            .collect()
    }

    fn is_synchronizable(&self, key: &str) -> bool {
        keys::is_synced(key)
    }

    fn is_transient_action(&self, key: &str) -> bool {
        self.controls.get(key).is_some_and(|control| control.kind == ControlKind::Trigger)
    }

    fn is_form_pending_submit(&self, key: &str) -> bool {
        if keys::is_form_submitter(key) {
            return true;
        }
        self.controls
            .get(key)
            .and_then(|control| control.form.as_ref())
            .is_some_and(|form| !self.submitted_forms.contains(form))
    }

    fn normalize_key(&self, raw_key: &str) -> Result<String, KeyError> {
        keys::control_id_to_user_key(raw_key).map(str::to_owned)
    }

    fn write_local_values(&mut self, values: &StateMap) {
        for (key, value) in values {
            let aliased = self.control_for(key).map(|(id, _)| id.clone());
            match aliased.and_then(|id| self.controls.get_mut(&id)) {
                Some(control) => control.value = value.clone(),
                None => {
                    self.values.insert(key.clone(), value.clone());
                },
            }
        }
    }
}
