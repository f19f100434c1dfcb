//! Session Hub
//!
//! Maps every live session to the sending half of a bounded restart channel.
//! Rooms reach other sessions only through the hub's [`RestartNotifier`]
//! implementation, which never blocks:
//!
//! - channel has room: signal queued, session reachable
//! - channel full: a restart is already pending, session reachable
//! - channel closed: the receiving session was dropped, entry removed,
//!   session unreachable

use concord_core::{Environment, Reachability, RestartNotifier, SessionId};
use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

/// Hub configuration.
#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    /// Restart signals buffered per session. Zero is treated as one.
    pub signal_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self { signal_capacity: 1 }
    }
}

/// Signal delivered to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    /// The session's room changed; abandon the current pass and start over.
    Restart,
}

/// Receiving half of a session's restart channel.
#[derive(Debug)]
pub struct SignalReceiver {
    rx: mpsc::Receiver<SessionSignal>,
}

impl SignalReceiver {
    /// Drain pending signals without waiting.
    ///
    /// Returns `true` if at least one restart was requested.
    pub fn take_restart(&mut self) -> bool {
        let mut requested = false;
        loop {
            match self.rx.try_recv() {
                Ok(SessionSignal::Restart) => requested = true,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return requested,
            }
        }
    }

    /// Wait for the next signal.
    ///
    /// Returns `None` once the hub has forgotten this session.
    pub async fn recv(&mut self) -> Option<SessionSignal> {
        self.rx.recv().await
    }
}

/// Registry of live sessions and their restart channels.
#[derive(Debug)]
pub struct SessionHub {
    channels: DashMap<SessionId, mpsc::Sender<SessionSignal>>,
    config: HubConfig,
}

impl SessionHub {
    /// Create an empty hub.
    pub fn new(config: HubConfig) -> Self {
        Self { channels: DashMap::new(), config }
    }

    /// Allocate a fresh session id and its restart channel.
    ///
    /// Ids are drawn from the environment's randomness and redrawn on
    /// collision with a live session.
    pub fn connect<E: Environment>(&self, env: &E) -> (SessionId, SignalReceiver) {
        let (tx, rx) = mpsc::channel(self.config.signal_capacity.max(1));
        loop {
            let id = SessionId::new(env.random_u64());
            match self.channels.entry(id) {
                Entry::Occupied(_) => {
                    tracing::debug!(session = %id, "session id collision, redrawing");
                },
                Entry::Vacant(slot) => {
                    slot.insert(tx);
                    tracing::debug!(session = %id, "session connected");
                    return (id, SignalReceiver { rx });
                },
            }
        }
    }

    /// Forget a session. Returns `false` if it was not connected.
    pub fn disconnect(&self, id: SessionId) -> bool {
        let removed = self.channels.remove(&id).is_some();
        if removed {
            tracing::debug!(session = %id, "session disconnected");
        }
        removed
    }

    /// Whether a session is still connected.
    pub fn is_connected(&self, id: SessionId) -> bool {
        self.channels.contains_key(&id)
    }

    /// Number of connected sessions.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether no session is connected.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

impl RestartNotifier for SessionHub {
    fn request_restart(&self, session_id: SessionId) -> Reachability {
        let sent = match self.channels.get(&session_id) {
            Some(tx) => tx.try_send(SessionSignal::Restart),
            None => return Reachability::Unreachable,
        };

        match sent {
            Ok(()) | Err(TrySendError::Full(_)) => Reachability::Reachable,
            Err(TrySendError::Closed(_)) => {
                self.channels.remove(&session_id);
                tracing::debug!(session = %session_id, "restart channel closed");
                Reachability::Unreachable
            },
        }
    }
}
