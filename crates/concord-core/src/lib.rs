//! Concord room synchronization engine.
//!
//! Sessions running concurrently in one process converge on a shared, named
//! room state. Each session reconciles with its room at the start and end of
//! every execution pass: a session that is behind pulls the room state and
//! restarts, a session that is up to date pushes whatever it changed and
//! wakes everybody else. Conflicts resolve last-writer-wins, ordered by the
//! room lock.
//!
//! ## Architecture
//!
//! ```text
//! concord-core
//!   ├─ RoomRegistry     (one Room per name, known room names)
//!   ├─ Room             (state + timestamp + sessions behind one lock)
//!   │    └─ sync        (pull-if-stale / diff-and-push / broadcast)
//!   ├─ SessionAdapter   (calling session: snapshot, keys, write-back)
//!   ├─ RestartNotifier  (wake other sessions, report unreachable ones)
//!   ├─ keys             (private keys, form submitters, control ids)
//!   └─ Environment      (clock + randomness, swapped out in simulation)
//! ```
//!
//! The core never blocks on I/O and never unwinds a session itself: a
//! restart is handed back as [`SyncOutcome::Restart`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod adapter;
pub mod env;
mod error;
pub mod keys;
mod registry;
mod room;
mod state;
mod timestamp;

pub use adapter::{Reachability, RestartNotifier, SessionAdapter, SessionId};
pub use env::Environment;
pub use error::RoomError;
pub use keys::KeyError;
pub use registry::{KnownRooms, RoomRegistry};
pub use room::{Room, SyncOutcome};
pub use state::{RoomSnapshot, StateMap, Value};
pub use timestamp::Timestamp;
