//! Concord session layer.
//!
//! This crate drives the room engine from `concord-core` for sessions living
//! in the same process:
//! - Tokio channels for restart signals between sessions
//! - System time and OS randomness
//! - Optional on-disk persistence of room snapshots
//!
//! ## Architecture
//!
//! ```text
//! concord-session
//!   ├─ Rooms          (enter / exit / delete / run_pass facade)
//!   ├─ SessionHub     (session id → restart channel, RestartNotifier)
//!   ├─ LocalSession   (values, controls, forms; SessionAdapter)
//!   ├─ RoomStore      (MemoryStore, DirectoryStore)
//!   └─ SystemEnv      (production Environment impl)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod hub;
mod local;
mod rooms;
pub mod store;
mod system_env;

pub use error::SessionError;
pub use hub::{HubConfig, SessionHub, SessionSignal, SignalReceiver};
pub use local::{Control, ControlKind, LocalSession};
pub use rooms::{PassOutcome, RoomStatus, Rooms, RoomsConfig};
pub use store::{DirectoryStore, MemoryStore, RoomStore, StoreError};
pub use system_env::SystemEnv;
