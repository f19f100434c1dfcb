//! Reference model for model-based testing.
//!
//! The model captures room synchronization with plain integers: versions
//! instead of timestamps, `i64` instead of opaque values, and a flag per
//! session instead of restart channels. It serves as the oracle against
//! which the real implementation is verified.
//!
//! # Design Principles
//!
//! - Simplicity: The model should be obviously correct
//! - Captures WHAT, not HOW
//! - Deterministic: Same inputs produce same outputs

pub mod operation;
mod session;
mod world;

pub use operation::{
    KEY_SPACE, Operation, OperationError, OperationResult, SessionIndex, SyncKind, shared_key,
};
pub use session::{DRAFT_KEY, ModelSession, SessionView};
pub use world::{ModelRoom, ModelWorld, ObservableState};
