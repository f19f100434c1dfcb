//! Deterministic simulation harness for Concord room synchronization.
//!
//! Seeded implementation of the `Environment` trait for reproducible runs,
//! plus a reference model for model-based testing.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation. Operations are
//! applied to both the model and the real implementation ([`RealWorld`]),
//! and their results and observable states are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod real_world;
pub mod sim_env;

pub use model::{
    KEY_SPACE, ModelRoom, ModelSession, ModelWorld, ObservableState, Operation, OperationError,
    OperationResult, SessionIndex, SessionView, SyncKind,
};
pub use real_world::{ROOM, RealWorld};
pub use sim_env::SimEnv;
