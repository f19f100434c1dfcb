//! Fuzz target for room reconciliation
//!
//! Drive the real session layer and the reference model with the same
//! operation sequence and require identical behavior.
//!
//! # Strategy
//!
//! - Operation sequences: edits, syncs, room entry/exit, form and trigger
//!   interaction, disconnects, room deletion, clock jumps
//! - Session count and RNG seed chosen by the fuzzer
//!
//! # Invariants
//!
//! - Every operation returns the same result in model and real system
//! - Observable state (room contents, membership, session values) matches
//!   after every operation
//! - Private keys and trigger controls never reach the room
//! - NEVER panic on any operation sequence

#![no_main]

use arbitrary::Arbitrary;
use concord_harness::{ModelWorld, Operation, RealWorld};
use libfuzzer_sys::fuzz_target;

/// Fuzz input with a deterministic seed for session ids and control ids.
#[derive(Debug, Clone, Arbitrary)]
struct FuzzInput {
    /// Seed for the simulated environment.
    seed: u64,
    /// Number of sessions (mapped to 1..=4).
    sessions: u8,
    /// Operation sequence to apply.
    ops: Vec<Operation>,
}

fuzz_target!(|input: FuzzInput| {
    let num_sessions = usize::from(input.sessions % 4) + 1;
    let mut model = ModelWorld::new(num_sessions);
    let mut real = RealWorld::new(num_sessions, input.seed);

    for (i, op) in input.ops.into_iter().take(256).enumerate() {
        let op = op.clamped(num_sessions);

        let model_result = model.apply(&op);
        let real_result = real.apply(&op);
        assert_eq!(model_result, real_result, "result divergence at op {i}: {op:?}");

        let state = real.observable_state();
        assert_eq!(model.observable_state(), state, "state divergence after op {i}: {op:?}");
        assert!(
            state.room_state.keys().all(|key| concord_core::keys::is_synced(key) && key != "click"),
            "session-local key reached the room: {:?}",
            state.room_state
        );
    }
});
