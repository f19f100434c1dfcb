//! Model-based property tests.
//!
//! These tests generate random operation sequences and verify that the real
//! implementation behaves identically to the reference model.
//!
//! # Architecture
//!
//! ```text
//! proptest generates: Vec<Operation>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!      ModelWorld     RealWorld       Compare
//!      (reference)    (SimEnv)        results + state
//! ```

use concord_harness::{
    ModelWorld, Operation, OperationError, OperationResult, RealWorld, SyncKind,
};
use proptest::prelude::*;

/// Strategy for generating operations with valid session indices.
fn operation_strategy(num_sessions: usize) -> impl Strategy<Value = Operation> {
    let session = 0..u8::try_from(num_sessions).unwrap();
    let value = any::<i8>().prop_map(|v| v % 4);

    prop_oneof![
        // Weight towards operations that move state around
        4 => (session.clone(), 0..4u8, value.clone())
            .prop_map(|(session, slot, value)| Operation::Edit { session, slot, value }),
        6 => session.clone().prop_map(|session| Operation::Sync { session }),
        3 => session.clone().prop_map(|session| Operation::Enter { session }),
        1 => session.clone().prop_map(|session| Operation::Exit { session }),
        1 => (session.clone(), value.clone())
            .prop_map(|(session, value)| Operation::SetPrivate { session, value }),
        1 => session.clone().prop_map(|session| Operation::Press { session }),
        2 => (session.clone(), value)
            .prop_map(|(session, value)| Operation::Draft { session, value }),
        1 => session.clone().prop_map(|session| Operation::SubmitForm { session }),
        1 => session.clone().prop_map(|session| Operation::FinishPass { session }),
        1 => session.prop_map(|session| Operation::Disconnect { session }),
        1 => Just(Operation::DeleteRoom),
        1 => any::<u16>().prop_map(|millis| Operation::AdvanceTime { millis }),
    ]
}

proptest! {
    /// Verify that results and observable state match between model and real
    /// implementation after every operation.
    #[test]
    fn prop_model_matches_real(
        seed in any::<u64>(),
        num_sessions in 1..5usize,
        ops in prop::collection::vec(operation_strategy(4), 0..80)
    ) {
        let mut model = ModelWorld::new(num_sessions);
        let mut real = RealWorld::new(num_sessions, seed);

        for (i, op) in ops.into_iter().enumerate() {
            let op = op.clamped(num_sessions);

            let model_result = model.apply(&op);
            let real_result = real.apply(&op);

            prop_assert_eq!(
                &model_result,
                &real_result,
                "Divergence at operation {}: {:?}",
                i,
                op
            );
            prop_assert_eq!(
                model.observable_state(),
                real.observable_state(),
                "State divergence after operation {}: {:?}",
                i,
                op
            );
        }
    }

    /// Verify model invariants hold after any operation sequence.
    #[test]
    fn prop_model_invariants(
        num_sessions in 1..5usize,
        ops in prop::collection::vec(operation_strategy(4), 0..120)
    ) {
        let mut model = ModelWorld::new(num_sessions);

        for op in ops {
            let _ = model.apply(&op.clamped(num_sessions));
        }

        let state = model.observable_state();

        // Invariant: only sessions that are in the room are registered
        for &member in &model.room().members {
            let session = model.session(member).expect("member index in range");
            let in_room = state.sessions[usize::from(member)].as_ref().is_some_and(|s| s.in_room);
            prop_assert!(
                !session.is_alive() || in_room,
                "Session {} registered but not in room",
                member
            );
        }

        // Invariant: private keys and triggers never reach the room
        prop_assert!(state.room_state.keys().all(|key| key.starts_with('k') || key == "draft"));

        // Invariant: an empty room at the epoch has no state
        if model.room().version == 0 {
            prop_assert!(state.room_state.is_empty());
        }
    }

    /// Once a session has caught up, syncing again is never a push.
    #[test]
    fn prop_second_sync_never_pushes(
        seed in any::<u64>(),
        ops in prop::collection::vec(operation_strategy(3), 0..40),
        target in 0..3u8
    ) {
        let mut real = RealWorld::new(3, seed);
        for op in ops {
            let _ = real.apply(&op);
        }

        let sync = Operation::Sync { session: target };
        while real.apply(&sync) == OperationResult::Synced(SyncKind::Restart) {}
        let second = real.apply(&sync);
        prop_assert_ne!(second, OperationResult::Synced(SyncKind::Pushed));
    }
}

#[cfg(test)]
mod smoke_tests {
    use super::*;

    /// Basic smoke test: model and real agree on a hand-written scenario.
    #[test]
    fn model_and_real_basic_operations() {
        let mut model = ModelWorld::new(2);
        let mut real = RealWorld::new(2, 42);

        let script = [
            (Operation::Sync { session: 0 }, OperationResult::Error(OperationError::NotInRoom)),
            (Operation::Enter { session: 0 }, OperationResult::Ok),
            (Operation::Enter { session: 1 }, OperationResult::Ok),
            (Operation::Edit { session: 0, slot: 0, value: 1 }, OperationResult::Ok),
            (Operation::Sync { session: 0 }, OperationResult::Synced(SyncKind::Pushed)),
            (Operation::Sync { session: 1 }, OperationResult::Synced(SyncKind::Restart)),
            (Operation::Sync { session: 1 }, OperationResult::Synced(SyncKind::UpToDate)),
            (Operation::Press { session: 1 }, OperationResult::Ok),
            (Operation::Draft { session: 1, value: 3 }, OperationResult::Ok),
            (Operation::Sync { session: 1 }, OperationResult::Synced(SyncKind::UpToDate)),
            (Operation::SubmitForm { session: 1 }, OperationResult::Ok),
            (Operation::Sync { session: 1 }, OperationResult::Synced(SyncKind::Pushed)),
            (Operation::Disconnect { session: 1 }, OperationResult::Ok),
            (Operation::Edit { session: 0, slot: 1, value: 2 }, OperationResult::Ok),
            (Operation::Sync { session: 0 }, OperationResult::Synced(SyncKind::Restart)),
            (Operation::Sync { session: 0 }, OperationResult::Synced(SyncKind::Pushed)),
            (
                Operation::Exit { session: 1 },
                OperationResult::Error(OperationError::InvalidSession),
            ),
            (Operation::DeleteRoom, OperationResult::Ok),
            (Operation::Sync { session: 0 }, OperationResult::Synced(SyncKind::Restart)),
        ];

        for (op, expected) in script {
            assert_eq!(model.apply(&op), expected, "model: {op:?}");
            assert_eq!(real.apply(&op), expected, "real: {op:?}");
            assert_eq!(model.observable_state(), real.observable_state(), "after {op:?}");
        }

        let state = real.observable_state();
        assert!(state.room_state.is_empty());
        assert_eq!(state.active_sessions, 1);
        assert_eq!(state.sessions[1], None);
    }
}
