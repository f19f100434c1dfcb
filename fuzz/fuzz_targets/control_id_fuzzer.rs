//! Fuzz target for control id normalization
//!
//! # Invariants
//!
//! - `control_id(hash, Some(key))` always normalizes back to `key`
//! - Unkeyed ids and plain keys normalize to themselves
//! - Arbitrary strings either normalize or fail with `MalformedControlId`
//! - NEVER panic on any input

#![no_main]

use arbitrary::Arbitrary;
use concord_core::keys::{self, KeyError};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
struct FuzzInput {
    hash: u128,
    user_key: Option<String>,
    raw: String,
}

fuzz_target!(|input: FuzzInput| {
    let id = keys::control_id(input.hash, input.user_key.as_deref());
    let normalized = keys::control_id_to_user_key(&id);
    match input.user_key.as_deref() {
        Some(key) if key != "None" && !key.ends_with("-None") => {
            assert_eq!(normalized, Ok(key), "keyed id must round-trip: {id}");
        },
        _ => assert_eq!(normalized, Ok(id.as_str()), "unkeyed id must normalize to itself"),
    }

    match keys::control_id_to_user_key(&input.raw) {
        Ok(key) => assert!(input.raw.ends_with(key)),
        Err(KeyError::MalformedControlId { id }) => {
            assert_eq!(id, input.raw);
            assert!(keys::is_keyed_control_id(&input.raw));
        },
    }
});
