//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples room logic from system resources (the
//! wall clock and randomness). This enables:
//!
//! - Deterministic Simulation: the harness provides a virtual clock and a
//!   seeded RNG, so a failing interleaving can be replayed exactly.
//!
//! - Production Runtime: `SystemEnv` uses the real clock and OS entropy
//!   without any change to the reconciliation logic.
//!
//! # Invariants
//!
//! - Determinism: Given the same seed, `random_bytes()` produces the same
//!   sequence
//! - Isolation: Implementations must not share global state

use crate::timestamp::Timestamp;

/// Abstract environment providing a clock and randomness.
///
/// Rooms never read the clock directly. Every timestamp bump goes through
/// [`Environment::now`] and is then forced strictly past the previous room
/// timestamp, so a clock that stalls or steps backwards can delay wall-clock
/// accuracy but never break ordering.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current wall-clock reading in microseconds since the Unix epoch.
    fn wall_clock_micros(&self) -> u64;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Determinism during simulations: Given the same RNG seed, this produces
    ///   the same sequence of bytes
    /// - Unpredictability in production: Uses OS entropy
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Current clock reading as a room [`Timestamp`].
    fn now(&self) -> Timestamp {
        Timestamp::from_micros(self.wall_clock_micros())
    }

    /// Generates a random `u64`.
    ///
    /// Used for session identifiers.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Generates a random `u128`.
    ///
    /// Used for generated control identifiers.
    fn random_u128(&self) -> u128 {
        let mut bytes = [0u8; 16];
        self.random_bytes(&mut bytes);
        u128::from_be_bytes(bytes)
    }
}
