//! Simulated environment.
//!
//! A virtual clock and a seeded ChaCha RNG. Every clock read ticks the clock
//! by one microsecond, so two reads never return the same instant and room
//! timestamps stay unique even across room deletion.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use concord_core::Environment;
use parking_lot::Mutex;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Virtual start of every simulation (2023-11-14T22:13:20Z).
const SIM_EPOCH_MICROS: u64 = 1_700_000_000_000_000;

/// Deterministic environment for simulations.
///
/// Clones share the clock and the RNG.
#[derive(Debug, Clone)]
pub struct SimEnv {
    seed: u64,
    clock: Arc<AtomicU64>,
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl SimEnv {
    /// Create an environment from a seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            clock: Arc::new(AtomicU64::new(SIM_EPOCH_MICROS)),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    /// Seed this environment was created from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Move the virtual clock forward.
    pub fn advance(&self, by: Duration) {
        let micros = u64::try_from(by.as_micros()).unwrap_or(u64::MAX);
        self.clock.fetch_add(micros, Ordering::SeqCst);
    }

    /// Virtual time elapsed since the start of the simulation.
    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.clock.load(Ordering::SeqCst) - SIM_EPOCH_MICROS)
    }
}

impl Environment for SimEnv {
    fn wall_clock_micros(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().fill_bytes(buffer);
    }
}
