//! Production Environment implementation using system time and RNG.
//!
//! This module provides `SystemEnv`, the production implementation of the
//! `Environment` trait that uses the real wall clock and OS randomness.

use std::time::{SystemTime, UNIX_EPOCH};

use concord_core::Environment;

/// Production environment using system time and OS randomness.
///
/// This implementation:
/// - Uses `SystemTime::now()` for room timestamps
/// - Uses `getrandom` for session identifiers
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn wall_clock_micros(&self) -> u64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
            Err(e) => {
                // Rooms still order correctly: the logical component takes over.
                tracing::warn!("system clock before Unix epoch: {}", e);
                0
            },
        }
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).unwrap_or_else(|e| {
            // Session ids only need to be unique, and the hub retries on
            // collision, so a degraded source is survivable.
            tracing::error!("getrandom failed: {}", e);
            let seed = self.wall_clock_micros().to_le_bytes();
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = seed[i % seed.len()] ^ (i as u8);
            }
        });
    }
}
