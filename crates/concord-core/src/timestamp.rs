//! Room timestamps.
//!
//! A [`Timestamp`] is a hybrid logical clock reading: microseconds since the
//! Unix epoch, bumped past the previous value whenever the wall clock has not
//! moved forward. Sessions compare timestamps only for equality (am I behind
//! the room?), rooms require them to strictly increase.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Monotonic room timestamp.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Sentinel strictly earlier than any real update.
    pub const EPOCH: Self = Self(0);

    /// Build a timestamp from microseconds since the Unix epoch.
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Microseconds since the Unix epoch.
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// Whether this is the [`Timestamp::EPOCH`] sentinel.
    pub const fn is_epoch(self) -> bool {
        self.0 == 0
    }

    /// The timestamp that follows `self` given a clock reading.
    ///
    /// Always strictly greater than `self`: the clock reading wins when it is
    /// ahead, otherwise the logical component advances by one.
    #[must_use]
    pub fn advance(self, clock: Self) -> Self {
        Self(clock.0.max(self.0.saturating_add(1)))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}us", self.0)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn epoch_is_smallest() {
        assert!(Timestamp::EPOCH.is_epoch());
        assert!(Timestamp::EPOCH < Timestamp::from_micros(1));
        assert_eq!(Timestamp::default(), Timestamp::EPOCH);
    }

    #[test]
    fn advance_prefers_clock_when_ahead() {
        let prev = Timestamp::from_micros(10);
        assert_eq!(prev.advance(Timestamp::from_micros(50)), Timestamp::from_micros(50));
    }

    #[test]
    fn advance_ticks_logically_when_clock_stalls() {
        let prev = Timestamp::from_micros(10);
        assert_eq!(prev.advance(Timestamp::from_micros(10)), Timestamp::from_micros(11));
        assert_eq!(prev.advance(Timestamp::from_micros(3)), Timestamp::from_micros(11));
    }

    proptest! {
        #[test]
        fn prop_advance_strictly_increases(prev in 0u64..u64::MAX, clock in any::<u64>()) {
            let prev = Timestamp::from_micros(prev);
            prop_assert!(prev.advance(Timestamp::from_micros(clock)) > prev);
        }
    }
}
