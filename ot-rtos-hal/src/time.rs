//! Time types for the adaptation layer
//!
//! The platform clock is a free-running microsecond counter, matching the
//! resolution the network stack expects from its platform time source.

use core::time::Duration;

/// Point on the platform's monotonic microsecond timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Instant {
    /// Microseconds since the clock started
    micros: u64,
}

impl Instant {
    /// Clock origin
    pub const ZERO: Instant = Instant { micros: 0 };

    /// Create from a raw microsecond reading
    pub const fn from_micros(micros: u64) -> Self {
        Self { micros }
    }

    /// Raw microsecond reading
    pub const fn as_micros(&self) -> u64 {
        self.micros
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later
    pub fn duration_since(&self, earlier: Instant) -> Duration {
        Duration::from_micros(self.micros.saturating_sub(earlier.micros))
    }

    /// Time elapsed from `self` to `now`
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.duration_since(*self)
    }
}

impl core::ops::Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, duration: Duration) -> Instant {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        Instant {
            micros: self.micros.saturating_add(micros),
        }
    }
}

impl core::ops::Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, other: Instant) -> Duration {
        self.duration_since(other)
    }
}

/// Monotonic clock source
pub trait Clock {
    /// Current reading of the clock
    fn now(&self) -> Instant;
}
