//! Wall-clock abstraction used for entry timestamps and freshness checks.

use crate::Timestamp;
use chrono::Utc;

/// Source of the current wall-clock time.
///
/// The cache stamps entries and judges their age through this trait so that
/// TTL behavior can be driven deterministically in tests.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Timestamp;
}

/// The system UTC clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
