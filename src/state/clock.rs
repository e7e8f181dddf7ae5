use std::{
    sync::{Arc, Mutex},
    time::{Duration, SystemTime},
};

/// Time source injected into the application state.
///
/// Production code uses the system clock; tests use a manual clock they can
/// advance deterministically.
#[derive(Clone)]
pub struct Clock(Arc<ClockSource>);

enum ClockSource {
    System,
    Manual(Mutex<SystemTime>),
}

impl Clock {
    /// Clock backed by [`SystemTime::now`].
    pub fn system() -> Self {
        Self(Arc::new(ClockSource::System))
    }

    /// Clock frozen at `start` until advanced explicitly.
    pub fn manual(start: SystemTime) -> Self {
        Self(Arc::new(ClockSource::Manual(Mutex::new(start))))
    }

    /// Current instant according to this clock.
    pub fn now(&self) -> SystemTime {
        match self.0.as_ref() {
            ClockSource::System => SystemTime::now(),
            ClockSource::Manual(slot) => match slot.lock() {
                Ok(guard) => *guard,
                Err(poisoned) => *poisoned.into_inner(),
            },
        }
    }

    /// Move a manual clock forward. No-op on the system clock.
    pub fn advance(&self, by: Duration) {
        if let ClockSource::Manual(slot) = self.0.as_ref() {
            let mut guard = match slot.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *guard += by;
        }
    }
}

/// Whole minutes between two instants, rounded to the nearest minute.
///
/// Shared by the live-duration preview and the final persisted duration so the
/// two can never disagree. An end before the start yields zero.
pub fn minutes_between(start: SystemTime, end: SystemTime) -> u64 {
    let elapsed = end.duration_since(start).unwrap_or_default();
    (elapsed.as_millis() as u64 + 30_000) / 60_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minutes_round_to_nearest() {
        let start = SystemTime::UNIX_EPOCH;
        assert_eq!(minutes_between(start, start + Duration::from_secs(29)), 0);
        assert_eq!(minutes_between(start, start + Duration::from_secs(30)), 1);
        assert_eq!(minutes_between(start, start + Duration::from_secs(89)), 1);
        assert_eq!(minutes_between(start, start + Duration::from_secs(90)), 2);
        assert_eq!(minutes_between(start, start + Duration::from_secs(600)), 10);
    }

    #[test]
    fn reversed_interval_is_zero() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(120);
        assert_eq!(minutes_between(start, SystemTime::UNIX_EPOCH), 0);
    }

    #[test]
    fn manual_clock_advances() {
        let clock = Clock::manual(SystemTime::UNIX_EPOCH);
        clock.advance(Duration::from_secs(600));
        assert_eq!(
            clock.now(),
            SystemTime::UNIX_EPOCH + Duration::from_secs(600)
        );
    }
}
