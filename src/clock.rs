use time::OffsetDateTime;

/// Source of "now" for everything that stamps or windows activity data.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Always returns the same instant.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

/// Moves forward by `step` on every read, starting at `start`.
#[cfg(test)]
pub struct SteppingClock {
    start: OffsetDateTime,
    step: time::Duration,
    reads: std::sync::atomic::AtomicI32,
}

#[cfg(test)]
impl SteppingClock {
    pub fn new(start: OffsetDateTime, step: time::Duration) -> Self {
        Self {
            start,
            step,
            reads: std::sync::atomic::AtomicI32::new(0),
        }
    }
}

#[cfg(test)]
impl Clock for SteppingClock {
    fn now(&self) -> OffsetDateTime {
        let n = self.reads.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.start + self.step * n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn stepping_clock_advances_per_read() {
        let clock = SteppingClock::new(datetime!(2024-01-02 12:30 UTC), time::Duration::hours(1));
        assert_eq!(clock.now(), datetime!(2024-01-02 12:30 UTC));
        assert_eq!(clock.now(), datetime!(2024-01-02 13:30 UTC));
    }
}
