use std::fmt;
use std::ops::Sub;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point in time, in milliseconds since the unix epoch.
///
/// Serialized as a plain integer so the persisted queue stays readable by other clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp {
    millis: i64,
}

impl Timestamp {
    pub fn from_millis(millis: i64) -> Self {
        Self { millis }
    }

    pub fn as_millis(self) -> i64 {
        self.millis
    }

    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.millis)
    }

    pub fn saturating_add(self, duration: Duration) -> Self {
        let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        Self::from_millis(self.millis.saturating_add(millis))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self::from_millis(value.timestamp_millis())
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = chrono::Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        chrono::Duration::milliseconds(self.millis.saturating_sub(rhs.millis))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(datetime) => write!(f, "{}", datetime.to_rfc3339()),
            None => write!(f, "{}ms", self.millis),
        }
    }
}

/// Source of the current time for the tracker.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Timestamp;
}

/// Reads the system wall clock on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now().into()
    }
}

/// Wall clock reading taken once, then advanced by the tokio timer clock.
///
/// Immune to wall clock jumps while the process runs, and follows tokio's virtual time
/// when the runtime is paused.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Timestamp,
    anchor: tokio::time::Instant,
}

impl MonotonicClock {
    pub fn new(origin: Timestamp) -> Self {
        Self {
            origin,
            anchor: tokio::time::Instant::now(),
        }
    }

    pub fn anchored_now() -> Self {
        Self::new(SystemClock.now())
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        self.origin.saturating_add(self.anchor.elapsed())
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn starting_at(start: Timestamp) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(start.as_millis())),
        }
    }

    pub fn set(&self, now: Timestamp) {
        self.millis.store(now.as_millis(), Ordering::SeqCst);
    }

    pub fn advance(&self, duration: Duration) {
        let next = self.now().saturating_add(duration);
        self.set(next);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difference_between_timestamps() {
        let start = Timestamp::from_millis(1_000);
        let end = Timestamp::from_millis(13_500);

        assert_eq!((end - start).num_seconds(), 12, "sub-second remainder is dropped");
        assert_eq!((start - end).num_seconds(), -12);
    }

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let clock = ManualClock::starting_at(Timestamp::from_millis(0));
        let other = clock.clone();

        clock.advance(Duration::from_secs(12));

        assert_eq!(other.now(), Timestamp::from_millis(12_000));
    }

    #[test]
    fn timestamp_displays_as_rfc3339() {
        let timestamp = Timestamp::from_millis(0);
        assert_eq!(timestamp.to_string(), "1970-01-01T00:00:00+00:00");
    }

    #[tokio::test(start_paused = true)]
    async fn monotonic_clock_follows_virtual_time() {
        let clock = MonotonicClock::new(Timestamp::from_millis(5_000));

        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(clock.now(), Timestamp::from_millis(35_000));
    }
}
