//! Wall-clock measurement of the full verification pass.

use std::time::{Duration, Instant};

use crate::store::{Store, StoreError};
use crate::verify::{verify_all, VerificationReport};

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// A point on a monotonic clock split into whole seconds and a sub-second part.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timespec {
    secs: u64,
    nanos: u32,
}

impl Timespec {
    /// Nanoseconds beyond one second carry into `secs`.
    pub fn new(secs: u64, nanos: u32) -> Self {
        Self {
            secs: secs + u64::from(nanos / NANOS_PER_SEC),
            nanos: nanos % NANOS_PER_SEC,
        }
    }

    pub fn secs(&self) -> u64 {
        self.secs
    }

    pub fn nanos(&self) -> u32 {
        self.nanos
    }

    /// Time from `start` to `self`, zero if `start` is later.
    pub fn elapsed_since(&self, start: Timespec) -> Duration {
        if *self <= start {
            return Duration::ZERO;
        }
        if self.nanos < start.nanos {
            // Borrow one second for the sub-second difference.
            Duration::new(
                self.secs - start.secs - 1,
                NANOS_PER_SEC + self.nanos - start.nanos,
            )
        } else {
            Duration::new(self.secs - start.secs, self.nanos - start.nanos)
        }
    }
}

impl From<Duration> for Timespec {
    fn from(d: Duration) -> Self {
        Self::new(d.as_secs(), d.subsec_nanos())
    }
}

/// Monotonic clock reporting [`Timespec`]s relative to its creation.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> Timespec {
        Timespec::from(self.origin.elapsed())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimedVerification {
    pub report: VerificationReport,
    pub elapsed: Duration,
}

impl TimedVerification {
    pub fn elapsed_nanos(&self) -> u64 {
        u64::try_from(self.elapsed.as_nanos()).unwrap_or(u64::MAX)
    }
}

/// Run [`verify_all`] between two clock readings.
pub async fn time_verification<S>(store: &mut S, space: &str, count: u32) -> Result<TimedVerification, StoreError>
where
    S: Store + ?Sized,
{
    let clock = MonotonicClock::start();
    let start = clock.now();
    let report = verify_all(store, space, count).await?;
    let end = clock.now();

    let timed = TimedVerification {
        report,
        elapsed: end.elapsed_since(start),
    };
    let nanos = timed.elapsed_nanos();
    tracing::info!(
        space,
        elapsed_ns = nanos,
        searches = timed.report.searches,
        anomalies = timed.report.anomalies.total,
        "test took {nanos} nanoseconds for {count} searches"
    );
    Ok(timed)
}
