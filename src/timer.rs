//! Timing of proposer retries.
use rand::Rng;
use std::cmp::min;
use std::time::{Duration, Instant};

/// Timer that allows the proposer to re-enter Phase 1 in order to
/// drive resolution with a higher ballot.
///
/// Every consecutive retry doubles the wait, up to a cap, and the actual
/// deadline is drawn from the upper half of the wait so that competing
/// proposers drift apart.
#[derive(Debug)]
pub struct RetryTimer {
    starting: Duration,
    max: Duration,
    backoff: Duration,
    deadline: Option<Instant>,
}

impl RetryTimer {
    /// Creates an unscheduled timer
    pub fn new(starting: Duration, max: Duration) -> RetryTimer {
        RetryTimer {
            starting,
            max: max.max(starting),
            backoff: starting,
            deadline: None,
        }
    }

    /// Schedules the deadline of a new attempt. A wait beyond the range of
    /// the clock leaves the attempt without a deadline.
    pub fn schedule(&mut self, now: Instant) {
        let jittered = jitter(self.backoff);
        trace!("Scheduling retry in {:?}", jittered);
        self.deadline = now.checked_add(jittered);
        if self.deadline.is_none() {
            warn!("Retry in {:?} is out of range, not scheduled", jittered);
        }
    }

    /// Schedules the deadline of an attempt that follows a timeout.
    pub fn schedule_retry(&mut self, now: Instant) {
        self.backoff = min(self.backoff.saturating_mul(2), self.max);
        self.schedule(now);
    }

    /// Clears the current timer
    pub fn reset(&mut self) {
        self.backoff = self.starting;
        self.deadline = None;
    }

    /// Time at which the attempt in flight is abandoned
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Current backoff before jitter
    pub fn backoff(&self) -> Duration {
        self.backoff
    }
}

fn jitter(backoff: Duration) -> Duration {
    let half = backoff / 2;
    let spread = u64::try_from((backoff - half).as_micros()).unwrap_or(u64::MAX);
    half + Duration::from_micros(rand::rng().random_range(0..=spread))
}
