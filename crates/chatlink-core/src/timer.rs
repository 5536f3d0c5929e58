//! Elapsed-time deadlines.
//!
//! Instants are only required to support subtraction, so a deadline is kept
//! as a start instant plus a duration and checked by comparing elapsed time.

use std::{ops::Sub, time::Duration};

/// A one-shot deadline armed at `started`, due `after` later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer<I> {
    started: I,
    after: Duration,
}

impl<I> Timer<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Arm a deadline.
    pub fn new(started: I, after: Duration) -> Self {
        Self { started, after }
    }

    /// Instant the timer was armed.
    pub fn started(&self) -> I {
        self.started
    }

    /// Configured delay.
    pub fn after(&self) -> Duration {
        self.after
    }

    /// Time since the timer was armed. Zero if `now` precedes it.
    pub fn elapsed(&self, now: I) -> Duration {
        if now < self.started { Duration::ZERO } else { now - self.started }
    }

    /// True once `after` has elapsed.
    pub fn is_due(&self, now: I) -> bool {
        self.elapsed(now) >= self.after
    }
}
