//! Cancellation of a running exploration.
//!
//! A [`Watchdog`] is polled by the engine at every block entry and before
//! every solver query. It trips when its flag is set from outside, or when its
//! deadline has passed. Polling is cooperative: a solver query that is already
//! running is bounded by its own timeout, which the engine clamps with
//! [`Watchdog::clamp`].

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

/// A cancellation flag with an optional deadline. Clones share the flag.
#[derive(Clone, Debug, Default)]
pub struct Watchdog {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Watchdog {
    /// A watchdog that only stops when cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an externally owned `flag`.
    #[must_use]
    pub fn from_flag(flag: Arc<AtomicBool>) -> Self {
        Self { flag, deadline: None }
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the deadline `budget` from now.
    #[must_use]
    pub fn with_budget(self, budget: Duration) -> Self {
        self.with_deadline(Instant::now() + budget)
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Checks if exploration should halt.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || self.deadline.map_or(false, |d| Instant::now() >= d)
    }

    /// Time left before the deadline, `None` without one.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Bounds a solver timeout by the remaining budget.
    #[must_use]
    pub fn clamp(&self, timeout: Duration) -> Duration {
        match self.remaining() {
            Some(left) => timeout.min(left),
            None => timeout,
        }
    }
}
