//! Single-shot timer driven by an explicit clock.
//!
//! Timers never call back. The owner polls them with the current instant and
//! acts on the purpose tag returned when a deadline passes, which keeps all
//! expiry handling on the application context and makes the clock
//! substitutable in tests.

use std::time::{Duration, Instant};

/// A timer that fires at most once per start.
#[derive(Debug, Clone)]
pub struct SingleShotTimer<P> {
    armed: Option<(Instant, P)>,
}

impl<P> Default for SingleShotTimer<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> SingleShotTimer<P> {
    /// Create a disarmed timer.
    pub fn new() -> Self {
        Self { armed: None }
    }

    /// Arm the timer to fire `duration` after `now`.
    ///
    /// Any previous arming is cancelled first.
    pub fn start(&mut self, now: Instant, duration: Duration, purpose: P) {
        self.cancel();
        self.armed = Some((now + duration, purpose));
    }

    /// Disarm the timer. No effect if not armed.
    pub fn cancel(&mut self) {
        self.armed = None;
    }

    /// Check if the timer is armed.
    pub fn armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Instant at which the timer fires, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.armed.as_ref().map(|(deadline, _)| *deadline)
    }

    /// Purpose of the current arming.
    pub fn purpose(&self) -> Option<&P> {
        self.armed.as_ref().map(|(_, purpose)| purpose)
    }

    /// Fire the timer if its deadline has been reached.
    ///
    /// Returns the purpose exactly once and disarms.
    pub fn poll(&mut self, now: Instant) -> Option<P> {
        if !self.deadline().is_some_and(|deadline| now >= deadline) {
            return None;
        }
        self.armed.take().map(|(_, purpose)| purpose)
    }
}
