//! Time management for the simulation
//!
//! The simulation operates in continuous time. The clock only moves forward,
//! jumping from one event instant to the next.

use serde::{Deserialize, Serialize};

/// Simulated clock, monotonically non-decreasing
///
/// # Example
/// ```
/// use tandem_simulator_core_rs::SimClock;
///
/// let mut clock = SimClock::new();
/// assert_eq!(clock.now(), 0.0);
///
/// let elapsed = clock.advance_to(2.5);
/// assert_eq!(elapsed, 2.5);
/// assert_eq!(clock.now(), 2.5);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SimClock {
    /// Simulated time elapsed since the start of the run
    now: f64,
}

impl SimClock {
    /// Create a clock at time zero
    pub fn new() -> Self {
        Self { now: 0.0 }
    }

    /// Restore a clock at a given instant (used when loading checkpoints)
    ///
    /// # Panics
    /// Panics if `now` is negative or not finite
    pub fn at(now: f64) -> Self {
        assert!(
            now.is_finite() && now >= 0.0,
            "clock time must be finite and non-negative"
        );
        Self { now }
    }

    /// Current simulated time
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Move the clock forward to `time`, returning the elapsed interval
    ///
    /// # Panics
    /// Panics if `time` is earlier than the current time. Events are popped in
    /// time order, so a regression means the event queue is corrupt.
    ///
    /// # Example
    /// ```
    /// use tandem_simulator_core_rs::SimClock;
    ///
    /// let mut clock = SimClock::new();
    /// clock.advance_to(1.0);
    /// assert_eq!(clock.advance_to(1.0), 0.0);
    /// ```
    pub fn advance_to(&mut self, time: f64) -> f64 {
        assert!(time >= self.now, "clock cannot move backwards");
        let elapsed = time - self.now;
        self.now = time;
        elapsed
    }

    /// Whether the clock has reached `horizon`
    pub fn has_reached(&self, horizon: f64) -> bool {
        self.now >= horizon
    }
}
