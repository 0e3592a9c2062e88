//! Simulation clock.
//!
//! The clock is the single source of truth for simulated time. It counts
//! steps and accumulates simulated seconds; decision cooldowns, strike
//! timing and removal delays are all measured against
//! [`SimClock::now`], never against wall-clock time.

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ClockError {
    /// Step counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,

    /// A step was requested with a non-positive or non-finite duration.
    #[error("invalid step duration: {0}")]
    InvalidStep(f64),
}

/// Step counter plus accumulated simulated seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimClock {
    tick: u64,
    elapsed: f64,
}

impl SimClock {
    /// A clock at tick 0, time 0.
    pub const fn new() -> Self {
        Self {
            tick: 0,
            elapsed: 0.0,
        }
    }

    /// Number of completed steps.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Simulated seconds since start.
    pub const fn now(&self) -> f64 {
        self.elapsed
    }

    /// Advance by one step of `dt` seconds. Returns the new tick number.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidStep`] for a non-positive or
    /// non-finite `dt`, or [`ClockError::TickOverflow`] at `u64::MAX`.
    pub fn advance(&mut self, dt: f64) -> Result<u64, ClockError> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(ClockError::InvalidStep(dt));
        }
        self.tick = self.tick.checked_add(1).ok_or(ClockError::TickOverflow)?;
        self.elapsed += dt;
        Ok(self.tick)
    }
}
