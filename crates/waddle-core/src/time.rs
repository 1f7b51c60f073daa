use std::fmt;
use std::time::{Duration, Instant};

use crate::error::ClockError;

// ---------------------------------------------------------------------------
// PlanningClock
// ---------------------------------------------------------------------------

/// Planning time `t` of the walk engine, advanced once per control tick.
///
/// Time is derived from an integer tick count (`t = origin + ticks * dt`) so
/// that long runs do not accumulate floating-point drift.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanningClock {
    origin: f64,
    ticks: u64,
    dt: f64,
}

impl PlanningClock {
    /// Create a clock at `t = 0` advancing by `dt` per tick.
    #[must_use]
    pub const fn new(dt: f64) -> Self {
        Self {
            origin: 0.0,
            ticks: 0,
            dt,
        }
    }

    /// Current planning time [s].
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn t(&self) -> f64 {
        (self.ticks as f64).mul_add(self.dt, self.origin)
    }

    /// Ticks elapsed since the last reset.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Tick period [s].
    #[must_use]
    pub const fn dt(&self) -> f64 {
        self.dt
    }

    /// Advance by one tick and return the new time.
    pub fn advance(&mut self) -> f64 {
        self.ticks = self.ticks.saturating_add(1);
        self.t()
    }

    /// Restart counting from `t0`.
    pub const fn reset_to(&mut self, t0: f64) {
        self.origin = t0;
        self.ticks = 0;
    }
}

impl fmt::Display for PlanningClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={:.3}s (tick {})", self.t(), self.ticks)
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of wall-clock time used only to pace real-time execution.
pub trait Clock {
    /// Monotonic time since an arbitrary origin.
    fn now(&self) -> Duration;

    /// Block until `now() >= deadline`.
    fn sleep_until(&mut self, deadline: Duration);
}

/// Granularity of [`SystemClock`] sleeps.
pub const SLEEP_INCREMENT: Duration = Duration::from_micros(500);

/// Operating-system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep_until(&mut self, deadline: Duration) {
        loop {
            let now = self.now();
            if now >= deadline {
                return;
            }
            std::thread::sleep((deadline - now).min(SLEEP_INCREMENT));
        }
    }
}

/// Fake clock for tests: time only moves when told to, or when slept on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManualClock {
    now: Duration,
    sleeps: u32,
}

impl ManualClock {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: Duration::ZERO,
            sleeps: 0,
        }
    }

    /// Move time forward, as if the control tick took `delta` to compute.
    pub fn advance(&mut self, delta: Duration) {
        self.now += delta;
    }

    /// Number of `sleep_until` calls that actually had to wait.
    #[must_use]
    pub const fn sleeps(&self) -> u32 {
        self.sleeps
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now
    }

    fn sleep_until(&mut self, deadline: Duration) {
        if deadline > self.now {
            self.now = deadline;
            self.sleeps += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Pacer
// ---------------------------------------------------------------------------

/// Keeps wall-clock time from running ahead of planning time.
///
/// The pacer maps a virtual time `t` onto the wall clock and blocks until the
/// wall clock reaches it. Jitter is bounded by the clock's sleep granularity.
#[derive(Debug)]
pub struct Pacer<C: Clock> {
    clock: C,
    /// Wall-clock seconds corresponding to virtual time zero.
    origin: f64,
}

impl<C: Clock> Pacer<C> {
    /// Create a pacer whose virtual time zero is the clock's current time.
    pub fn new(clock: C) -> Self {
        let origin = clock.now().as_secs_f64();
        Self { clock, origin }
    }

    /// Align virtual time `t` with the clock's current time.
    pub fn rebase(&mut self, t: f64) {
        self.origin = self.clock.now().as_secs_f64() - t;
    }

    /// Block until the wall clock reaches virtual time `t`.
    ///
    /// Returns how late the call was, zero when it had to wait.
    pub fn wait_until(&mut self, t: f64) -> Result<Duration, ClockError> {
        if !t.is_finite() {
            return Err(ClockError::NonFiniteTime(t));
        }
        let deadline = self.origin + t;
        let now = self.clock.now().as_secs_f64();
        if now >= deadline {
            return Ok(Duration::from_secs_f64(now - deadline));
        }
        self.clock.sleep_until(Duration::from_secs_f64(deadline.max(0.0)));
        Ok(Duration::ZERO)
    }

    /// The underlying clock.
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    pub const fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }
}
