//! Outer control loop: engine ticks, actuator commands and real-time pacing.
//!
//! [`ControlLoop`] owns a [`WalkEngine`], an [`ActuatorInterface`], an
//! optional [`ContactSensor`] and a [`Pacer`]. Each iteration ticks the
//! engine, sends the joint targets and then waits until the wall clock
//! catches up with planning time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{info, warn};
use waddle_core::{Clock, Pacer, SystemClock};
use waddle_ik::JointTargets;

use crate::engine::{EngineState, FeetContact, TickReport, WalkEngine};
use crate::error::WalkError;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Actuator failures. The loop logs them and keeps going.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActuatorError {
    #[error("actuator link error: {0}")]
    Link(String),

    #[error("actuator rejected command: {0}")]
    Rejected(String),
}

/// Receives joint targets once per control tick.
pub trait ActuatorInterface {
    /// Apply `targets` (joint name to angle in radians).
    fn send(&mut self, targets: &JointTargets) -> Result<(), ActuatorError>;

    /// Bring the actuators to a safe state when the loop exits.
    fn safe_stop(&mut self) -> Result<(), ActuatorError> {
        Ok(())
    }
}

/// Foot contact sensing, polled once per tick.
pub trait ContactSensor {
    /// `(right, left)` contact flags.
    fn get_feet_contact(&mut self) -> (bool, bool);
}

/// Placeholder sensor type for loops running without contact sensing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContact;

impl ContactSensor for NoContact {
    fn get_feet_contact(&mut self) -> (bool, bool) {
        (true, true)
    }
}

// ---------------------------------------------------------------------------
// RunSummary
// ---------------------------------------------------------------------------

/// Counters accumulated over a [`ControlLoop::run`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    /// Transitions into [`EngineState::Faulted`].
    pub faults: u32,
    pub replans: u32,
    pub ik_failures: u32,
    pub send_failures: u32,
    /// Worst lateness of a tick with respect to planning time.
    pub max_lag: Duration,
}

impl RunSummary {
    fn record(&mut self, previous: EngineState, report: &TickReport) {
        self.ticks += 1;
        if report.state.is_faulted() && !previous.is_faulted() {
            self.faults += 1;
        }
        if report.replanned {
            self.replans += 1;
        }
        self.ik_failures += report.ik_failures;
    }
}

// ---------------------------------------------------------------------------
// ControlLoop
// ---------------------------------------------------------------------------

/// Single-threaded real-time loop around a [`WalkEngine`].
pub struct ControlLoop<A, S = NoContact, C = SystemClock>
where
    A: ActuatorInterface,
    S: ContactSensor,
    C: Clock,
{
    engine: WalkEngine,
    actuator: A,
    sensor: Option<S>,
    pacer: Pacer<C>,
}

impl<A: ActuatorInterface> ControlLoop<A> {
    /// Loop paced by the system clock, without contact sensing.
    pub fn new(engine: WalkEngine, actuator: A) -> Self {
        Self {
            engine,
            actuator,
            sensor: None,
            pacer: Pacer::new(SystemClock::new()),
        }
    }
}

impl<A, S, C> ControlLoop<A, S, C>
where
    A: ActuatorInterface,
    S: ContactSensor,
    C: Clock,
{
    /// Poll `sensor` every tick; the engine may then fault on lost footing.
    pub fn with_sensor<S2: ContactSensor>(self, sensor: S2) -> ControlLoop<A, S2, C> {
        ControlLoop {
            engine: self.engine,
            actuator: self.actuator,
            sensor: Some(sensor),
            pacer: self.pacer,
        }
    }

    /// Pace against `clock` instead.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> ControlLoop<A, S, C2> {
        ControlLoop {
            engine: self.engine,
            actuator: self.actuator,
            sensor: self.sensor,
            pacer: Pacer::new(clock),
        }
    }

    pub const fn engine(&self) -> &WalkEngine {
        &self.engine
    }

    pub const fn engine_mut(&mut self) -> &mut WalkEngine {
        &mut self.engine
    }

    pub const fn actuator(&self) -> &A {
        &self.actuator
    }

    pub const fn pacer(&self) -> &Pacer<C> {
        &self.pacer
    }

    /// Run until `stop` is set or `max_ticks` ticks have elapsed.
    ///
    /// Warm-up ticks are paced at the control period too. The actuators
    /// are sent a safe stop on every exit path.
    pub fn run(&mut self, stop: &AtomicBool, max_ticks: Option<u64>) -> Result<RunSummary, WalkError> {
        let result = self.run_ticks(stop, max_ticks);
        if let Err(err) = self.actuator.safe_stop() {
            warn!(%err, "safe stop failed");
        }
        if let Ok(summary) = &result {
            info!(
                ticks = summary.ticks,
                faults = summary.faults,
                replans = summary.replans,
                ik_failures = summary.ik_failures,
                send_failures = summary.send_failures,
                "control loop stopped"
            );
        }
        result
    }

    #[allow(clippy::cast_precision_loss)]
    fn run_ticks(&mut self, stop: &AtomicBool, max_ticks: Option<u64>) -> Result<RunSummary, WalkError> {
        let dt = self.engine.config().control.dt;
        let mut summary = RunSummary::default();
        let mut warmup_ticks: u64 = 0;
        let t0 = if self.engine.state() == EngineState::Warmup {
            0.0
        } else {
            self.engine.t()
        };
        self.pacer.rebase(t0);

        while !stop.load(Ordering::Relaxed) && max_ticks.is_none_or(|max| summary.ticks < max) {
            let previous = self.engine.state();
            let contact = self
                .sensor
                .as_mut()
                .map(|sensor| FeetContact::from(sensor.get_feet_contact()));
            let report = self.engine.tick(contact)?;
            summary.record(previous, &report);

            if let Err(err) = self.actuator.send(&self.engine.joint_targets()) {
                summary.send_failures += 1;
                warn!(t = report.t, %err, "failed to send joint targets");
            }

            let deadline = if previous == EngineState::Warmup {
                warmup_ticks += 1;
                if report.state != EngineState::Warmup {
                    self.pacer.rebase(report.t - dt);
                    report.t
                } else {
                    warmup_ticks as f64 * dt
                }
            } else {
                report.t
            };
            let lag = self.pacer.wait_until(deadline)?;
            summary.max_lag = summary.max_lag.max(lag);
        }
        Ok(summary)
    }
}
