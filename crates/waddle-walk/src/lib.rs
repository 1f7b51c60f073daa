//! Footstep planning, ZMP walk trajectories and the walk engine.
//!
//! # Architecture
//!
//! ```text
//! WalkCommand ──► RepetitiveFootstepsPlanner ──► [Footstep] ──► make_supports ──► [Support]
//!                                                                                    │
//!                         WalkPatternGenerator (schedule, CoM QP, swing feet) ◄──────┘
//!                                         │
//!                                         ▼
//!                                   WalkTrajectory ──► WalkTasks ──► KinematicsSolver
//! ```
//!
//! [`WalkEngine`] owns all of the above plus the robot state and runs the
//! warm-up / walking / faulted state machine one control tick at a time.
//! [`ControlLoop`] drives the engine against an [`ActuatorInterface`] in
//! real time.

pub mod com;
pub mod engine;
pub mod error;
pub mod footsteps;
pub mod generator;
pub mod polygon;
pub mod runner;
pub mod support;
pub mod swing;
pub mod tasks;
pub mod trajectory;

pub use com::{ComState, ComTrajectory, plan_com, zmp_reference};
pub use engine::{ContactMonitor, EngineState, FeetContact, TickReport, WalkEngine};
pub use error::WalkError;
pub use footsteps::{
    CLOSING_STEPS, DEFAULT_STEPS, Footstep, RepetitiveFootstepsPlanner, WalkCommand,
    make_supports,
};
pub use generator::WalkPatternGenerator;
pub use runner::{ActuatorError, ActuatorInterface, ContactSensor, ControlLoop, NoContact, RunSummary};
pub use support::Support;
pub use swing::SwingTrajectory;
pub use tasks::WalkTasks;
pub use trajectory::WalkTrajectory;

/// Convenience re-exports.
pub mod prelude {
    pub use crate::engine::{EngineState, FeetContact, WalkEngine};
    pub use crate::footsteps::{Footstep, RepetitiveFootstepsPlanner, WalkCommand};
    pub use crate::runner::{ActuatorInterface, ContactSensor, ControlLoop};
    pub use crate::trajectory::WalkTrajectory;
}
