//! Whole-body inverse kinematics for floating-base robots.
//!
//! # Architecture
//!
//! ```text
//! RobotModel ──► HumanoidRobot ──► KinematicsSolver ──► joint targets
//!                 (FK, Jacobians)    (tasks → QP → Δ)
//! ```
//!
//! Every [`KinematicsSolver::solve`] builds one quadratic program over the
//! displacement of the floating base and all actuated joints, solves it with
//! Clarabel, and integrates the result into the [`HumanoidRobot`]. The same
//! dense QP builder ([`qp::QuadraticProgram`]) is reused by the walk
//! generator for CoM planning.

pub mod chain;
pub mod error;
pub mod qp;
pub mod robot;
pub mod solver;
pub mod tasks;

pub use chain::KinematicChain;
pub use error::IkError;
pub use qp::{QpError, QpSettings, QuadraticProgram};
pub use robot::{BASE_DOF, HumanoidRobot, JointTargets, RobotState};
pub use solver::{DEFAULT_REGULARIZATION, KinematicsSolver};
pub use tasks::{Priority, Task, TaskId, TaskTarget};
