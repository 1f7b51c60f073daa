//! Robot description for the waddle walk engine.
//!
//! Parses URDF (via `urdf-rs`) into a [`RobotModel`] holding the kinematic
//! tree, joint limits and link masses, and ships the built-in duck biped.

pub mod duck;
pub mod error;
pub mod parser;
pub mod types;

pub use duck::{DUCK_BIPED_URDF, HEAD_JOINTS, LEFT_FOOT_FRAME, RIGHT_FOOT_FRAME, TRUNK_FRAME, duck_biped};
pub use error::ModelError;
pub use parser::{parse_file, parse_string};
pub use types::{Inertial, JointData, JointLimits, JointType, LinkData, Origin, RobotModel};
