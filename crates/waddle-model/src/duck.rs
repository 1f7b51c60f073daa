//! Built-in description of the small duck-like biped the engine walks.
//!
//! Five joints per leg (hip yaw, hip roll, hip pitch, knee, ankle) plus a
//! three-joint neck. Knees bend forward, bird style, with negative angles.

use crate::error::ModelError;
use crate::parser::parse_string;
use crate::types::RobotModel;

/// URDF source of the duck biped.
pub const DUCK_BIPED_URDF: &str = include_str!("../assets/duck_biped.urdf");

/// Floating base link.
pub const TRUNK_FRAME: &str = "trunk";

/// Sole frames, at the centre of the footprint on the ground plane.
pub const LEFT_FOOT_FRAME: &str = "left_foot";
pub const RIGHT_FOOT_FRAME: &str = "right_foot";

/// Joints held at a fixed posture while walking.
pub const HEAD_JOINTS: [&str; 3] = ["neck_pitch", "head_pitch", "head_yaw"];

/// Parse the built-in model.
pub fn duck_biped() -> Result<RobotModel, ModelError> {
    parse_string(DUCK_BIPED_URDF)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn duck_has_thirteen_actuated_joints() {
        let model = duck_biped().unwrap();
        assert_eq!(model.root_link, TRUNK_FRAME);
        assert_eq!(model.actuated_joints().len(), 13);
        for joint in HEAD_JOINTS {
            assert!(model.joint(joint).is_some(), "{joint}");
        }
    }

    #[test]
    fn feet_hang_below_five_leg_joints() {
        let model = duck_biped().unwrap();
        for foot in [LEFT_FOOT_FRAME, RIGHT_FOOT_FRAME] {
            let path = model.path_to_link(foot).unwrap();
            assert_eq!(path.len(), 6);
            let actuated = path.iter().filter(|j| j.joint_type.is_actuated()).count();
            assert_eq!(actuated, 5);
        }
    }

    #[test]
    fn feet_are_mirrored() {
        let model = duck_biped().unwrap();
        let left = model.joint("left_hip_yaw").unwrap();
        let right = model.joint("right_hip_yaw").unwrap();
        assert_relative_eq!(left.origin.xyz[1], -right.origin.xyz[1]);
        assert_relative_eq!(left.origin.xyz[1], 0.06);
    }

    #[test]
    fn mass_is_plausible() {
        let mass = duck_biped().unwrap().total_mass();
        assert!(mass > 1.0 && mass < 2.0, "mass = {mass}");
    }
}
