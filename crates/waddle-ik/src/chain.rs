//! Kinematic chain extracted from a [`RobotModel`].
//!
//! A [`KinematicChain`] is the ordered list of actuated joints from the
//! floating base (root link) down to one link. Joint values are read from the
//! robot's full configuration vector through each joint's `index`.

use std::collections::HashMap;

use nalgebra::{DVector, Isometry3, Matrix3, Translation3, UnitQuaternion, UnitVector3, Vector3};
use waddle_model::{JointType, Origin, RobotModel};

use crate::error::IkError;

/// A single actuated joint in the chain.
#[derive(Debug, Clone)]
pub struct ChainJoint {
    pub name: String,
    /// Position of this joint in the robot configuration vector.
    pub index: usize,
    /// Static transform from the previous joint frame (fixed joints folded in).
    pub origin: Isometry3<f64>,
    /// Joint axis in the joint's local frame.
    pub axis: UnitVector3<f64>,
    pub is_prismatic: bool,
}

/// Contribution of one joint to a point or frame Jacobian, in the base frame.
#[derive(Debug, Clone, Copy)]
pub struct JointColumn {
    pub index: usize,
    pub linear: Vector3<f64>,
    pub angular: Vector3<f64>,
}

/// An ordered kinematic chain from the base to a link.
#[derive(Debug, Clone)]
pub struct KinematicChain {
    joints: Vec<ChainJoint>,
    /// Transform from the last actuated joint to the link frame.
    tip_offset: Isometry3<f64>,
}

impl KinematicChain {
    /// Build the chain from the model root to `link`.
    ///
    /// `joint_index` maps actuated joint names to configuration indices.
    pub fn from_model(
        model: &RobotModel,
        link: &str,
        joint_index: &HashMap<String, usize>,
    ) -> Result<Self, IkError> {
        let path = model.path_to_link(link)?;

        let mut joints = Vec::new();
        let mut accumulated_fixed = Isometry3::identity();

        for joint in path {
            let joint_origin = origin_to_isometry(&joint.origin);

            if joint.joint_type.is_actuated() {
                let index = *joint_index
                    .get(&joint.name)
                    .ok_or_else(|| IkError::UnknownJoint(joint.name.clone()))?;
                let axis = UnitVector3::new_normalize(Vector3::from(joint.axis));

                joints.push(ChainJoint {
                    name: joint.name.clone(),
                    index,
                    origin: accumulated_fixed * joint_origin,
                    axis,
                    is_prismatic: joint.joint_type == JointType::Prismatic,
                });
                accumulated_fixed = Isometry3::identity();
            } else {
                accumulated_fixed *= joint_origin;
            }
        }

        Ok(Self {
            joints,
            tip_offset: accumulated_fixed,
        })
    }

    /// Number of actuated degrees of freedom.
    pub fn dof(&self) -> usize {
        self.joints.len()
    }

    pub fn joints(&self) -> &[ChainJoint] {
        &self.joints
    }

    /// Link pose in the base frame for configuration `q`.
    pub fn forward_kinematics(&self, q: &DVector<f64>) -> Isometry3<f64> {
        let mut transform = Isometry3::identity();
        for joint in &self.joints {
            transform *= joint.origin;
            transform *= joint_transform(&joint.axis, joint.is_prismatic, q[joint.index]);
        }
        transform * self.tip_offset
    }

    /// Jacobian columns of a point rigidly attached to the link.
    ///
    /// `point` is expressed in the base frame. The angular part is the same for
    /// every point of the link.
    pub fn point_jacobian(&self, q: &DVector<f64>, point: &Vector3<f64>) -> Vec<JointColumn> {
        let mut transform = Isometry3::identity();
        let mut columns = Vec::with_capacity(self.dof());

        for joint in &self.joints {
            transform *= joint.origin;

            // Axis and origin in base frame before the joint moves.
            let origin = transform.translation.vector;
            let axis = transform.rotation * joint.axis.into_inner();
            let (linear, angular) = if joint.is_prismatic {
                (axis, Vector3::zeros())
            } else {
                (axis.cross(&(point - origin)), axis)
            };
            columns.push(JointColumn {
                index: joint.index,
                linear,
                angular,
            });

            transform *= joint_transform(&joint.axis, joint.is_prismatic, q[joint.index]);
        }
        columns
    }
}

/// Convert a URDF [`Origin`] (xyz + rpy) to an [`Isometry3`].
pub fn origin_to_isometry(origin: &Origin) -> Isometry3<f64> {
    let translation = Translation3::new(origin.xyz[0], origin.xyz[1], origin.xyz[2]);
    let rotation = UnitQuaternion::from_matrix(&rotation_matrix_from_rpy(
        origin.rpy[0],
        origin.rpy[1],
        origin.rpy[2],
    ));
    Isometry3::from_parts(translation, rotation)
}

/// Build a rotation matrix from roll-pitch-yaw (intrinsic XYZ / extrinsic ZYX).
fn rotation_matrix_from_rpy(roll: f64, pitch: f64, yaw: f64) -> Matrix3<f64> {
    let (sr, cr) = roll.sin_cos();
    let (sp, cp) = pitch.sin_cos();
    let (sy, cy) = yaw.sin_cos();

    Matrix3::new(
        cy * cp,
        cy * sp * sr - sy * cr,
        cy * sp * cr + sy * sr,
        sy * cp,
        sy * sp * sr + cy * cr,
        sy * sp * cr - cy * sr,
        -sp,
        cp * sr,
        cp * cr,
    )
}

/// Transform produced by a single joint at `position`.
fn joint_transform(axis: &UnitVector3<f64>, is_prismatic: bool, position: f64) -> Isometry3<f64> {
    if is_prismatic {
        Isometry3::from_parts(
            Translation3::from(axis.into_inner() * position),
            UnitQuaternion::identity(),
        )
    } else {
        Isometry3::from_parts(
            Translation3::identity(),
            UnitQuaternion::from_axis_angle(axis, position),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
