//! In-memory robot model.
//!
//! A trimmed view of URDF concepts: the walk engine needs the kinematic tree,
//! joint limits and link masses, nothing about rendering or collisions.

use std::collections::HashMap;

use crate::error::ModelError;

// ---------------------------------------------------------------------------
// JointType
// ---------------------------------------------------------------------------

/// Joint kinds understood by the kinematics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointType {
    /// Rotation about a single axis, with position limits.
    Revolute,
    /// Unlimited rotation about a single axis.
    Continuous,
    /// Translation along an axis, with position limits.
    Prismatic,
    /// No relative motion between parent and child.
    Fixed,
}

impl JointType {
    /// Whether this joint type has an actuated degree of freedom.
    pub const fn is_actuated(self) -> bool {
        matches!(self, Self::Revolute | Self::Continuous | Self::Prismatic)
    }
}

// ---------------------------------------------------------------------------
// JointLimits
// ---------------------------------------------------------------------------

/// Limits on a joint's motion, effort, and velocity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JointLimits {
    /// Lower position limit (rad or m). `None` means unbounded.
    pub lower: Option<f64>,
    /// Upper position limit (rad or m). `None` means unbounded.
    pub upper: Option<f64>,
    /// Maximum effort (Nm or N).
    pub effort: f64,
    /// Maximum velocity (rad/s or m/s).
    pub velocity: f64,
}

// ---------------------------------------------------------------------------
// Origin / Inertial
// ---------------------------------------------------------------------------

/// A 3D pose specified as position + roll-pitch-yaw.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Origin {
    /// Translation `[x, y, z]` in meters.
    pub xyz: [f64; 3],
    /// Rotation `[roll, pitch, yaw]` in radians.
    pub rpy: [f64; 3],
}

/// Mass properties of a link. Only the centre of mass is used.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inertial {
    /// Centre of mass relative to the link frame.
    pub origin: Origin,
    /// Mass in kilograms.
    pub mass: f64,
}

// ---------------------------------------------------------------------------
// LinkData / JointData
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct LinkData {
    pub name: String,
    /// `None` for massless frames such as soles.
    pub inertial: Option<Inertial>,
}

impl LinkData {
    /// Create a massless link.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inertial: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JointData {
    pub name: String,
    pub joint_type: JointType,
    /// Parent link name.
    pub parent: String,
    /// Child link name.
    pub child: String,
    /// Transform from parent link frame to joint frame.
    pub origin: Origin,
    /// Joint axis in the joint frame.
    pub axis: [f64; 3],
    pub limits: JointLimits,
}

// ---------------------------------------------------------------------------
// RobotModel
// ---------------------------------------------------------------------------

/// A parsed robot: links, joints and the root of the kinematic tree.
#[derive(Debug, Clone)]
pub struct RobotModel {
    pub name: String,
    pub links: HashMap<String, LinkData>,
    pub joints: HashMap<String, JointData>,
    /// Link that is never a child; the floating base.
    pub root_link: String,
}

impl RobotModel {
    pub fn link(&self, name: &str) -> Option<&LinkData> {
        self.links.get(name)
    }

    pub fn joint(&self, name: &str) -> Option<&JointData> {
        self.joints.get(name)
    }

    /// Actuated joints sorted by name, the canonical joint ordering.
    pub fn actuated_joints(&self) -> Vec<&JointData> {
        let mut joints: Vec<&JointData> = self
            .joints
            .values()
            .filter(|j| j.joint_type.is_actuated())
            .collect();
        joints.sort_by(|a, b| a.name.cmp(&b.name));
        joints
    }

    /// The joint whose child is `link`, `None` for the root.
    pub fn parent_joint(&self, link: &str) -> Option<&JointData> {
        self.joints.values().find(|j| j.child == link)
    }

    /// Joints from the root down to `link`, in traversal order.
    pub fn path_to_link(&self, link: &str) -> Result<Vec<&JointData>, ModelError> {
        if !self.links.contains_key(link) {
            return Err(ModelError::MissingLink(link.to_string()));
        }
        let mut path = Vec::new();
        let mut current = link;
        while current != self.root_link {
            let joint = self
                .parent_joint(current)
                .ok_or_else(|| ModelError::MissingJoint(format!("parent of {current}")))?;
            path.push(joint);
            current = &joint.parent;
            if path.len() > self.joints.len() {
                return Err(ModelError::MissingJoint(format!("cycle through {link}")));
            }
        }
        path.reverse();
        Ok(path)
    }

    /// Sum of all link masses [kg].
    pub fn total_mass(&self) -> f64 {
        self.links
            .values()
            .filter_map(|l| l.inertial.as_ref())
            .map(|i| i.mass)
            .sum()
    }
}
