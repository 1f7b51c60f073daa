//! IK tasks driven by the walk trajectory.

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use waddle_core::TaskWeights;
use waddle_ik::{HumanoidRobot, IkError, KinematicsSolver, Priority, TaskId, TaskTarget};
use waddle_model::{LEFT_FOOT_FRAME, RIGHT_FOOT_FRAME, TRUNK_FRAME};

use crate::trajectory::WalkTrajectory;

/// Handles on the feet, CoM, trunk and posture tasks of a walking robot.
#[derive(Debug, Clone)]
pub struct WalkTasks {
    pub left_foot: TaskId,
    pub right_foot: TaskId,
    pub com: TaskId,
    pub trunk_orientation: TaskId,
    pub posture: Option<TaskId>,
}

impl WalkTasks {
    /// Register the walking tasks on `solver`, targeting the robot's
    /// current pose. `posture` joints are held at zero.
    pub fn new(
        solver: &mut KinematicsSolver,
        robot: &HumanoidRobot,
        weights: &TaskWeights,
        posture: &[String],
    ) -> Result<Self, IkError> {
        let left_foot = solver.add_task(
            TaskTarget::Pose {
                frame: LEFT_FOOT_FRAME.into(),
                pose: robot.frame_pose(LEFT_FOOT_FRAME)?,
            },
            weights.feet,
            Priority::Soft,
        );
        let right_foot = solver.add_task(
            TaskTarget::Pose {
                frame: RIGHT_FOOT_FRAME.into(),
                pose: robot.frame_pose(RIGHT_FOOT_FRAME)?,
            },
            weights.feet,
            Priority::Soft,
        );
        let com = solver.add_task(TaskTarget::Com(robot.com_world()), weights.com, Priority::Soft);
        let trunk_orientation = solver.add_task(
            TaskTarget::Orientation {
                frame: TRUNK_FRAME.into(),
                orientation: robot.frame_pose(TRUNK_FRAME)?.rotation,
            },
            weights.trunk_orientation,
            Priority::Soft,
        );
        let posture = (!posture.is_empty()).then(|| {
            solver.add_task(
                TaskTarget::Joints(posture.iter().map(|name| (name.clone(), 0.0)).collect()),
                weights.joints,
                Priority::Soft,
            )
        });
        Ok(Self {
            left_foot,
            right_foot,
            com,
            trunk_orientation,
            posture,
        })
    }

    /// Set every target at once.
    pub fn set_targets(
        &self,
        solver: &mut KinematicsSolver,
        left: Isometry3<f64>,
        right: Isometry3<f64>,
        com: Vector3<f64>,
        trunk: UnitQuaternion<f64>,
    ) -> Result<(), IkError> {
        solver.set_target(
            self.left_foot,
            TaskTarget::Pose {
                frame: LEFT_FOOT_FRAME.into(),
                pose: left,
            },
        )?;
        solver.set_target(
            self.right_foot,
            TaskTarget::Pose {
                frame: RIGHT_FOOT_FRAME.into(),
                pose: right,
            },
        )?;
        solver.set_target(self.com, TaskTarget::Com(com))?;
        solver.set_target(
            self.trunk_orientation,
            TaskTarget::Orientation {
                frame: TRUNK_FRAME.into(),
                orientation: trunk,
            },
        )
    }

    /// Targets of the standing pose walking starts from: feet
    /// `feet_spacing` apart around the origin, CoM above them.
    pub fn reach_initial_pose(
        &self,
        solver: &mut KinematicsSolver,
        feet_spacing: f64,
        com_height: f64,
        trunk_pitch: f64,
    ) -> Result<(), IkError> {
        let foot = |sign: f64| {
            Isometry3::from_parts(
                Translation3::new(0.0, sign * 0.5 * feet_spacing, 0.0),
                UnitQuaternion::identity(),
            )
        };
        self.set_targets(
            solver,
            foot(1.0),
            foot(-1.0),
            Vector3::new(0.0, 0.0, com_height),
            UnitQuaternion::from_euler_angles(0.0, trunk_pitch, 0.0),
        )
    }

    /// Targets sampled from `trajectory` at `t`.
    pub fn update_from_trajectory(
        &self,
        solver: &mut KinematicsSolver,
        trajectory: &WalkTrajectory,
        t: f64,
    ) -> Result<(), IkError> {
        self.set_targets(
            solver,
            trajectory.left_foot(t),
            trajectory.right_foot(t),
            trajectory.com(t),
            trajectory.trunk_orientation(t),
        )
    }

    /// Largest error among the feet, CoM and trunk tasks.
    pub fn pose_error(&self, solver: &KinematicsSolver, robot: &HumanoidRobot) -> Result<f64, IkError> {
        let mut worst: f64 = 0.0;
        for id in [self.left_foot, self.right_foot, self.com, self.trunk_orientation] {
            worst = worst.max(solver.task_error(id, robot)?);
        }
        Ok(worst)
    }
}
