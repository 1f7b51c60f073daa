//! Kinematic tasks: what the solver drives the robot towards.

use std::mem::discriminant;

use nalgebra::{DMatrix, DVector, Isometry3, UnitQuaternion, Vector3};

use crate::error::IkError;
use crate::robot::{BASE_DOF, HumanoidRobot};

/// Hard tasks are equality constraints, soft tasks are weighted costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Hard,
    Soft,
}

/// Task kind together with its current target.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskTarget {
    /// World position of a frame origin.
    Position { frame: String, position: Vector3<f64> },
    /// World orientation of a frame.
    Orientation {
        frame: String,
        orientation: UnitQuaternion<f64>,
    },
    /// Full world pose of a frame.
    Pose { frame: String, pose: Isometry3<f64> },
    /// World position of the centre of mass.
    Com(Vector3<f64>),
    /// Joint positions by name.
    Joints(Vec<(String, f64)>),
}

impl TaskTarget {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Position { .. } => "position",
            Self::Orientation { .. } => "orientation",
            Self::Pose { .. } => "pose",
            Self::Com(_) => "com",
            Self::Joints(_) => "joints",
        }
    }
}

/// Handle returned by [`KinematicsSolver::add_task`](crate::KinematicsSolver::add_task).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub target: TaskTarget,
    pub weight: f64,
    pub priority: Priority,
}

impl Task {
    /// Replace the target, keeping the task kind.
    pub(crate) fn retarget(&mut self, id: usize, target: TaskTarget) -> Result<(), IkError> {
        if discriminant(&self.target) != discriminant(&target) {
            return Err(IkError::TargetMismatch {
                task: id,
                expected: self.target.kind(),
            });
        }
        self.target = target;
        Ok(())
    }

    /// Linearised task `J delta = e` at the robot's current configuration.
    pub fn residual(&self, robot: &HumanoidRobot) -> Result<(DMatrix<f64>, DVector<f64>), IkError> {
        match &self.target {
            TaskTarget::Position { frame, position } => {
                let pose = robot.frame_pose(frame)?;
                let jacobian = robot.frame_jacobian(frame)?.rows(0, 3).into_owned();
                let error = position - pose.translation.vector;
                Ok((jacobian, DVector::from_column_slice(error.as_slice())))
            }
            TaskTarget::Orientation { frame, orientation } => {
                let pose = robot.frame_pose(frame)?;
                let jacobian = robot.frame_jacobian(frame)?.rows(3, 3).into_owned();
                let error = orientation_error(orientation, &pose.rotation);
                Ok((jacobian, DVector::from_column_slice(error.as_slice())))
            }
            TaskTarget::Pose { frame, pose: target } => {
                let pose = robot.frame_pose(frame)?;
                let jacobian = robot.frame_jacobian(frame)?;
                let linear = target.translation.vector - pose.translation.vector;
                let angular = orientation_error(&target.rotation, &pose.rotation);
                let error = DVector::from_iterator(6, linear.iter().chain(angular.iter()).copied());
                Ok((jacobian, error))
            }
            TaskTarget::Com(target) => {
                let jacobian = robot.com_jacobian()?;
                let error = target - robot.com_world();
                Ok((jacobian, DVector::from_column_slice(error.as_slice())))
            }
            TaskTarget::Joints(targets) => {
                let mut jacobian = DMatrix::zeros(targets.len(), robot.nv());
                let mut error = DVector::zeros(targets.len());
                for (row, (name, value)) in targets.iter().enumerate() {
                    let index = robot
                        .joint_index(name)
                        .ok_or_else(|| IkError::UnknownJoint(name.clone()))?;
                    jacobian[(row, BASE_DOF + index)] = 1.0;
                    error[row] = value - robot.state().q[index];
                }
                Ok((jacobian, error))
            }
        }
    }

    /// Norm of the current task error.
    pub fn error(&self, robot: &HumanoidRobot) -> Result<f64, IkError> {
        self.residual(robot).map(|(_, e)| e.norm())
    }
}

/// Rotation vector (world frame) taking `current` onto `target`.
fn orientation_error(target: &UnitQuaternion<f64>, current: &UnitQuaternion<f64>) -> Vector3<f64> {
    (target * current.inverse()).scaled_axis()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use waddle_model::{LEFT_FOOT_FRAME, duck_biped};

    use super::*;

    fn duck() -> HumanoidRobot {
        HumanoidRobot::new(duck_biped().unwrap()).unwrap()
    }

    #[test]
    fn retarget_rejects_other_kinds() {
        let mut task = Task {
            target: TaskTarget::Com(Vector3::zeros()),
            weight: 1.0,
            priority: Priority::Soft,
        };
        assert!(task.retarget(0, TaskTarget::Com(Vector3::x())).is_ok());
        let err = task.retarget(0, TaskTarget::Joints(vec![])).unwrap_err();
        assert!(err.to_string().contains("com"));
    }

    #[test]
    fn position_residual_is_target_minus_current() {
        let robot = duck();
        let foot = robot.frame_pose(LEFT_FOOT_FRAME).unwrap().translation.vector;
        let task = Task {
            target: TaskTarget::Position {
                frame: LEFT_FOOT_FRAME.into(),
                position: foot + Vector3::new(0.01, 0.0, 0.0),
            },
            weight: 1.0,
            priority: Priority::Soft,
        };
        let (jacobian, error) = task.residual(&robot).unwrap();
        assert_eq!(jacobian.shape(), (3, robot.nv()));
        assert_relative_eq!(error[0], 0.01, epsilon = 1e-12);
        assert_relative_eq!(task.error(&robot).unwrap(), 0.01, epsilon = 1e-12);
    }

    #[test]
    fn joints_residual_selects_columns() {
        let robot = duck();
        let task = Task {
            target: TaskTarget::Joints(vec![("head_yaw".into(), 0.2)]),
            weight: 1.0,
            priority: Priority::Hard,
        };
        let (jacobian, error) = task.residual(&robot).unwrap();
        let index = robot.joint_index("head_yaw").unwrap();
        assert_relative_eq!(jacobian[(0, BASE_DOF + index)], 1.0);
        assert_relative_eq!(jacobian.row(0).sum(), 1.0);
        assert_relative_eq!(error[0], 0.2);
    }

    #[test]
    fn unknown_joint_in_joints_task() {
        let robot = duck();
        let task = Task {
            target: TaskTarget::Joints(vec![("tail".into(), 0.0)]),
            weight: 1.0,
            priority: Priority::Soft,
        };
        assert!(matches!(
            task.residual(&robot),
            Err(IkError::UnknownJoint(_))
        ));
    }

    #[test]
    fn orientation_error_is_world_rotation_vector() {
        let current = UnitQuaternion::from_euler_angles(0.0, 0.0, 0.2);
        let target = UnitQuaternion::from_euler_angles(0.0, 0.0, 0.5);
        let error = orientation_error(&target, &current);
        assert_relative_eq!(error, Vector3::new(0.0, 0.0, 0.3), epsilon = 1e-12);
    }
}
