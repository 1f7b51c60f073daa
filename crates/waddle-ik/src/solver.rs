//! Velocity-level whole-body IK solved as one QP per step.
//!
//! The decision variable is the displacement over one step,
//! `delta = [base translation; base rotation vector; joint deltas]`.
//! Soft tasks enter the cost, hard tasks become equalities, and joint
//! position and velocity limits become bounds on the joint deltas.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::error::IkError;
use crate::qp::{QpSettings, QuadraticProgram};
use crate::robot::{BASE_DOF, HumanoidRobot};
use crate::tasks::{Priority, Task, TaskId, TaskTarget};

/// Default Tikhonov weight on the displacement.
pub const DEFAULT_REGULARIZATION: f64 = 1e-6;

/// Stateful IK solver holding a task set.
#[derive(Debug, Clone)]
pub struct KinematicsSolver {
    tasks: Vec<Task>,
    dt: f64,
    velocity_limit: Option<f64>,
    regularization: f64,
    settings: QpSettings,
}

impl KinematicsSolver {
    /// A solver integrating over steps of `dt` seconds, bounded by the joint
    /// position limits and no velocity limit.
    pub fn new(dt: f64) -> Self {
        Self {
            tasks: Vec::new(),
            dt,
            velocity_limit: None,
            regularization: DEFAULT_REGULARIZATION,
            settings: QpSettings::default(),
        }
    }

    pub const fn dt(&self) -> f64 {
        self.dt
    }

    /// Bound every joint speed by `limit` [rad/s].
    pub fn enable_velocity_limits(&mut self, limit: f64) {
        self.velocity_limit = Some(limit);
    }

    pub fn set_regularization(&mut self, weight: f64) {
        self.regularization = weight;
    }

    /// Register a task and return its handle.
    pub fn add_task(&mut self, target: TaskTarget, weight: f64, priority: Priority) -> TaskId {
        self.tasks.push(Task {
            target,
            weight,
            priority,
        });
        TaskId(self.tasks.len() - 1)
    }

    pub fn task(&self, id: TaskId) -> Result<&Task, IkError> {
        self.tasks.get(id.0).ok_or(IkError::UnknownTask(id.0))
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Update the target of a task. The new target must be of the same kind.
    pub fn set_target(&mut self, id: TaskId, target: TaskTarget) -> Result<(), IkError> {
        self.tasks
            .get_mut(id.0)
            .ok_or(IkError::UnknownTask(id.0))?
            .retarget(id.0, target)
    }

    pub fn set_weight(&mut self, id: TaskId, weight: f64) -> Result<(), IkError> {
        self.tasks
            .get_mut(id.0)
            .ok_or(IkError::UnknownTask(id.0))?
            .weight = weight;
        Ok(())
    }

    /// Current error norm of a task.
    pub fn task_error(&self, id: TaskId, robot: &HumanoidRobot) -> Result<f64, IkError> {
        self.task(id)?.error(robot)
    }

    /// Solve one step and integrate it into `robot`.
    ///
    /// Returns the joint velocities of the step. On failure the robot is
    /// left untouched.
    pub fn solve(&self, robot: &mut HumanoidRobot) -> Result<DVector<f64>, IkError> {
        let qp = self.build(robot)?;
        let delta = qp.solve(&self.settings).map_err(|err| {
            debug!(%err, "IK step rejected");
            IkError::from(err)
        })?;
        if delta.iter().any(|v| !v.is_finite()) {
            return Err(IkError::NonFinite);
        }
        robot.integrate(&delta, self.dt);
        Ok(robot.state().qd.clone())
    }

    fn build(&self, robot: &HumanoidRobot) -> Result<QuadraticProgram, IkError> {
        let nv = robot.nv();
        let mut qp = QuadraticProgram::new(nv);

        for task in &self.tasks {
            let (jacobian, error) = task.residual(robot)?;
            match task.priority {
                Priority::Soft => qp.add_least_squares(&jacobian, &error, task.weight),
                Priority::Hard => qp.add_equalities(jacobian, error),
            }
        }
        qp.add_regularization(self.regularization);

        let (a, b) = self.joint_bounds(robot);
        qp.add_inequalities(a, b);
        Ok(qp)
    }

    /// Rows `delta_j <= upper_j` and `-delta_j <= -lower_j` for every joint.
    fn joint_bounds(&self, robot: &HumanoidRobot) -> (DMatrix<f64>, DVector<f64>) {
        let dof = robot.dof();
        let q = &robot.state().q;
        let step = self.velocity_limit.map_or(f64::INFINITY, |v| v * self.dt);

        let mut a = DMatrix::zeros(2 * dof, robot.nv());
        let mut b = DVector::zeros(2 * dof);
        for j in 0..dof {
            let (lower, upper) = robot.limits(j);
            let up = step.min(upper - q[j]);
            let down = step.min(q[j] - lower);
            a[(2 * j, BASE_DOF + j)] = 1.0;
            b[2 * j] = up;
            a[(2 * j + 1, BASE_DOF + j)] = -1.0;
            b[2 * j + 1] = down;
        }
        (a, b)
    }
}
