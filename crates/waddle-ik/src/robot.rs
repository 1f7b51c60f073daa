//! Floating-base humanoid: the robot state the IK integrates.

use std::collections::{BTreeMap, HashMap};

use nalgebra::{DMatrix, DVector, Isometry3, Matrix3, Point3, UnitQuaternion, Vector3};
use waddle_model::{JointType, RobotModel};

use crate::chain::KinematicChain;
use crate::error::IkError;

/// Size of the floating-base part of the velocity vector (linear + angular).
pub const BASE_DOF: usize = 6;

/// Joint name to target angle [rad], as sent to actuators.
pub type JointTargets = BTreeMap<String, f64>;

/// Mutable configuration of the robot.
#[derive(Debug, Clone, PartialEq)]
pub struct RobotState {
    /// Pose of the root link in the world.
    pub t_world_base: Isometry3<f64>,
    /// Joint positions, in [`HumanoidRobot::joint_names`] order.
    pub q: DVector<f64>,
    /// Joint velocities of the last integration step.
    pub qd: DVector<f64>,
}

#[derive(Debug, Clone)]
struct MassPoint {
    link: String,
    mass: f64,
    local_com: Vector3<f64>,
}

/// A floating-base robot with cached link poses.
#[derive(Debug, Clone)]
pub struct HumanoidRobot {
    model: RobotModel,
    joint_names: Vec<String>,
    joint_index: HashMap<String, usize>,
    limits: Vec<(f64, f64)>,
    chains: HashMap<String, KinematicChain>,
    masses: Vec<MassPoint>,
    total_mass: f64,
    state: RobotState,
    frames: HashMap<String, Isometry3<f64>>,
}

impl HumanoidRobot {
    /// Build the robot with all joints at zero (clamped into their limits).
    pub fn new(model: RobotModel) -> Result<Self, IkError> {
        let actuated = model.actuated_joints();
        let joint_names: Vec<String> = actuated.iter().map(|j| j.name.clone()).collect();
        let joint_index: HashMap<String, usize> = joint_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        let limits = actuated
            .iter()
            .map(|j| match j.joint_type {
                JointType::Continuous | JointType::Fixed => (f64::NEG_INFINITY, f64::INFINITY),
                JointType::Revolute | JointType::Prismatic => (
                    j.limits.lower.unwrap_or(f64::NEG_INFINITY),
                    j.limits.upper.unwrap_or(f64::INFINITY),
                ),
            })
            .collect();

        let chains = model
            .links
            .keys()
            .map(|link| {
                KinematicChain::from_model(&model, link, &joint_index)
                    .map(|chain| (link.clone(), chain))
            })
            .collect::<Result<HashMap<_, _>, _>>()?;

        let mut masses: Vec<MassPoint> = model
            .links
            .values()
            .filter_map(|link| {
                link.inertial.as_ref().map(|inertial| MassPoint {
                    link: link.name.clone(),
                    mass: inertial.mass,
                    local_com: Vector3::from(inertial.origin.xyz),
                })
            })
            .collect();
        masses.sort_by(|a, b| a.link.cmp(&b.link));
        let total_mass = masses.iter().map(|m| m.mass).sum();
        if total_mass <= 0.0 {
            return Err(IkError::Setup(format!("robot {} has no mass", model.name)));
        }

        let dof = joint_names.len();
        let mut robot = Self {
            model,
            joint_names,
            joint_index,
            limits,
            chains,
            masses,
            total_mass,
            state: RobotState {
                t_world_base: Isometry3::identity(),
                q: DVector::zeros(dof),
                qd: DVector::zeros(dof),
            },
            frames: HashMap::new(),
        };
        robot.clamp_to_limits();
        robot.update_kinematics();
        Ok(robot)
    }

    pub fn model(&self) -> &RobotModel {
        &self.model
    }

    /// Actuated joint names in configuration order.
    pub fn joint_names(&self) -> &[String] {
        &self.joint_names
    }

    pub fn joint_index(&self, name: &str) -> Option<usize> {
        self.joint_index.get(name).copied()
    }

    /// Number of actuated joints.
    pub fn dof(&self) -> usize {
        self.joint_names.len()
    }

    /// Size of the velocity vector (floating base + joints).
    pub fn nv(&self) -> usize {
        BASE_DOF + self.dof()
    }

    pub fn state(&self) -> &RobotState {
        &self.state
    }

    /// Replace the state and refresh kinematics.
    pub fn set_state(&mut self, state: RobotState) {
        self.state = state;
        self.update_kinematics();
    }

    pub fn joint(&self, name: &str) -> Result<f64, IkError> {
        self.joint_index(name)
            .map(|i| self.state.q[i])
            .ok_or_else(|| IkError::UnknownJoint(name.to_string()))
    }

    /// Set one joint position. Call [`update_kinematics`](Self::update_kinematics) afterwards.
    pub fn set_joint(&mut self, name: &str, value: f64) -> Result<(), IkError> {
        let i = self
            .joint_index(name)
            .ok_or_else(|| IkError::UnknownJoint(name.to_string()))?;
        self.state.q[i] = value;
        Ok(())
    }

    /// Position limits `(lower, upper)` of joint `i`.
    pub fn limits(&self, i: usize) -> (f64, f64) {
        self.limits[i]
    }

    /// Override the position limits of a joint; its position is clamped into them.
    pub fn set_joint_limits(&mut self, name: &str, lower: f64, upper: f64) -> Result<(), IkError> {
        let i = self
            .joint_index(name)
            .ok_or_else(|| IkError::UnknownJoint(name.to_string()))?;
        self.limits[i] = (lower, upper);
        self.state.q[i] = self.state.q[i].clamp(lower, upper);
        Ok(())
    }

    fn clamp_to_limits(&mut self) {
        for (q, &(lower, upper)) in self.state.q.iter_mut().zip(&self.limits) {
            *q = q.clamp(lower, upper);
        }
    }

    /// Refresh the cached world pose of every link.
    pub fn update_kinematics(&mut self) {
        let base = self.state.t_world_base;
        for (link, chain) in &self.chains {
            let pose = base * chain.forward_kinematics(&self.state.q);
            self.frames.insert(link.clone(), pose);
        }
    }

    /// World pose of a link, as of the last [`update_kinematics`](Self::update_kinematics).
    pub fn frame_pose(&self, frame: &str) -> Result<Isometry3<f64>, IkError> {
        self.frames
            .get(frame)
            .copied()
            .ok_or_else(|| IkError::UnknownFrame(frame.to_string()))
    }

    /// Centre of mass in the world frame.
    pub fn com_world(&self) -> Vector3<f64> {
        let weighted: Vector3<f64> = self
            .masses
            .iter()
            .map(|m| {
                let pose = self
                    .frames
                    .get(&m.link)
                    .copied()
                    .unwrap_or_else(Isometry3::identity);
                (pose * Point3::from(m.local_com)).coords * m.mass
            })
            .sum();
        weighted / self.total_mass
    }

    /// 6 x nv Jacobian of a frame (linear rows first), world frame.
    pub fn frame_jacobian(&self, frame: &str) -> Result<DMatrix<f64>, IkError> {
        let pose = self.frame_pose(frame)?;
        let point = pose.translation.vector;
        let mut jacobian = DMatrix::zeros(6, self.nv());
        self.accumulate_point_jacobian(frame, &point, 1.0, &mut jacobian, true)?;
        Ok(jacobian)
    }

    /// 3 x nv Jacobian of the centre of mass, world frame.
    pub fn com_jacobian(&self) -> Result<DMatrix<f64>, IkError> {
        let mut jacobian = DMatrix::zeros(3, self.nv());
        for m in &self.masses {
            let pose = self.frame_pose(&m.link)?;
            let point = (pose * Point3::from(m.local_com)).coords;
            self.accumulate_point_jacobian(
                &m.link,
                &point,
                m.mass / self.total_mass,
                &mut jacobian,
                false,
            )?;
        }
        Ok(jacobian)
    }

    fn accumulate_point_jacobian(
        &self,
        link: &str,
        point_world: &Vector3<f64>,
        scale: f64,
        jacobian: &mut DMatrix<f64>,
        with_angular: bool,
    ) -> Result<(), IkError> {
        let chain = self
            .chains
            .get(link)
            .ok_or_else(|| IkError::UnknownFrame(link.to_string()))?;
        let base = &self.state.t_world_base;
        let rotation = base.rotation.to_rotation_matrix().into_inner();
        let lever = point_world - base.translation.vector;

        // Floating base: translation moves every point, rotation about the base origin.
        add_block(jacobian, 0, 0, &(Matrix3::identity() * scale));
        add_block(jacobian, 0, 3, &(-skew(&lever) * scale));
        if with_angular {
            add_block(jacobian, 3, 3, &(Matrix3::identity() * scale));
        }

        let point_base = base.inverse_transform_vector(&lever);
        for column in chain.point_jacobian(&self.state.q, &point_base) {
            let col = BASE_DOF + column.index;
            let linear = rotation * column.linear * scale;
            for r in 0..3 {
                jacobian[(r, col)] += linear[r];
            }
            if with_angular {
                let angular = rotation * column.angular * scale;
                for r in 0..3 {
                    jacobian[(3 + r, col)] += angular[r];
                }
            }
        }
        Ok(())
    }

    /// Apply a displacement `delta = [base translation; base rotation vector; joints]`
    /// performed over `dt` seconds.
    pub fn integrate(&mut self, delta: &DVector<f64>, dt: f64) {
        let base = &mut self.state.t_world_base;
        base.translation.vector += Vector3::new(delta[0], delta[1], delta[2]);
        let rotation = UnitQuaternion::from_scaled_axis(Vector3::new(delta[3], delta[4], delta[5]));
        base.rotation = rotation * base.rotation;
        base.rotation.renormalize();

        let joints = delta.rows(BASE_DOF, self.dof());
        self.state.q += joints;
        self.state.qd = joints / dt;
        self.update_kinematics();
    }

    /// Translate the base vertically so that the lowest of `frames` touches z = 0.
    pub fn place_on_floor(&mut self, frames: &[&str]) -> Result<(), IkError> {
        let mut lowest = f64::INFINITY;
        for frame in frames {
            lowest = lowest.min(self.frame_pose(frame)?.translation.vector.z);
        }
        if lowest.is_finite() {
            self.state.t_world_base.translation.vector.z -= lowest;
            self.update_kinematics();
        }
        Ok(())
    }

    /// Set the base pose and refresh kinematics.
    pub fn reset_base(&mut self, pose: Isometry3<f64>) {
        self.state.t_world_base = pose;
        self.update_kinematics();
    }

    /// Current joint positions keyed by name.
    pub fn joint_targets(&self) -> JointTargets {
        self.joint_names
            .iter()
            .zip(self.state.q.iter())
            .map(|(name, &q)| (name.clone(), q))
            .collect()
    }
}

fn add_block(jacobian: &mut DMatrix<f64>, row: usize, col: usize, block: &Matrix3<f64>) {
    for r in 0..3 {
        for c in 0..3 {
            jacobian[(row + r, col + c)] += block[(r, c)];
        }
    }
}

fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Translation3;
    use waddle_model::{LEFT_FOOT_FRAME, RIGHT_FOOT_FRAME, TRUNK_FRAME, duck_biped};

    use super::*;

    fn duck() -> HumanoidRobot {
        HumanoidRobot::new(duck_biped().unwrap()).unwrap()
    }

    #[test]
    fn initial_configuration_respects_limits() {
        let robot = duck();
        assert_eq!(robot.dof(), 13);
        assert_eq!(robot.nv(), 19);
        for i in 0..robot.dof() {
            let (lower, upper) = robot.limits(i);
            let q = robot.state().q[i];
            assert!(q >= lower && q <= upper);
        }
    }

    #[test]
    fn set_joint_limits_clamps_position() {
        let mut robot = duck();
        robot.set_joint_limits("left_knee", -2.0, -0.01).unwrap();
        assert_relative_eq!(robot.joint("left_knee").unwrap(), -0.01);
        assert!(robot.set_joint_limits("tail", 0.0, 1.0).is_err());
    }

    #[test]
    fn feet_are_below_trunk() {
        let robot = duck();
        let trunk = robot.frame_pose(TRUNK_FRAME).unwrap();
        let left = robot.frame_pose(LEFT_FOOT_FRAME).unwrap();
        let right = robot.frame_pose(RIGHT_FOOT_FRAME).unwrap();
        assert!(left.translation.vector.z < trunk.translation.vector.z - 0.1);
        assert_relative_eq!(left.translation.vector.y, 0.06, epsilon = 1e-12);
        assert_relative_eq!(right.translation.vector.y, -0.06, epsilon = 1e-12);
    }

    #[test]
    fn place_on_floor_zeroes_lowest_foot() {
        let mut robot = duck();
        robot.place_on_floor(&[LEFT_FOOT_FRAME, RIGHT_FOOT_FRAME]).unwrap();
        let left = robot.frame_pose(LEFT_FOOT_FRAME).unwrap();
        assert_relative_eq!(left.translation.vector.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn com_is_between_the_feet() {
        let robot = duck();
        let com = robot.com_world();
        assert!(com.y.abs() < 1e-9);
        assert!(com.z < 0.05 && com.z > -0.05, "com = {com}");
    }

    fn perturbed() -> HumanoidRobot {
        let mut robot = duck();
        robot.reset_base(Isometry3::from_parts(
            Translation3::new(0.1, -0.05, 0.2),
            UnitQuaternion::from_euler_angles(0.1, -0.2, 0.3),
        ));
        for (i, name) in robot.joint_names().to_vec().iter().enumerate() {
            let (lower, upper) = robot.limits(i);
            let value = (0.1 * (i as f64 + 1.0)).sin() * 0.3;
            robot.set_joint(name, value.clamp(lower, upper)).unwrap();
        }
        robot.update_kinematics();
        robot
    }

    #[test]
    fn frame_jacobian_matches_finite_differences() {
        let robot = perturbed();
        let jacobian = robot.frame_jacobian(LEFT_FOOT_FRAME).unwrap();
        let pose = robot.frame_pose(LEFT_FOOT_FRAME).unwrap();
        let eps = 1e-7;

        for k in 0..robot.nv() {
            let mut moved = robot.clone();
            let mut delta = DVector::zeros(robot.nv());
            delta[k] = eps;
            moved.integrate(&delta, 1.0);
            let new_pose = moved.frame_pose(LEFT_FOOT_FRAME).unwrap();
            let dp = (new_pose.translation.vector - pose.translation.vector) / eps;
            let dr = (new_pose.rotation * pose.rotation.inverse()).scaled_axis() / eps;
            for r in 0..3 {
                assert_relative_eq!(jacobian[(r, k)], dp[r], epsilon = 1e-5);
                assert_relative_eq!(jacobian[(3 + r, k)], dr[r], epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn com_jacobian_matches_finite_differences() {
        let robot = perturbed();
        let jacobian = robot.com_jacobian().unwrap();
        let com = robot.com_world();
        let eps = 1e-7;

        for k in 0..robot.nv() {
            let mut moved = robot.clone();
            let mut delta = DVector::zeros(robot.nv());
            delta[k] = eps;
            moved.integrate(&delta, 1.0);
            let dc = (moved.com_world() - com) / eps;
            for r in 0..3 {
                assert_relative_eq!(jacobian[(r, k)], dc[r], epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn integrate_records_joint_velocity() {
        let mut robot = duck();
        let mut delta = DVector::zeros(robot.nv());
        let i = robot.joint_index("head_yaw").unwrap();
        delta[BASE_DOF + i] = 0.01;
        robot.integrate(&delta, 0.001);
        assert_relative_eq!(robot.state().qd[i], 10.0, epsilon = 1e-9);
        assert_relative_eq!(robot.joint("head_yaw").unwrap(), 0.01);
    }

    #[test]
    fn joint_targets_cover_all_joints() {
        let robot = duck();
        let targets = robot.joint_targets();
        assert_eq!(targets.len(), 13);
        assert!(targets.contains_key("right_ankle"));
    }

    #[test]
    fn unknown_frame_is_an_error() {
        let robot = duck();
        assert!(matches!(
            robot.frame_pose("tail"),
            Err(IkError::UnknownFrame(_))
        ));
    }
}
