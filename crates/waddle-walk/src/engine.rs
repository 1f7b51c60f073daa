//! Walk engine: the per-tick state machine tying planning to IK.

use std::f64::consts::TAU;
use std::fmt;

use tracing::{debug, info, warn};
use waddle_core::{ConfigError, EngineConfig, PlanningClock, Side, SupportSide};
use waddle_ik::{HumanoidRobot, IkError, JointTargets, KinematicsSolver, RobotState};
use waddle_model::{HEAD_JOINTS, LEFT_FOOT_FRAME, RIGHT_FOOT_FRAME};

use crate::error::WalkError;
use crate::footsteps::{Footstep, RepetitiveFootstepsPlanner, WalkCommand, flatten_on_floor, make_supports, mean_yaw, yaw_of};
use crate::generator::WalkPatternGenerator;
use crate::tasks::WalkTasks;
use crate::trajectory::WalkTrajectory;

/// Slack on time comparisons between tick-aligned instants [s].
const TIME_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// EngineState
// ---------------------------------------------------------------------------

/// Lifecycle state of the walk engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EngineState {
    /// Moving to the initial double support pose; the planning clock is stopped.
    #[default]
    Warmup,
    /// Following the trajectory.
    Walking,
    /// A foot lost contact for too long; task updates are frozen.
    Faulted,
}

impl EngineState {
    pub const fn is_walking(self) -> bool {
        matches!(self, Self::Walking)
    }

    pub const fn is_faulted(self) -> bool {
        matches!(self, Self::Faulted)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warmup => f.write_str("warmup"),
            Self::Walking => f.write_str("walking"),
            Self::Faulted => f.write_str("faulted"),
        }
    }
}

// ---------------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------------

/// Which feet touch the ground.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeetContact {
    pub left: bool,
    pub right: bool,
}

impl FeetContact {
    pub const BOTH: Self = Self {
        left: true,
        right: true,
    };

    pub const NONE: Self = Self {
        left: false,
        right: false,
    };

    pub const fn get(self, side: Side) -> bool {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}

impl From<(bool, bool)> for FeetContact {
    /// From a `(right, left)` pair, as contact sensors report them.
    fn from((right, left): (bool, bool)) -> Self {
        Self { left, right }
    }
}

/// Ticks since each foot was last seen on the ground.
///
/// Counting whole ticks keeps the timeout exact: with a 0.2 s allowance at
/// 0.01 s per tick, the 21st missed tick faults and the 20th does not.
#[derive(Clone, Debug)]
pub struct ContactMonitor {
    missed: [u32; 2],
    allowed: u32,
    dt: f64,
}

impl ContactMonitor {
    /// Allow `timeout` seconds without contact at `dt` seconds per tick.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(timeout: f64, dt: f64) -> Self {
        Self {
            missed: [0; 2],
            allowed: (timeout / dt + TIME_EPSILON).floor().max(0.0) as u32,
            dt,
        }
    }

    pub fn update(&mut self, contact: FeetContact) {
        for side in Side::BOTH {
            let missed = &mut self.missed[side.index()];
            *missed = if contact.get(side) { 0 } else { missed.saturating_add(1) };
        }
    }

    pub fn time_since_contact(&self, side: Side) -> f64 {
        f64::from(self.missed[side.index()]) * self.dt
    }

    /// Whether some foot exceeded the allowed time without contact.
    pub fn lost_footing(&self) -> bool {
        self.missed.iter().any(|&missed| missed > self.allowed)
    }

    pub fn reset(&mut self) {
        self.missed = [0; 2];
    }
}

// ---------------------------------------------------------------------------
// TickReport
// ---------------------------------------------------------------------------

/// What happened during one control tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickReport {
    pub state: EngineState,
    /// Planning time at the end of the tick.
    pub t: f64,
    pub replanned: bool,
    /// IK sub-steps rejected this tick.
    pub ik_failures: u32,
}

// ---------------------------------------------------------------------------
// WalkEngine
// ---------------------------------------------------------------------------

/// Owns the planner, generator, IK solver and robot state, and advances
/// them one control tick at a time.
#[derive(Debug)]
pub struct WalkEngine {
    config: EngineConfig,
    robot: HumanoidRobot,
    initial_state: RobotState,
    solver: KinematicsSolver,
    tasks: WalkTasks,
    planner: RepetitiveFootstepsPlanner,
    generator: WalkPatternGenerator,
    trajectory: Option<WalkTrajectory>,
    clock: PlanningClock,
    state: EngineState,
    last_replan: f64,
    contacts: ContactMonitor,
    command: WalkCommand,
    pending: Option<WalkCommand>,
    warmup_ticks: u32,
}

impl WalkEngine {
    /// Build the engine around `robot`. The configuration is validated and
    /// then fixed for the engine's lifetime.
    pub fn new(config: EngineConfig, mut robot: HumanoidRobot) -> Result<Self, WalkError> {
        config.validate()?;
        let walk = &config.walk;
        let control = &config.control;

        for (name, [lower, upper]) in &control.joint_limits.per_joint {
            robot
                .set_joint_limits(name, *lower, *upper)
                .map_err(|err| -> WalkError {
                    match err {
                        IkError::UnknownJoint(name) => ConfigError::UnknownJoint(name).into(),
                        other => other.into(),
                    }
                })?;
        }
        robot.update_kinematics();
        robot.place_on_floor(&[LEFT_FOOT_FRAME, RIGHT_FOOT_FRAME])?;

        let mut solver = KinematicsSolver::new(control.ik_dt());
        solver.enable_velocity_limits(control.velocity_limit);
        solver.set_regularization(control.weights.regularization);

        let posture: Vec<String> = HEAD_JOINTS
            .iter()
            .filter(|name| robot.joint_index(name).is_some())
            .map(|name| (*name).to_string())
            .collect();
        let tasks = WalkTasks::new(&mut solver, &robot, &control.weights, &posture)?;
        tasks.reach_initial_pose(
            &mut solver,
            walk.feet_spacing,
            walk.walk_com_height,
            walk.walk_trunk_pitch,
        )?;

        let command = WalkCommand::default();
        let mut planner = RepetitiveFootstepsPlanner::new(walk.clone());
        planner.configure(command.dx, command.dy, command.dtheta, command.steps);

        Ok(Self {
            initial_state: robot.state().clone(),
            robot,
            solver,
            tasks,
            planner,
            generator: WalkPatternGenerator::new(walk.clone()),
            trajectory: None,
            clock: PlanningClock::new(control.dt),
            state: EngineState::Warmup,
            last_replan: 0.0,
            contacts: ContactMonitor::new(walk.single_support_duration, control.dt),
            command,
            pending: None,
            warmup_ticks: 0,
            config,
        })
    }

    // -- accessors ----------------------------------------------------------

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub const fn state(&self) -> EngineState {
        self.state
    }

    /// Current planning time.
    pub fn t(&self) -> f64 {
        self.clock.t()
    }

    pub const fn clock(&self) -> &PlanningClock {
        &self.clock
    }

    pub const fn robot(&self) -> &HumanoidRobot {
        &self.robot
    }

    pub const fn trajectory(&self) -> Option<&WalkTrajectory> {
        self.trajectory.as_ref()
    }

    pub const fn planner(&self) -> &RepetitiveFootstepsPlanner {
        &self.planner
    }

    pub const fn contacts(&self) -> &ContactMonitor {
        &self.contacts
    }

    /// The command the planner is configured with.
    pub const fn command(&self) -> WalkCommand {
        self.command
    }

    /// Joint angles to send to the actuators.
    pub fn joint_targets(&self) -> JointTargets {
        self.robot.joint_targets()
    }

    /// Request a new step pattern; it takes effect at the next tick and
    /// shapes the trajectory from the next replan on.
    pub fn set_command(&mut self, command: WalkCommand) {
        self.pending = Some(command);
    }

    /// Support phase at the current time; both feet while warming up.
    pub fn support_phase(&self) -> SupportSide {
        self.trajectory
            .as_ref()
            .map_or(SupportSide::Both, |traj| traj.support_side(self.t()))
    }

    /// Footsteps of the current support followed by every planned
    /// footstep, each listed once per landing.
    pub fn footsteps_in_world(&self) -> Vec<Footstep> {
        let Some(traj) = &self.trajectory else {
            return Vec::new();
        };
        let supports = &traj.supports()[traj.support_index(self.t())..];
        let mut footsteps: Vec<Footstep> = supports[0].footsteps.clone();
        for pair in supports.windows(2) {
            let [previous, support] = pair else { continue };
            footsteps.extend(
                support
                    .footsteps
                    .iter()
                    .filter(|footstep| !previous.footsteps.contains(footstep))
                    .cloned(),
            );
        }
        footsteps
    }

    /// `[sin, cos]` of the gait phase, one period per two steps.
    pub fn clock_signal(&self) -> [f64; 2] {
        let period = self.config.walk.gait_period();
        let phase = self.t().rem_euclid(period) / period;
        let (sin, cos) = (TAU * phase).sin_cos();
        [sin, cos]
    }

    /// Back to warm-up with the initial robot state and a default command.
    pub fn reset(&mut self) -> Result<(), WalkError> {
        self.robot.set_state(self.initial_state.clone());
        self.robot.update_kinematics();
        self.trajectory = None;
        self.clock.reset_to(0.0);
        self.state = EngineState::Warmup;
        self.last_replan = 0.0;
        self.contacts.reset();
        self.pending = None;
        self.warmup_ticks = 0;
        self.apply_command(WalkCommand::default());
        let walk = &self.config.walk;
        self.tasks.reach_initial_pose(
            &mut self.solver,
            walk.feet_spacing,
            walk.walk_com_height,
            walk.walk_trunk_pitch,
        )?;
        info!("walk engine reset");
        Ok(())
    }

    // -- tick ---------------------------------------------------------------

    /// Advance one control tick.
    ///
    /// `contact` is the latest contact reading, if a sensor is present;
    /// without one the engine never faults. Errors are only returned when
    /// the first trajectory cannot be planned or the IK is misconfigured.
    pub fn tick(&mut self, contact: Option<FeetContact>) -> Result<TickReport, WalkError> {
        if let Some(command) = self.pending.take() {
            self.apply_command(command);
        }

        if self.state == EngineState::Warmup {
            return self.warmup_tick();
        }

        let t = self.clock.advance();
        let mut ik_failures = 0;
        if self.state != EngineState::Faulted {
            ik_failures = self.follow_trajectory(t)?;
        }
        let replanned = self.maybe_replan(t);

        if let Some(contact) = contact {
            self.contacts.update(contact);
            self.update_fault_state(t);
        }

        Ok(TickReport {
            state: self.state,
            t,
            replanned,
            ik_failures,
        })
    }

    fn apply_command(&mut self, command: WalkCommand) {
        let clamped = command.clamped(&self.config.walk);
        if clamped != command {
            debug!(?command, ?clamped, "walk command clamped");
        }
        self.planner
            .configure(clamped.dx, clamped.dy, clamped.dtheta, clamped.steps);
        self.command = clamped;
    }

    /// Run the IK sub-steps; rejected ones keep the previous robot state.
    #[allow(clippy::cast_precision_loss)]
    fn follow_trajectory(&mut self, t: f64) -> Result<u32, WalkError> {
        let Some(trajectory) = &self.trajectory else {
            return Ok(0);
        };
        let dt = self.config.control.dt;
        let refine = self.config.control.refine;
        let mut failures = 0;
        for k in 1..=refine {
            let tk = (k as f64 / refine as f64).mul_add(dt, t - dt);
            self.tasks
                .update_from_trajectory(&mut self.solver, trajectory, tk)?;
            match self.solver.solve(&mut self.robot) {
                Ok(_) => {}
                Err(err @ (IkError::Infeasible { .. } | IkError::NonFinite)) => {
                    warn!(t = tk, %err, "IK step rejected, holding robot state");
                    failures += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(failures)
    }

    fn maybe_replan(&mut self, t: f64) -> bool {
        let Some(trajectory) = &self.trajectory else {
            return false;
        };
        if t - self.last_replan <= self.config.replan_period() + TIME_EPSILON
            || !self.generator.can_replan_supports(trajectory, t)
        {
            return false;
        }
        self.last_replan = t;
        let supports = self.generator.replan_supports(&self.planner, trajectory, t);
        match self.generator.replan(supports, trajectory, t) {
            Ok(new) => {
                self.trajectory = Some(new);
                true
            }
            Err(err) => {
                warn!(t, %err, "replan failed, keeping the current trajectory");
                false
            }
        }
    }

    fn update_fault_state(&mut self, t: f64) {
        let lost = self.contacts.lost_footing();
        match (self.state, lost) {
            (EngineState::Walking, true) => {
                warn!(
                    t,
                    left = self.contacts.time_since_contact(Side::Left),
                    right = self.contacts.time_since_contact(Side::Right),
                    "lost footing, freezing trajectory tracking"
                );
                self.state = EngineState::Faulted;
            }
            (EngineState::Faulted, false) => {
                info!(t, "contact restored, resuming walk");
                self.state = EngineState::Walking;
            }
            _ => {}
        }
    }

    // -- warm-up ------------------------------------------------------------

    fn warmup_tick(&mut self) -> Result<TickReport, WalkError> {
        let mut ik_failures = 0;
        for _ in 0..self.config.control.refine {
            if let Err(err) = self.solver.solve(&mut self.robot) {
                match err {
                    IkError::Infeasible { .. } | IkError::NonFinite => ik_failures += 1,
                    other => return Err(other.into()),
                }
            }
        }
        self.warmup_ticks += 1;

        let error = self.tasks.pose_error(&self.solver, &self.robot)?;
        let control = &self.config.control;
        if error < control.warmup_tolerance || self.warmup_ticks >= control.max_warmup_ticks {
            if error >= control.warmup_tolerance {
                warn!(error, ticks = self.warmup_ticks, "initial pose not reached, walking anyway");
            }
            self.start_walking()?;
        }

        Ok(TickReport {
            state: self.state,
            t: self.clock.t(),
            replanned: false,
            ik_failures,
        })
    }

    /// Plan the first trajectory from where the robot actually stands.
    fn start_walking(&mut self) -> Result<(), WalkError> {
        let walk = &self.config.walk;
        let left = flatten_on_floor(&self.robot.frame_pose(LEFT_FOOT_FRAME)?);
        let right = flatten_on_floor(&self.robot.frame_pose(RIGHT_FOOT_FRAME)?);
        let footsteps = self.planner.plan(Side::Left, &left, &right);
        let supports = make_supports(
            Footstep::new(Side::Left, left, walk),
            Footstep::new(Side::Right, right, walk),
            &footsteps,
            true,
            walk.has_double_support(),
            true,
        );
        let initial_yaw = mean_yaw(yaw_of(&left.rotation), yaw_of(&right.rotation));
        let trajectory = self
            .generator
            .plan(supports, &self.robot.com_world(), initial_yaw, 0.0)?;

        self.trajectory = Some(trajectory);
        self.clock.reset_to(-self.config.control.initial_delay);
        self.last_replan = 0.0;
        self.contacts.reset();
        self.state = EngineState::Walking;
        info!(ticks = self.warmup_ticks, "initial pose reached, walking");
        Ok(())
    }
}
