//! Footsteps and the repetitive footsteps planner.

use std::f64::consts::PI;

use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector2, Vector3};
use tracing::warn;
use waddle_core::{Side, WalkParameters};

use crate::support::Support;

/// Footsteps appended after the requested ones to bring the feet together.
pub const CLOSING_STEPS: usize = 1;

/// Number of steps planned per replan when no command says otherwise.
pub const DEFAULT_STEPS: usize = 5;

// ---------------------------------------------------------------------------
// Planar helpers
// ---------------------------------------------------------------------------

/// Wrap an angle into `(-pi, pi]`.
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI { wrapped + 2.0 * PI } else { wrapped }
}

/// Heading of a rotation: the angle of its x axis projected on the floor.
pub fn yaw_of(rotation: &UnitQuaternion<f64>) -> f64 {
    let x = rotation * Vector3::x();
    x.y.atan2(x.x)
}

/// Midpoint of two headings along the shortest arc.
pub fn mean_yaw(a: f64, b: f64) -> f64 {
    wrap_angle(a + 0.5 * wrap_angle(b - a))
}

/// Project a pose on the floor: z = 0, roll and pitch removed.
pub fn flatten_on_floor(pose: &Isometry3<f64>) -> Isometry3<f64> {
    let t = pose.translation.vector;
    Isometry3::from_parts(
        Translation3::new(t.x, t.y, 0.0),
        UnitQuaternion::from_euler_angles(0.0, 0.0, yaw_of(&pose.rotation)),
    )
}

/// A planar pose with a heading.
pub fn planar_pose(x: f64, y: f64, yaw: f64) -> Isometry3<f64> {
    Isometry3::from_parts(
        Translation3::new(x, y, 0.0),
        UnitQuaternion::from_euler_angles(0.0, 0.0, yaw),
    )
}

// ---------------------------------------------------------------------------
// Footstep
// ---------------------------------------------------------------------------

/// Where a foot lands: its sole frame on the floor and its footprint.
#[derive(Debug, Clone, PartialEq)]
pub struct Footstep {
    pub side: Side,
    pub frame: Isometry3<f64>,
    pub foot_length: f64,
    pub foot_width: f64,
}

impl Footstep {
    pub fn new(side: Side, frame: Isometry3<f64>, params: &WalkParameters) -> Self {
        Self {
            side,
            frame,
            foot_length: params.foot_length,
            foot_width: params.foot_width,
        }
    }

    pub fn position(&self) -> Vector3<f64> {
        self.frame.translation.vector
    }

    pub fn xy(&self) -> Vector2<f64> {
        self.position().xy()
    }

    pub fn yaw(&self) -> f64 {
        yaw_of(&self.frame.rotation)
    }

    /// Footprint corners on the floor, counter-clockwise, shrunk by `margin`.
    pub fn corners(&self, margin: f64) -> [Vector2<f64>; 4] {
        let l = (0.5 * self.foot_length - margin).max(0.0);
        let w = (0.5 * self.foot_width - margin).max(0.0);
        [(-l, -w), (l, -w), (l, w), (-l, w)].map(|(x, y)| (self.frame * Point3::new(x, y, 0.0)).coords.xy())
    }
}

// ---------------------------------------------------------------------------
// WalkCommand
// ---------------------------------------------------------------------------

/// Desired step pattern: displacement per step and number of steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkCommand {
    pub dx: f64,
    pub dy: f64,
    pub dtheta: f64,
    pub steps: usize,
}

impl Default for WalkCommand {
    fn default() -> Self {
        Self::stepping_in_place(DEFAULT_STEPS)
    }
}

impl WalkCommand {
    pub const fn new(dx: f64, dy: f64, dtheta: f64, steps: usize) -> Self {
        Self { dx, dy, dtheta, steps }
    }

    pub const fn stepping_in_place(steps: usize) -> Self {
        Self::new(0.0, 0.0, 0.0, steps)
    }

    /// Non-finite components replaced by zero, then clamped to the walk limits.
    #[must_use]
    pub fn clamped(&self, params: &WalkParameters) -> Self {
        Self {
            dx: finite_or_zero(self.dx).clamp(-params.walk_max_dx_backward, params.walk_max_dx_forward),
            dy: finite_or_zero(self.dy).clamp(-params.walk_max_dy, params.walk_max_dy),
            dtheta: finite_or_zero(self.dtheta).clamp(-params.walk_max_dtheta, params.walk_max_dtheta),
            steps: self.steps,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.dx.is_finite() && self.dy.is_finite() && self.dtheta.is_finite()
    }
}

const fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

// ---------------------------------------------------------------------------
// RepetitiveFootstepsPlanner
// ---------------------------------------------------------------------------

/// Repeats the same step displacement a fixed number of times.
#[derive(Debug, Clone)]
pub struct RepetitiveFootstepsPlanner {
    params: WalkParameters,
    command: WalkCommand,
}

impl RepetitiveFootstepsPlanner {
    /// A planner stepping in place until configured.
    pub fn new(params: WalkParameters) -> Self {
        Self {
            params,
            command: WalkCommand::default(),
        }
    }

    pub const fn params(&self) -> &WalkParameters {
        &self.params
    }

    /// Set the per-step displacement and step count.
    ///
    /// Non-finite displacements fall back to stepping in place.
    pub fn configure(&mut self, dx: f64, dy: f64, dtheta: f64, steps: usize) {
        let command = WalkCommand::new(dx, dy, dtheta, steps);
        if !command.is_finite() {
            warn!(dx, dy, dtheta, "non-finite step request, stepping in place");
        }
        self.command = WalkCommand::new(
            finite_or_zero(dx),
            finite_or_zero(dy),
            finite_or_zero(dtheta),
            steps,
        );
    }

    pub const fn command(&self) -> WalkCommand {
        self.command
    }

    /// Plan `steps + CLOSING_STEPS` footsteps from the current feet.
    ///
    /// The first footstep is taken by the foot opposite `starting_side`.
    /// A frame centred between the feet is moved by the displacement before
    /// every step, the lateral part only on steps of the foot leading in
    /// that direction so the feet never cross. Each footstep lands half the
    /// feet spacing to its side of that frame.
    pub fn plan(
        &self,
        starting_side: Side,
        t_world_left: &Isometry3<f64>,
        t_world_right: &Isometry3<f64>,
    ) -> Vec<Footstep> {
        let left = flatten_on_floor(t_world_left);
        let right = flatten_on_floor(t_world_right);
        let mid = 0.5 * (left.translation.vector + right.translation.vector);
        let mut centre = planar_pose(
            mid.x,
            mid.y,
            mean_yaw(yaw_of(&left.rotation), yaw_of(&right.rotation)),
        );

        let WalkCommand { dx, dy, dtheta, steps } = self.command;
        let mut footsteps = Vec::with_capacity(steps + CLOSING_STEPS);
        let mut side = starting_side.other();
        for _ in 0..steps {
            let lateral = if dy * side.sign() > 0.0 { dy } else { 0.0 };
            centre *= Isometry3::from_parts(
                Translation3::new(dx, lateral, 0.0),
                UnitQuaternion::from_euler_angles(0.0, 0.0, dtheta),
            );
            footsteps.push(self.footstep_beside(&centre, side));
            side = side.other();
        }
        for _ in 0..CLOSING_STEPS {
            footsteps.push(self.footstep_beside(&centre, side));
            side = side.other();
        }
        footsteps
    }

    fn footstep_beside(&self, centre: &Isometry3<f64>, side: Side) -> Footstep {
        let offset = Translation3::new(0.0, side.sign() * 0.5 * self.params.feet_spacing, 0.0);
        Footstep::new(side, centre * offset, &self.params)
    }
}

/// Turn a footstep sequence into supports.
///
/// `left` and `right` are the current footsteps. Each footstep yields a
/// single support on the other foot while it swings, followed by a double
/// support when `middle` is set. `start` prepends a starting double support
/// and `end` makes the last support an ending double support. Supports are
/// returned unscheduled (`t_start = duration = 0`).
pub fn make_supports(
    left: Footstep,
    right: Footstep,
    footsteps: &[Footstep],
    start: bool,
    middle: bool,
    end: bool,
) -> Vec<Support> {
    let mut feet = [left, right];
    let mut supports = Vec::with_capacity(2 * footsteps.len() + 2);
    if start {
        let mut support = Support::double(feet.clone());
        support.start = true;
        supports.push(support);
    }
    for footstep in footsteps {
        let stance = footstep.side.other();
        supports.push(Support::single(feet[stance.index()].clone()));
        feet[footstep.side.index()] = footstep.clone();
        if middle {
            supports.push(Support::double(feet.clone()));
        }
    }
    if end {
        match supports.last_mut() {
            Some(last) if middle && !footsteps.is_empty() => last.end = true,
            _ => {
                let mut support = Support::double(feet);
                support.end = true;
                supports.push(support);
            }
        }
    }
    supports
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use waddle_core::SupportSide;

    use super::*;

    fn params() -> WalkParameters {
        WalkParameters::default()
    }

    fn feet() -> (Isometry3<f64>, Isometry3<f64>) {
        (planar_pose(0.0, 0.06, 0.0), planar_pose(0.0, -0.06, 0.0))
    }

    fn planner(dx: f64, dy: f64, dtheta: f64, steps: usize) -> RepetitiveFootstepsPlanner {
        let mut planner = RepetitiveFootstepsPlanner::new(params());
        planner.configure(dx, dy, dtheta, steps);
        planner
    }

    #[test]
    fn forward_steps_alternate_from_the_other_side() {
        let (left, right) = feet();
        let footsteps = planner(0.1, 0.0, 0.0, 5).plan(Side::Left, &left, &right);
        assert_eq!(footsteps.len(), 5 + CLOSING_STEPS);

        assert_eq!(footsteps[0].side, Side::Right);
        assert_relative_eq!(footsteps[0].position(), Vector3::new(0.1, -0.06, 0.0), epsilon = 1e-12);
        assert_eq!(footsteps[1].side, Side::Left);
        assert_relative_eq!(footsteps[1].position(), Vector3::new(0.2, 0.06, 0.0), epsilon = 1e-12);
        for pair in footsteps.windows(2) {
            assert_ne!(pair[0].side, pair[1].side);
        }
        // the closing step lands beside the last one
        let last = &footsteps[5];
        assert_eq!(last.side, Side::Left);
        assert_relative_eq!(last.position().x, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn starting_right_steps_with_left_first() {
        let (left, right) = feet();
        let footsteps = planner(0.05, 0.0, 0.0, 2).plan(Side::Right, &left, &right);
        assert_eq!(footsteps[0].side, Side::Left);
    }

    #[test]
    fn zero_request_marches_in_place() {
        let (left, right) = feet();
        for steps in 0..4 {
            let footsteps = planner(0.0, 0.0, 0.0, steps).plan(Side::Left, &left, &right);
            assert_eq!(footsteps.len(), steps + CLOSING_STEPS);
            for footstep in &footsteps {
                let expected = if footstep.side == Side::Left { left } else { right };
                assert_relative_eq!(footstep.frame, expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn nan_request_is_normalised() {
        let (left, right) = feet();
        let planner = planner(f64::NAN, 0.02, f64::INFINITY, 3);
        assert_relative_eq!(planner.command().dx, 0.0);
        assert_relative_eq!(planner.command().dy, 0.02);
        assert_relative_eq!(planner.command().dtheta, 0.0);
        let footsteps = planner.plan(Side::Left, &left, &right);
        assert!(footsteps.iter().all(|f| f.position().iter().all(|v| v.is_finite())));
    }

    #[test]
    fn lateral_steps_keep_feet_spacing() {
        let (left, right) = feet();
        let footsteps = planner(0.0, 0.03, 0.0, 4).plan(Side::Right, &left, &right);
        // stepping left: the left foot leads
        assert_eq!(footsteps[0].side, Side::Left);
        assert_relative_eq!(footsteps[0].position().y, 0.09, epsilon = 1e-12);
        assert_relative_eq!(footsteps[1].position().y, -0.03, epsilon = 1e-12);
        let mut current = [left.translation.vector, right.translation.vector];
        for footstep in &footsteps {
            current[footstep.side.index()] = footstep.position();
            assert!(current[0].y - current[1].y >= 0.12 - 1e-12);
        }
    }

    #[test]
    fn turning_rotates_footsteps() {
        let (left, right) = feet();
        let footsteps = planner(0.0, 0.0, 0.2, 2).plan(Side::Left, &left, &right);
        assert_relative_eq!(footsteps[0].yaw(), 0.2, epsilon = 1e-12);
        assert_relative_eq!(footsteps[1].yaw(), 0.4, epsilon = 1e-12);
    }

    #[test]
    fn plan_flattens_tilted_feet() {
        let left = Isometry3::from_parts(
            Translation3::new(0.0, 0.06, 0.02),
            UnitQuaternion::from_euler_angles(0.1, -0.05, 0.0),
        );
        let (_, right) = feet();
        let footsteps = planner(0.0, 0.0, 0.0, 1).plan(Side::Left, &left, &right);
        for footstep in &footsteps {
            assert_relative_eq!(footstep.position().z, 0.0);
            assert_relative_eq!(footstep.yaw(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn command_clamping() {
        let params = params();
        let command = WalkCommand::new(0.5, -0.5, f64::NAN, 3).clamped(&params);
        assert_relative_eq!(command.dx, params.walk_max_dx_forward);
        assert_relative_eq!(command.dy, -params.walk_max_dy);
        assert_relative_eq!(command.dtheta, 0.0);
        let back = WalkCommand::new(-0.5, 0.0, 0.0, 3).clamped(&params);
        assert_relative_eq!(back.dx, -params.walk_max_dx_backward);
    }

    #[test]
    fn angle_helpers() {
        assert_relative_eq!(wrap_angle(3.0 * PI), PI, epsilon = 1e-12);
        assert_relative_eq!(wrap_angle(-0.5), -0.5);
        assert_relative_eq!(mean_yaw(3.0, -3.0), PI, epsilon = 1e-12);
        assert_relative_eq!(mean_yaw(0.2, 0.4), 0.3, epsilon = 1e-12);
    }

    #[test]
    fn corners_are_counter_clockwise() {
        let footstep = Footstep::new(Side::Left, planar_pose(1.0, 0.0, 0.0), &params());
        let corners = footstep.corners(0.0);
        assert_relative_eq!(corners[0], Vector2::new(0.97, -0.003), epsilon = 1e-12);
        assert_relative_eq!(corners[2], Vector2::new(1.03, 0.003), epsilon = 1e-12);
    }

    #[test]
    fn supports_from_footsteps() {
        let params = params();
        let (left, right) = feet();
        let footsteps = planner(0.1, 0.0, 0.0, 2).plan(Side::Left, &left, &right);
        let supports = make_supports(
            Footstep::new(Side::Left, left, &params),
            Footstep::new(Side::Right, right, &params),
            &footsteps,
            true,
            true,
            true,
        );
        let sides: Vec<SupportSide> = supports.iter().map(Support::side).collect();
        assert_eq!(
            sides,
            vec![
                SupportSide::Both,
                SupportSide::Left,
                SupportSide::Both,
                SupportSide::Right,
                SupportSide::Both,
                SupportSide::Left,
                SupportSide::Both,
            ]
        );
        assert!(supports[0].start);
        assert!(supports[6].end);
        assert!(!supports[2].end);
        // the double support after the first step holds the new right foot
        assert_relative_eq!(
            supports[2].footstep(Side::Right).unwrap().position().x,
            0.1,
            epsilon = 1e-12
        );
    }

    #[test]
    fn supports_without_double_support() {
        let params = params();
        let (left, right) = feet();
        let footsteps = planner(0.1, 0.0, 0.0, 1).plan(Side::Left, &left, &right);
        let supports = make_supports(
            Footstep::new(Side::Left, left, &params),
            Footstep::new(Side::Right, right, &params),
            &footsteps,
            false,
            false,
            true,
        );
        let sides: Vec<SupportSide> = supports.iter().map(Support::side).collect();
        assert_eq!(sides, vec![SupportSide::Left, SupportSide::Right, SupportSide::Both]);
        assert!(supports[2].end);
    }

    #[test]
    fn supports_without_footsteps_still_end() {
        let params = params();
        let (left, right) = feet();
        let supports = make_supports(
            Footstep::new(Side::Left, left, &params),
            Footstep::new(Side::Right, right, &params),
            &[],
            true,
            true,
            true,
        );
        assert_eq!(supports.len(), 2);
        assert!(supports[0].start && supports[1].end);
    }
}
