//! Continuous-time walk trajectory.

use nalgebra::{Isometry3, UnitQuaternion, Vector2, Vector3};
use waddle_core::{Side, SupportSide, WalkParameters};

use crate::com::{ComState, ComTrajectory};
use crate::footsteps::{Footstep, mean_yaw, wrap_angle, yaw_of};
use crate::support::{Support, support_index};
use crate::swing::{SwingTrajectory, s_curve};

/// CoM, feet, trunk and support phase as functions of time.
///
/// The trajectory is valid over `[t_start, t_end]`, where `t_end` is where
/// the CoM plan stops; CoM queries clamp to it. Feet, trunk and support
/// queries are defined over every support the trajectory holds, including
/// the already elapsed one kept on replan, and clamp to that range.
#[derive(Debug, Clone)]
pub struct WalkTrajectory {
    supports: Vec<Support>,
    com: ComTrajectory,
    initial_yaw: f64,
    foot_height: f64,
    rise_ratio: f64,
    trunk_pitch: f64,
}

impl WalkTrajectory {
    /// `supports` must be scheduled and non-empty.
    pub(crate) fn new(
        supports: Vec<Support>,
        com: ComTrajectory,
        initial_yaw: f64,
        params: &WalkParameters,
    ) -> Self {
        debug_assert!(!supports.is_empty());
        Self {
            supports,
            com,
            initial_yaw,
            foot_height: params.walk_foot_height,
            rise_ratio: params.walk_foot_rise_ratio,
            trunk_pitch: params.walk_trunk_pitch,
        }
    }

    pub const fn t_start(&self) -> f64 {
        self.com.t_start()
    }

    pub fn t_end(&self) -> f64 {
        self.com.t_end().min(self.supports_end())
    }

    /// End of the last support, at or after `t_end`.
    pub fn supports_end(&self) -> f64 {
        self.supports.last().map_or(self.t_start(), Support::t_end)
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.t_start() && t <= self.t_end()
    }

    pub fn supports(&self) -> &[Support] {
        &self.supports
    }

    pub const fn com_trajectory(&self) -> &ComTrajectory {
        &self.com
    }

    fn clamp_com(&self, t: f64) -> f64 {
        t.clamp(self.t_start(), self.t_end())
    }

    fn clamp_supports(&self, t: f64) -> f64 {
        let first = self.supports.first().map_or(self.t_start(), |s| s.t_start);
        t.clamp(first, self.supports_end())
    }

    // -- supports -----------------------------------------------------------

    pub fn support_index(&self, t: f64) -> usize {
        support_index(&self.supports, self.clamp_supports(t))
    }

    pub fn support(&self, t: f64) -> &Support {
        &self.supports[self.support_index(t)]
    }

    pub fn support_side(&self, t: f64) -> SupportSide {
        self.support(t).side()
    }

    // -- centre of mass -----------------------------------------------------

    pub fn com_state(&self, t: f64) -> ComState {
        self.com.state(self.clamp_com(t))
    }

    /// World CoM position, at the walking height.
    pub fn com(&self, t: f64) -> Vector3<f64> {
        let p = self.com_state(t).position;
        Vector3::new(p.x, p.y, self.com.height())
    }

    pub fn com_velocity(&self, t: f64) -> Vector3<f64> {
        let v = self.com_state(t).velocity;
        Vector3::new(v.x, v.y, 0.0)
    }

    pub fn com_acceleration(&self, t: f64) -> Vector3<f64> {
        let a = self.com_state(t).acceleration;
        Vector3::new(a.x, a.y, 0.0)
    }

    pub fn zmp(&self, t: f64) -> Vector2<f64> {
        self.com.zmp(self.clamp_com(t))
    }

    // -- feet ---------------------------------------------------------------

    fn footstep_before(&self, side: Side, i: usize) -> Option<&Footstep> {
        self.supports[..i].iter().rev().find_map(|s| s.footstep(side))
    }

    fn footstep_after(&self, side: Side, i: usize) -> Option<&Footstep> {
        self.supports[i + 1..].iter().find_map(|s| s.footstep(side))
    }

    /// Where `side` stands once support `i` is over.
    fn landing(&self, side: Side, i: usize) -> Isometry3<f64> {
        self.supports[i]
            .footstep(side)
            .or_else(|| self.footstep_after(side, i))
            .or_else(|| self.footstep_before(side, i))
            .map_or_else(|| self.supports[i].frame(), |f| f.frame)
    }

    /// Swing of `side` at `t`, if that foot is in the air.
    pub fn swing(&self, side: Side, t: f64) -> Option<SwingTrajectory> {
        let i = self.support_index(t);
        let support = &self.supports[i];
        if support.footstep(side).is_some() {
            return None;
        }
        let target = self.landing(side, i);
        let start = self.footstep_before(side, i).map_or(target, |f| f.frame);
        Some(SwingTrajectory {
            start,
            target,
            t_start: support.t_start,
            t_end: support.t_end(),
            height: self.foot_height,
            rise_ratio: self.rise_ratio,
        })
    }

    /// World pose of a sole frame.
    pub fn foot(&self, side: Side, t: f64) -> Isometry3<f64> {
        let t = self.clamp_supports(t);
        match self.swing(side, t) {
            Some(swing) => swing.pose(t),
            None => self.landing(side, self.support_index(t)),
        }
    }

    pub fn left_foot(&self, t: f64) -> Isometry3<f64> {
        self.foot(Side::Left, t)
    }

    pub fn right_foot(&self, t: f64) -> Isometry3<f64> {
        self.foot(Side::Right, t)
    }

    // -- trunk --------------------------------------------------------------

    fn yaw_after(&self, i: usize) -> f64 {
        let left = yaw_of(&self.landing(Side::Left, i).rotation);
        let right = yaw_of(&self.landing(Side::Right, i).rotation);
        mean_yaw(left, right)
    }

    /// Trunk heading: blends, over each support, towards the mean heading
    /// of the feet at the end of that support.
    pub fn trunk_yaw(&self, t: f64) -> f64 {
        let t = self.clamp_supports(t);
        let i = self.support_index(t);
        let support = &self.supports[i];
        let from = if i == 0 {
            self.initial_yaw
        } else {
            self.yaw_after(i - 1)
        };
        let to = self.yaw_after(i);
        let phase = if support.duration > 0.0 {
            (t - support.t_start) / support.duration
        } else {
            1.0
        };
        wrap_angle(from + wrap_angle(to - from) * s_curve(phase))
    }

    pub fn trunk_orientation(&self, t: f64) -> UnitQuaternion<f64> {
        UnitQuaternion::from_euler_angles(0.0, self.trunk_pitch, self.trunk_yaw(t))
    }
}
