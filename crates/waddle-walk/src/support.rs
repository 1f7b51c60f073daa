//! Supports: which footsteps carry the robot, and when.

use nalgebra::{Isometry3, Vector2};
use waddle_core::{Side, SupportSide, WalkParameters};

use crate::footsteps::{Footstep, mean_yaw, planar_pose};
use crate::polygon::convex_hull;

/// One or two footsteps on the ground over a time interval.
#[derive(Debug, Clone, PartialEq)]
pub struct Support {
    /// The stance footstep, or both footsteps left first.
    pub footsteps: Vec<Footstep>,
    /// First double support of a walk.
    pub start: bool,
    /// Last double support of a walk.
    pub end: bool,
    pub t_start: f64,
    pub duration: f64,
}

impl Support {
    pub fn single(footstep: Footstep) -> Self {
        Self {
            footsteps: vec![footstep],
            start: false,
            end: false,
            t_start: 0.0,
            duration: 0.0,
        }
    }

    /// Double support over `[left, right]`.
    pub fn double(feet: [Footstep; 2]) -> Self {
        Self {
            footsteps: feet.into(),
            start: false,
            end: false,
            t_start: 0.0,
            duration: 0.0,
        }
    }

    pub fn side(&self) -> SupportSide {
        match self.footsteps.as_slice() {
            [single] => single.side.into(),
            _ => SupportSide::Both,
        }
    }

    pub fn is_double(&self) -> bool {
        self.side().is_both()
    }

    pub fn t_end(&self) -> f64 {
        self.t_start + self.duration
    }

    /// Whether `t` falls in `[t_start, t_end)`.
    pub fn covers(&self, t: f64) -> bool {
        t >= self.t_start && t < self.t_end()
    }

    pub fn footstep(&self, side: Side) -> Option<&Footstep> {
        self.footsteps.iter().find(|f| f.side == side)
    }

    /// Centre of the footsteps on the floor.
    pub fn centre(&self) -> Vector2<f64> {
        let sum: Vector2<f64> = self.footsteps.iter().map(Footstep::xy).sum();
        #[allow(clippy::cast_precision_loss)]
        let n = self.footsteps.len().max(1) as f64;
        sum / n
    }

    /// Floor frame at the centre, with the mean heading of the feet.
    pub fn frame(&self) -> Isometry3<f64> {
        let centre = self.centre();
        let yaw = match self.footsteps.as_slice() {
            [a, b] => mean_yaw(a.yaw(), b.yaw()),
            [single] => single.yaw(),
            _ => 0.0,
        };
        planar_pose(centre.x, centre.y, yaw)
    }

    /// Support polygon (counter-clockwise), shrunk by `margin`.
    pub fn polygon(&self, margin: f64) -> Vec<Vector2<f64>> {
        let corners: Vec<Vector2<f64>> = self
            .footsteps
            .iter()
            .flat_map(|f| f.corners(margin))
            .collect();
        convex_hull(&corners)
    }

    /// Nominal duration of this support.
    pub fn nominal_duration(&self, params: &WalkParameters) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let timesteps = match self.side() {
            SupportSide::Left | SupportSide::Right => params.single_support_timesteps,
            SupportSide::Both if self.start || self.end => params.startend_double_support_timesteps(),
            SupportSide::Both => params.double_support_timesteps(),
        } as f64;
        timesteps * params.dt()
    }
}

/// Give `supports[from..]` their nominal durations, back to back from `t_start`.
pub fn schedule(supports: &mut [Support], from: usize, t_start: f64, params: &WalkParameters) {
    let mut t = t_start;
    for support in supports.iter_mut().skip(from) {
        support.t_start = t;
        support.duration = support.nominal_duration(params);
        t = support.t_end();
    }
}

/// Index of the support covering `t`; clamps to the first or last support.
pub fn support_index(supports: &[Support], t: f64) -> usize {
    supports
        .iter()
        .position(|s| t < s.t_end())
        .unwrap_or(supports.len().saturating_sub(1))
}
