//! Swing foot trajectory.
//!
//! The foot travels between two footsteps following a degree-11 Bezier
//! S-curve: the first and last three control points are equal, giving zero
//! velocity and acceleration at lift-off and touchdown. Height follows a
//! rise / plateau / fall profile: the foot spends `rise_ratio` of the swing
//! at `height`, rising and falling over the remaining time with the same
//! S-curve.

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};

use crate::footsteps::{wrap_angle, yaw_of};

// 12-point Bezier S-curve from 0 to 1.
const BEZIER_S: [f64; 12] = [
    0.0, 0.0, 0.0, // zero vel/accel at start
    0.5, 0.5, //
    0.5, 0.5, // midpoint
    0.5, 0.5, //
    1.0, 1.0, 1.0, // zero vel/accel at end
];

/// Evaluate a degree-11 Bezier curve at `t` (De Casteljau).
fn bezier_eval(points: &[f64; 12], t: f64) -> f64 {
    let mut work = *points;
    for k in 1..12 {
        for i in 0..(12 - k) {
            work[i] = work[i].mul_add(1.0 - t, work[i + 1] * t);
        }
    }
    work[0]
}

/// Smooth 0 to 1 timing law on `[0, 1]`, clamped outside.
pub fn s_curve(phase: f64) -> f64 {
    bezier_eval(&BEZIER_S, phase.clamp(0.0, 1.0))
}

/// Normalised height profile: 0 at both ends, 1 on the plateau.
pub fn height_profile(phase: f64, rise_ratio: f64) -> f64 {
    let phase = phase.clamp(0.0, 1.0);
    let ramp = 0.5 * (1.0 - rise_ratio);
    if ramp <= 0.0 {
        return 1.0;
    }
    if phase < ramp {
        s_curve(phase / ramp)
    } else if phase > 1.0 - ramp {
        s_curve((1.0 - phase) / ramp)
    } else {
        1.0
    }
}

/// A foot moving from `start` to `target` over `[t_start, t_end]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SwingTrajectory {
    pub start: Isometry3<f64>,
    pub target: Isometry3<f64>,
    pub t_start: f64,
    pub t_end: f64,
    pub height: f64,
    pub rise_ratio: f64,
}

impl SwingTrajectory {
    /// Swing progress in `[0, 1]`.
    pub fn phase(&self, t: f64) -> f64 {
        let duration = self.t_end - self.t_start;
        if duration <= 0.0 {
            return 1.0;
        }
        ((t - self.t_start) / duration).clamp(0.0, 1.0)
    }

    pub fn position(&self, t: f64) -> Vector3<f64> {
        let phase = self.phase(t);
        let s = s_curve(phase);
        let a = self.start.translation.vector;
        let b = self.target.translation.vector;
        let mut p = a + (b - a) * s;
        p.z += self.height * height_profile(phase, self.rise_ratio);
        p
    }

    pub fn yaw(&self, t: f64) -> f64 {
        let from = yaw_of(&self.start.rotation);
        let to = yaw_of(&self.target.rotation);
        wrap_angle(from + wrap_angle(to - from) * s_curve(self.phase(t)))
    }

    /// Flat foot pose at `t`.
    pub fn pose(&self, t: f64) -> Isometry3<f64> {
        let p = self.position(t);
        Isometry3::from_parts(
            Translation3::from(p),
            UnitQuaternion::from_euler_angles(0.0, 0.0, self.yaw(t)),
        )
    }
}
