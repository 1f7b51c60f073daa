//! IMU readings as fed to a delayed observation pipeline.

use nalgebra::{Quaternion, UnitQuaternion};

use crate::delay::DelaySimulator;

/// Orientation and angular velocity of the trunk.
///
/// The default sample is all zeros, including the quaternion, and stands
/// for "no reading yet".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImuSample {
    /// Unit quaternion, `[x, y, z, w]`.
    pub orientation: [f64; 4],
    /// Body angular velocity [rad/s].
    pub angular_velocity: [f64; 3],
}

/// IMU samples delayed by a fixed latency.
pub type ImuDelay = DelaySimulator<ImuSample>;

impl ImuSample {
    pub fn new(orientation: UnitQuaternion<f64>, angular_velocity: [f64; 3]) -> Self {
        let q = orientation.quaternion();
        Self {
            orientation: [q.i, q.j, q.k, q.w],
            angular_velocity,
        }
    }

    /// The orientation as a unit quaternion, `None` for the zero sample.
    pub fn rotation(&self) -> Option<UnitQuaternion<f64>> {
        let [x, y, z, w] = self.orientation;
        UnitQuaternion::try_new(Quaternion::new(w, x, y, z), 1e-12)
    }

    /// Same sample with the heading removed: roll and pitch are kept, yaw
    /// is set to zero. The zero sample is returned unchanged.
    #[must_use]
    pub fn without_yaw(&self) -> Self {
        let Some(rotation) = self.rotation() else {
            return *self;
        };
        let (roll, pitch, _) = rotation.euler_angles();
        Self::new(
            UnitQuaternion::from_euler_angles(roll, pitch, 0.0),
            self.angular_velocity,
        )
    }
}
