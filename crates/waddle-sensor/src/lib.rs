//! Sensor-side utilities: fixed-latency delay simulation and IMU samples.
//!
//! - [`delay`]: [`DelaySimulator`], a strict FIFO releasing each value once
//!   its timestamp plus a fixed delay has elapsed
//! - [`imu`]: [`ImuSample`] orientation / angular-velocity readings

pub mod delay;
pub mod imu;

pub use delay::{DelaySimulator, SensorError};
pub use imu::{ImuDelay, ImuSample};
