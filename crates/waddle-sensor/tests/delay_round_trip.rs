//! Integration test: delayed IMU stream.
//!
//! Pushes a stream of samples at irregular timestamps and drains it on a
//! fixed polling grid, checking that:
//! 1. Every sample comes out exactly once and in push order
//! 2. No sample is released before its timestamp plus the delay
//! 3. The zero reading is served until the first release

use std::time::Duration;

use nalgebra::UnitQuaternion;
use waddle_sensor::{ImuDelay, ImuSample};

#[test]
fn samples_come_out_in_order_after_the_delay() {
    let delay = Duration::from_millis(15);
    let mut imu = ImuDelay::new(delay);

    let timestamps: Vec<Duration> = [0_u64, 3, 4, 11, 20, 21, 35, 36, 50]
        .into_iter()
        .map(Duration::from_millis)
        .collect();
    let samples: Vec<ImuSample> = timestamps
        .iter()
        .enumerate()
        .map(|(i, _)| {
            #[allow(clippy::cast_precision_loss)]
            let roll = 0.01 * i as f64;
            ImuSample::new(UnitQuaternion::from_euler_angles(roll, 0.0, 0.0), [roll, 0.0, 0.0])
        })
        .collect();
    for (sample, &timestamp) in samples.iter().zip(&timestamps) {
        imu.push(*sample, timestamp).unwrap();
    }

    assert_eq!(imu.get(Duration::from_millis(14)), ImuSample::default());

    let mut released = Vec::new();
    for now in (0..100).map(Duration::from_millis) {
        while let Some(sample) = imu.pop_ready(now) {
            let index = samples.iter().position(|s| *s == sample).unwrap();
            assert!(now >= timestamps[index] + delay);
            released.push(sample);
        }
    }
    assert_eq!(released, samples);
    assert!(imu.is_empty());
}

#[test]
fn polling_with_get_holds_the_last_sample() {
    let mut imu = ImuDelay::new(Duration::from_millis(10));
    let sample = ImuSample::new(UnitQuaternion::identity(), [0.0, 0.1, 0.0]);
    imu.push(sample, Duration::ZERO).unwrap();
    assert_eq!(imu.get(Duration::from_millis(10)), sample);
    assert_eq!(imu.get(Duration::from_millis(30)), sample);
}
