//! Fixed-latency, order-preserving delay line.

use std::collections::VecDeque;
use std::time::Duration;

use tracing::trace;

/// Delay line errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SensorError {
    #[error("timestamp {got:?} is older than the last pushed one ({last:?})")]
    NonMonotonic { last: Duration, got: Duration },
}

// ---------------------------------------------------------------------------
// DelaySimulator
// ---------------------------------------------------------------------------

/// Withholds every pushed value until `timestamp + delay` has elapsed.
///
/// Values come out in the order they were pushed. Until the first one is
/// due, [`get`](Self::get) returns `T::default()`; afterwards it repeats the
/// last released value while the next one is not due yet.
#[derive(Debug, Clone)]
pub struct DelaySimulator<T: Default + Clone> {
    delay: Duration,
    queue: VecDeque<(Duration, T)>,
    last: T,
    newest: Option<Duration>,
}

impl<T: Default + Clone> DelaySimulator<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            queue: VecDeque::new(),
            last: T::default(),
            newest: None,
        }
    }

    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Queue `value`, observed at `timestamp`.
    ///
    /// Timestamps must not go backwards, including past values already
    /// released.
    pub fn push(&mut self, value: T, timestamp: Duration) -> Result<(), SensorError> {
        if let Some(last) = self.newest
            && timestamp < last
        {
            return Err(SensorError::NonMonotonic {
                last,
                got: timestamp,
            });
        }
        self.newest = Some(timestamp);
        self.queue.push_back((timestamp, value));
        Ok(())
    }

    /// Release the oldest value if it is due at `now`.
    pub fn pop_ready(&mut self, now: Duration) -> Option<T> {
        let &(timestamp, _) = self.queue.front()?;
        if timestamp + self.delay > now {
            return None;
        }
        let (_, value) = self.queue.pop_front()?;
        trace!(?timestamp, ?now, pending = self.queue.len(), "released delayed value");
        self.last = value.clone();
        Some(value)
    }

    /// The value seen at `now`: the oldest due one, else the last released.
    pub fn get(&mut self, now: Duration) -> T {
        self.pop_ready(now).unwrap_or_else(|| self.last.clone())
    }

    /// Values still withheld.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop everything, including the held value, and accept any timestamp
    /// again.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.last = T::default();
        self.newest = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn withholds_until_delay_elapsed() {
        let mut delay = DelaySimulator::new(ms(10));
        delay.push(7_i32, ms(0)).unwrap();
        assert_eq!(delay.get(ms(9)), 0);
        assert_eq!(delay.len(), 1);
        assert_eq!(delay.get(ms(10)), 7);
        assert!(delay.is_empty());
    }

    #[test]
    fn holds_last_value_between_releases() {
        let mut delay = DelaySimulator::new(ms(5));
        delay.push(1_i32, ms(0)).unwrap();
        delay.push(2, ms(10)).unwrap();
        assert_eq!(delay.get(ms(6)), 1);
        assert_eq!(delay.get(ms(12)), 1);
        assert_eq!(delay.get(ms(15)), 2);
    }

    #[test]
    fn releases_one_value_per_call() {
        let mut delay = DelaySimulator::new(ms(1));
        for (i, t) in [0, 1, 2].into_iter().enumerate() {
            delay.push(i, ms(t)).unwrap();
        }
        assert_eq!(delay.pop_ready(ms(100)), Some(0));
        assert_eq!(delay.pop_ready(ms(100)), Some(1));
        assert_eq!(delay.pop_ready(ms(100)), Some(2));
        assert_eq!(delay.pop_ready(ms(100)), None);
    }

    #[test]
    fn zero_delay_is_a_passthrough() {
        let mut delay = DelaySimulator::new(Duration::ZERO);
        delay.push(3.5_f64, ms(4)).unwrap();
        assert!((delay.get(ms(4)) - 3.5).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_time_going_backwards() {
        let mut delay = DelaySimulator::new(ms(1));
        delay.push(1_u8, ms(5)).unwrap();
        let err = delay.push(2, ms(4)).unwrap_err();
        assert_eq!(
            err,
            SensorError::NonMonotonic {
                last: ms(5),
                got: ms(4)
            }
        );
        // equal timestamps are fine
        delay.push(3, ms(5)).unwrap();
        assert_eq!(delay.len(), 2);
    }

    #[test]
    fn rejects_time_older_than_a_released_value() {
        let mut delay = DelaySimulator::new(ms(2));
        delay.push(1_u8, ms(10)).unwrap();
        assert_eq!(delay.get(ms(12)), 1);
        assert!(delay.is_empty());
        assert_eq!(
            delay.push(2, ms(8)),
            Err(SensorError::NonMonotonic {
                last: ms(10),
                got: ms(8)
            })
        );
        assert!(delay.is_empty());
        delay.push(3, ms(11)).unwrap();
    }

    #[test]
    fn clear_forgets_the_held_value() {
        let mut delay = DelaySimulator::new(ms(0));
        delay.push(9_i32, ms(0)).unwrap();
        assert_eq!(delay.get(ms(0)), 9);
        delay.push(10, ms(1)).unwrap();
        delay.clear();
        assert!(delay.is_empty());
        assert_eq!(delay.get(ms(50)), 0);
        // a fresh line takes any timestamp
        delay.push(11, ms(0)).unwrap();
    }
}
