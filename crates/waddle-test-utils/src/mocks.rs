//! Stand-ins for the actuator and contact collaborators of the control loop.

use std::collections::VecDeque;

use waddle_ik::JointTargets;
use waddle_walk::{ActuatorError, ActuatorInterface, ContactSensor};

// ---------------------------------------------------------------------------
// RecordingActuator
// ---------------------------------------------------------------------------

/// Keeps every command it is sent.
#[derive(Debug, Default, Clone)]
pub struct RecordingActuator {
    pub sent: Vec<JointTargets>,
    pub safe_stops: u32,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent command.
    pub fn last(&self) -> Option<&JointTargets> {
        self.sent.last()
    }
}

impl ActuatorInterface for RecordingActuator {
    fn send(&mut self, targets: &JointTargets) -> Result<(), ActuatorError> {
        self.sent.push(targets.clone());
        Ok(())
    }

    fn safe_stop(&mut self) -> Result<(), ActuatorError> {
        self.safe_stops += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FailingActuator
// ---------------------------------------------------------------------------

/// Rejects every `period`-th command (every command when `period <= 1`).
#[derive(Debug, Clone)]
pub struct FailingActuator {
    period: u32,
    calls: u32,
    pub failures: u32,
}

impl FailingActuator {
    pub const fn every(period: u32) -> Self {
        Self {
            period,
            calls: 0,
            failures: 0,
        }
    }
}

impl ActuatorInterface for FailingActuator {
    fn send(&mut self, _targets: &JointTargets) -> Result<(), ActuatorError> {
        self.calls += 1;
        if self.period <= 1 || self.calls % self.period == 0 {
            self.failures += 1;
            return Err(ActuatorError::Link(format!("dropped frame {}", self.calls)));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedContacts
// ---------------------------------------------------------------------------

/// Replays `(right, left)` readings, then reports both feet on the ground.
#[derive(Debug, Default, Clone)]
pub struct ScriptedContacts {
    script: VecDeque<(bool, bool)>,
}

impl ScriptedContacts {
    pub fn new(script: impl IntoIterator<Item = (bool, bool)>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }

    /// `ticks` readings with the right foot in the air.
    pub fn right_foot_lifted(ticks: usize) -> Self {
        Self::new(std::iter::repeat_n((false, true), ticks))
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl ContactSensor for ScriptedContacts {
    fn get_feet_contact(&mut self) -> (bool, bool) {
        self.script.pop_front().unwrap_or((true, true))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_actuator_keeps_commands() {
        let mut actuator = RecordingActuator::new();
        let targets: JointTargets = [("left_knee".to_string(), -0.5)].into_iter().collect();
        actuator.send(&targets).unwrap();
        actuator.safe_stop().unwrap();
        assert_eq!(actuator.sent.len(), 1);
        assert_eq!(actuator.last(), Some(&targets));
        assert_eq!(actuator.safe_stops, 1);
    }

    #[test]
    fn failing_actuator_fails_periodically() {
        let mut actuator = FailingActuator::every(3);
        let targets = JointTargets::new();
        let results: Vec<bool> = (0..6).map(|_| actuator.send(&targets).is_ok()).collect();
        assert_eq!(results, [true, true, false, true, true, false]);
        assert_eq!(actuator.failures, 2);
    }

    #[test]
    fn scripted_contacts_fall_back_to_both_feet() {
        let mut sensor = ScriptedContacts::right_foot_lifted(2);
        assert_eq!(sensor.get_feet_contact(), (false, true));
        assert_eq!(sensor.get_feet_contact(), (false, true));
        assert_eq!(sensor.remaining(), 0);
        assert_eq!(sensor.get_feet_contact(), (true, true));
    }
}
