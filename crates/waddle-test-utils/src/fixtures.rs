//! Engine configurations and robots for tests.

use waddle_core::EngineConfig;
use waddle_ik::HumanoidRobot;
use waddle_model::duck_biped;
use waddle_walk::{EngineState, WalkEngine};

/// The default configuration with a short standing delay.
pub fn default_engine_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.control.initial_delay = 0.1;
    config
}

/// One IK sub-step per tick, for scenarios running thousands of ticks.
pub fn fast_engine_config() -> EngineConfig {
    let mut config = default_engine_config();
    config.control.refine = 1;
    config
}

/// The built-in duck biped.
///
/// # Panics
///
/// If the bundled description fails to load.
pub fn duck_robot() -> HumanoidRobot {
    let model = duck_biped().expect("bundled duck description parses");
    HumanoidRobot::new(model).expect("duck description is a valid humanoid")
}

/// An engine past warm-up, standing at `t = -initial_delay`.
///
/// # Panics
///
/// If the engine cannot be built or never leaves warm-up.
pub fn walking_engine(config: EngineConfig) -> WalkEngine {
    let mut engine = WalkEngine::new(config, duck_robot()).expect("valid engine config");
    let max = engine.config().control.max_warmup_ticks;
    for _ in 0..=max {
        if engine.state() != EngineState::Warmup {
            break;
        }
        engine.tick(None).expect("warm-up tick");
    }
    assert_eq!(engine.state(), EngineState::Walking, "engine stuck in warm-up");
    engine
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_config_is_valid() {
        let config = fast_engine_config();
        config.validate().unwrap();
        assert_eq!(config.control.refine, 1);
    }

    #[test]
    fn walking_engine_has_a_trajectory() {
        let engine = walking_engine(fast_engine_config());
        assert!(engine.trajectory().is_some());
    }
}
