//! Core types shared by the waddle walk engine crates.
//!
//! - [`config`]: walk and control parameters loaded from TOML
//! - [`error`]: configuration and clock error taxonomy
//! - [`side`]: closed [`Side`] / [`SupportSide`] enums
//! - [`time`]: the [`PlanningClock`] and the wall-clock [`Pacer`]

pub mod config;
pub mod error;
pub mod side;
pub mod time;

pub use config::{
    ControlConfig, EngineConfig, GRAVITY, JointLimitsConfig, TaskWeights, WalkParameters,
};
pub use error::{ClockError, ConfigError, WaddleError};
pub use side::{Side, SupportSide};
pub use time::{Clock, ManualClock, Pacer, PlanningClock, SystemClock};

/// Convenience re-exports.
pub mod prelude {
    pub use crate::config::{ControlConfig, EngineConfig, WalkParameters};
    pub use crate::error::{ConfigError, WaddleError};
    pub use crate::side::{Side, SupportSide};
    pub use crate::time::{Clock, ManualClock, Pacer, PlanningClock, SystemClock};
}
