use thiserror::Error;

/// Top-level error type for waddle-core.
#[derive(Debug, Error)]
pub enum WaddleError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid timestep: {0} (must be > 0 and finite)")]
    InvalidTimestep(f64),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Unknown joint in configuration: {0}")]
    UnknownJoint(String),
}

impl ConfigError {
    /// Shorthand for [`ConfigError::InvalidValue`].
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Wall-clock pacing errors.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ClockError {
    #[error("Virtual time is not finite: {0}")]
    NonFiniteTime(f64),
}
