use waddle_core::{ClockError, ConfigError};
use waddle_ik::{IkError, QpError};
use waddle_model::ModelError;

/// Walk planning and engine errors.
///
/// IK infeasibility during a tick, replans requested too early and
/// actuator send failures are not errors: the engine logs them and
/// reports them through [`TickReport`](crate::TickReport).
#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    #[error(transparent)]
    Ik(#[from] IkError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Clock(#[from] ClockError),

    /// The CoM QP has no solution keeping the ZMP inside the supports.
    #[error("CoM planning failed: {status}")]
    ComInfeasible { status: String },

    #[error("CoM planning setup failed: {0}")]
    ComSetup(String),

    #[error("cannot plan a trajectory without supports")]
    EmptySupports,
}

impl From<QpError> for WalkError {
    fn from(err: QpError) -> Self {
        match err {
            QpError::Setup(message) => Self::ComSetup(message),
            QpError::NotSolved { status } => Self::ComInfeasible { status },
            QpError::NonFinite => Self::ComInfeasible {
                status: "non-finite solution".into(),
            },
        }
    }
}
