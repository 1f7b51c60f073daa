use waddle_model::ModelError;

use crate::qp::QpError;

/// Inverse kinematics errors.
#[derive(Debug, thiserror::Error)]
pub enum IkError {
    /// No joint displacement satisfies the hard tasks and limits this step.
    #[error("IK problem infeasible: {status}")]
    Infeasible { status: String },

    #[error("IK setup failed: {0}")]
    Setup(String),

    #[error("unknown frame: {0}")]
    UnknownFrame(String),

    #[error("unknown joint: {0}")]
    UnknownJoint(String),

    #[error("unknown task id: {0}")]
    UnknownTask(usize),

    #[error("task {task} expects a {expected} target")]
    TargetMismatch { task: usize, expected: &'static str },

    #[error("IK solution is not finite")]
    NonFinite,

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl From<QpError> for IkError {
    fn from(err: QpError) -> Self {
        match err {
            QpError::Setup(message) => Self::Setup(message),
            QpError::NotSolved { status } => Self::Infeasible { status },
            QpError::NonFinite => Self::NonFinite,
        }
    }
}
