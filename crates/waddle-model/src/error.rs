//! Error types for robot model loading.

use std::path::PathBuf;

/// Errors that can occur while building a [`RobotModel`](crate::RobotModel).
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Failed to read the URDF file.
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse URDF XML content.
    #[error("URDF parse error: {0}")]
    Parse(String),

    /// A referenced link was not found in the model.
    #[error("missing link: {0}")]
    MissingLink(String),

    /// A referenced joint was not found in the model.
    #[error("missing joint: {0}")]
    MissingJoint(String),

    /// Joint type the floating-base kinematics cannot represent.
    #[error("unsupported joint type on {joint}: {kind}")]
    UnsupportedJointType { joint: String, kind: String },

    /// The URDF has no root link (no link that is never a child).
    #[error("no root link found")]
    NoRootLink,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            ModelError::MissingLink("left_foot".into()).to_string(),
            "missing link: left_foot"
        );
        assert_eq!(ModelError::NoRootLink.to_string(), "no root link found");
        let err = ModelError::UnsupportedJointType {
            joint: "neck".into(),
            kind: "planar".into(),
        };
        assert!(err.to_string().contains("neck"));
    }

    #[test]
    fn io_error_mentions_path() {
        let err = ModelError::Io {
            path: PathBuf::from("/robots/duck.urdf"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.to_string().contains("/robots/duck.urdf"));
    }
}
