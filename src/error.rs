use thiserror::Error;

use crate::pose::Joint;

/// Per-frame conditions. Recovered inside the pipeline, never fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("No person detected")]
    NoPersonDetected,

    #[error("Required landmark {joint} not usable (visibility {visibility:.2})")]
    IncompleteLandmarks { joint: Joint, visibility: f32 },
}

/// Rejected configuration. Raised before the first frame.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid range for {metric}: [{min}, {max}]")]
    InvalidRange {
        metric: &'static str,
        min: f32,
        max: f32,
    },

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue {
        name: &'static str,
        reason: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn invalid(name: &'static str, reason: &'static str) -> Self {
        Self::InvalidValue { name, reason }
    }
}
