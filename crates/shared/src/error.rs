use thiserror::Error;

use crate::domain::AxisId;

/// Failure reported by stage or meter hardware (or a simulation of it).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RigError {
    #[error("axis {axis}: target {target} outside travel range [0, {max_position}]")]
    OutOfRange {
        axis: AxisId,
        target: i64,
        max_position: i64,
    },
    #[error("communication with {device} failed: {message}")]
    Communication { device: String, message: String },
    #[error("{0} is not ready")]
    NotReady(String),
}

impl RigError {
    pub fn communication(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Communication {
            device: device.into(),
            message: message.into(),
        }
    }
}
