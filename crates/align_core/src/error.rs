use shared::{
    domain::{AxisId, Direction},
    error::RigError,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlignError {
    #[error("axis {axis}: move to {target} would leave travel range [0, {max_position}]")]
    OutOfRange {
        axis: AxisId,
        target: i64,
        max_position: i64,
    },
    #[error("axis {axis}: no edge within {limit} steps in the {direction} direction")]
    StepLimitExceeded {
        axis: AxisId,
        direction: Direction,
        limit: u32,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("dark current must be a positive reading, got {0}")]
    InvalidDarkCurrent(f64),
    #[error("axis {axis}: tracked position {tracked} but stage reports {reported}")]
    PositionDesync {
        axis: AxisId,
        tracked: i64,
        reported: i64,
    },
    #[error("rig failure: {0}")]
    Rig(RigError),
}

impl AlignError {
    pub fn axis(&self) -> Option<AxisId> {
        match self {
            AlignError::OutOfRange { axis, .. }
            | AlignError::StepLimitExceeded { axis, .. }
            | AlignError::PositionDesync { axis, .. } => Some(*axis),
            _ => None,
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            AlignError::StepLimitExceeded { direction, .. } => Some(*direction),
            _ => None,
        }
    }
}

impl From<RigError> for AlignError {
    fn from(value: RigError) -> Self {
        match value {
            RigError::OutOfRange {
                axis,
                target,
                max_position,
            } => AlignError::OutOfRange {
                axis,
                target,
                max_position,
            },
            other => AlignError::Rig(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rig_out_of_range_keeps_its_axis() {
        let err = AlignError::from(RigError::OutOfRange {
            axis: AxisId::Z,
            target: -1,
            max_position: 1000,
        });
        assert_eq!(err.axis(), Some(AxisId::Z));
        assert!(matches!(err, AlignError::OutOfRange { target: -1, .. }));
    }

    #[test]
    fn other_rig_faults_are_wrapped() {
        let err = AlignError::from(RigError::communication("stage controller", "timeout"));
        assert_eq!(
            err.to_string(),
            "rig failure: communication with stage controller failed: timeout"
        );
        assert_eq!(err.axis(), None);

        let err = AlignError::from(RigError::NotReady("photocurrent meter".into()));
        assert_eq!(err, AlignError::Rig(RigError::NotReady("photocurrent meter".into())));
    }

    #[test]
    fn step_limit_reports_direction() {
        let err = AlignError::StepLimitExceeded {
            axis: AxisId::X,
            direction: Direction::Negative,
            limit: 200,
        };
        assert_eq!(err.direction(), Some(Direction::Negative));
        assert_eq!(
            err.to_string(),
            "axis x: no edge within 200 steps in the negative direction"
        );
    }
}
