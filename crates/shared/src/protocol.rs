use serde::{Deserialize, Serialize};

use crate::domain::{AxisId, Direction, Edges};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeSide {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationPhase {
    Coarse,
    Fine,
}

/// Snapshot published by the search thread. Consumers only read these;
/// nothing flows back into algorithm state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum AlignmentEvent {
    SpiralProgress {
        steps_taken: u64,
        total_steps: u64,
        percent_covered: f64,
    },
    SignalFound {
        reading: f64,
        percent_covered: f64,
    },
    SpiralExhausted {
        percent_covered: f64,
    },
    AxisPassStarted {
        axis: AxisId,
        pass: u32,
    },
    EdgeLocated {
        axis: AxisId,
        phase: OptimizationPhase,
        side: EdgeSide,
        position: i64,
    },
    EdgeCorrected {
        axis: AxisId,
        position: i64,
    },
    AxisOptimized {
        axis: AxisId,
        phase: OptimizationPhase,
        edges: Edges,
        position: i64,
    },
    AxisPassed {
        axis: AxisId,
        pass: u32,
        drift: i64,
    },
    AxisReset {
        axis: AxisId,
        pass: u32,
        drift: i64,
    },
    ConvergenceFinished {
        status: ConvergenceStatus,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    CycleLimitExceeded {
        limit: u32,
    },
    TravelLimitReached {
        axis: AxisId,
        position: i64,
    },
    OptimizerAborted {
        axis: AxisId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        direction: Option<Direction>,
        message: String,
    },
}

impl FailureReason {
    /// Travel-limit failures need the operator to pre-align again; the others
    /// call for different search parameters.
    pub fn requires_manual_realignment(&self) -> bool {
        matches!(self, FailureReason::TravelLimitReached { .. })
    }

    pub fn remediation(&self) -> &'static str {
        if self.requires_manual_realignment() {
            "stage limit reached - manual realignment required"
        } else {
            "not converging to position - change parameter choice"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConvergenceStatus {
    AllConverged { passes: u32 },
    Failed(FailureReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpiralOutcome {
    pub found: bool,
    pub percent_covered: f64,
    pub steps_taken: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AlignmentOutcome {
    SignalNotFound { percent_covered: f64 },
    ConvergenceFailed { reason: FailureReason },
    Aligned { positions: [i64; 3] },
}
