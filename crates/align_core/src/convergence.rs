//! Round-robin multi-axis convergence controller.
//!
//! Each pass optimizes one axis and compares the result with the position the
//! axis held before the pass. A pass within one coarse step marks the axis
//! converged; a larger drift clears every axis' flag, since the axes interact
//! through the shared optical path. The run succeeds once all three flags are
//! set and fails on the pass budget or on a travel limit.

use rig::Rig;
use shared::{
    domain::{AxisId, AxisRecord, RoundRobin},
    protocol::{AlignmentEvent, ConvergenceStatus, FailureReason},
};
use tracing::{debug, info, warn};

use crate::{config::SessionConfig, error::AlignError, motion::Positioner, progress::ProgressSink};

/// Single-axis optimization step driven by the controller.
///
/// Implementations leave the axis on the optimized position and return it.
pub trait AxisOptimizer<R: Rig> {
    fn optimize(
        &mut self,
        stages: &mut Positioner<R>,
        axis: AxisId,
        sink: &mut dyn ProgressSink,
    ) -> Result<i64, AlignError>;
}

impl<R: Rig, O: AxisOptimizer<R> + ?Sized> AxisOptimizer<R> for &mut O {
    fn optimize(
        &mut self,
        stages: &mut Positioner<R>,
        axis: AxisId,
        sink: &mut dyn ProgressSink,
    ) -> Result<i64, AlignError> {
        (**self).optimize(stages, axis, sink)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerState {
    Scanning(AxisId),
    AllConverged,
    Failed(FailureReason),
}

impl ControllerState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ControllerState::Scanning(_))
    }
}

pub struct ConvergenceController {
    state: ControllerState,
    order: RoundRobin,
    pass: u32,
    cycle_limit: u32,
    tolerance: i64,
    center_position: i64,
    converged: [bool; 3],
    last_axis: Option<AxisId>,
}

impl ConvergenceController {
    pub fn new(config: &SessionConfig) -> Self {
        let mut order = AxisId::round_robin();
        let first = order.next().unwrap_or(AxisId::X);
        Self {
            state: ControllerState::Scanning(first),
            order,
            pass: 0,
            cycle_limit: config.cycle_limit,
            tolerance: config.coarse_step_counts(),
            center_position: config.center_position,
            converged: [false; 3],
            last_axis: None,
        }
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Passes run so far.
    pub fn passes(&self) -> u32 {
        self.pass
    }

    pub fn converged(&self) -> [bool; 3] {
        self.converged
    }

    /// Seeds the reference positions: x and y where they stand, z at the
    /// travel center. Clears every converged flag.
    pub fn begin<R: Rig>(&mut self, stages: &mut Positioner<R>) {
        for axis in AxisId::ALL {
            let record = stages.record(axis);
            let reference = match axis {
                AxisId::Z => self.center_position,
                AxisId::X | AxisId::Y => record.current_position,
            };
            stages.commit(record.with_reference(reference).with_converged(false));
        }
        self.converged = [false; 3];
        debug!(
            z_reference = self.center_position,
            cycle_limit = self.cycle_limit,
            tolerance = self.tolerance,
            "convergence controller armed"
        );
    }

    /// Runs one transition. Terminal states are left unchanged.
    pub fn step<R, O>(
        &mut self,
        stages: &mut Positioner<R>,
        optimizer: &mut O,
        sink: &mut dyn ProgressSink,
    ) -> &ControllerState
    where
        R: Rig,
        O: AxisOptimizer<R> + ?Sized,
    {
        let ControllerState::Scanning(axis) = self.state else {
            return &self.state;
        };

        if self.pass > self.cycle_limit {
            let reason = match self.last_axis.filter(|last| stages.at_travel_limit(*last)) {
                Some(last) => FailureReason::TravelLimitReached {
                    axis: last,
                    position: stages.position(last),
                },
                None => FailureReason::CycleLimitExceeded {
                    limit: self.cycle_limit,
                },
            };
            self.fail(reason, sink);
            return &self.state;
        }

        let pass = self.pass;
        self.last_axis = Some(axis);
        sink.publish(AlignmentEvent::AxisPassStarted { axis, pass });

        let optimized = match optimizer.optimize(stages, axis, sink) {
            Ok(position) => position,
            Err(err) => {
                let reason = classify_failure(stages, axis, &err);
                self.fail(reason, sink);
                return &self.state;
            }
        };

        let record = AxisRecord {
            optimized_position: optimized,
            ..stages.record(axis)
        };
        let drift = record.drift();
        let stable = drift <= self.tolerance;
        stages.commit(record.with_reference(optimized).with_converged(stable));

        if stable {
            self.converged[axis.index()] = true;
            info!(%axis, pass, drift, "axis pass within tolerance");
            sink.publish(AlignmentEvent::AxisPassed { axis, pass, drift });
        } else {
            self.converged = [false; 3];
            for other in AxisId::ALL {
                stages.commit(stages.record(other).with_converged(false));
            }
            info!(
                %axis,
                pass,
                drift,
                tolerance = self.tolerance,
                "axis drifted; converged flags reset"
            );
            sink.publish(AlignmentEvent::AxisReset { axis, pass, drift });
        }

        self.pass += 1;
        if self.converged.iter().all(|flag| *flag) {
            self.state = ControllerState::AllConverged;
            info!(passes = self.pass, "all axes converged");
            self.publish_finished(sink);
        } else {
            // Cycling a non-empty axis set never runs dry.
            let next = self.order.next().unwrap_or(axis);
            self.state = ControllerState::Scanning(next);
        }
        &self.state
    }

    /// Terminal outcome, once reached.
    pub fn status(&self) -> Option<ConvergenceStatus> {
        match &self.state {
            ControllerState::Scanning(_) => None,
            ControllerState::AllConverged => {
                Some(ConvergenceStatus::AllConverged { passes: self.pass })
            }
            ControllerState::Failed(reason) => Some(ConvergenceStatus::Failed(reason.clone())),
        }
    }

    /// Drives the controller from a fresh start to a terminal state.
    pub fn run<R, O>(
        mut self,
        stages: &mut Positioner<R>,
        optimizer: &mut O,
        sink: &mut dyn ProgressSink,
    ) -> ConvergenceStatus
    where
        R: Rig,
        O: AxisOptimizer<R> + ?Sized,
    {
        self.begin(stages);
        loop {
            self.step(stages, optimizer, sink);
            if let Some(status) = self.status() {
                return status;
            }
        }
    }

    fn fail(&mut self, reason: FailureReason, sink: &mut dyn ProgressSink) {
        warn!(pass = self.pass, ?reason, remediation = reason.remediation(), "convergence failed");
        self.state = ControllerState::Failed(reason);
        self.publish_finished(sink);
    }

    fn publish_finished(&self, sink: &mut dyn ProgressSink) {
        if let Some(status) = self.status() {
            sink.publish(AlignmentEvent::ConvergenceFinished { status });
        }
    }
}

/// Travel-limit failures are those the optimizer hit while moving, or that
/// leave the axis resting on a limit. Everything else aborts the optimizer.
fn classify_failure<R: Rig>(
    stages: &Positioner<R>,
    axis: AxisId,
    err: &AlignError,
) -> FailureReason {
    match err {
        AlignError::OutOfRange { axis: failed, .. } => FailureReason::TravelLimitReached {
            axis: *failed,
            position: stages.position(*failed),
        },
        _ if stages.at_travel_limit(axis) => FailureReason::TravelLimitReached {
            axis,
            position: stages.position(axis),
        },
        _ => FailureReason::OptimizerAborted {
            axis,
            direction: err.direction(),
            message: err.to_string(),
        },
    }
}

#[cfg(test)]
#[path = "tests/convergence_tests.rs"]
mod tests;
