use std::collections::VecDeque;

use rig::SimulatedRig;
use shared::domain::Direction;

use super::*;
use crate::{progress::NoopSink, test_support::bench_config};

type Stages = Positioner<SimulatedRig<fn([i64; 3]) -> f64>>;

fn stages(start: [i64; 3]) -> Stages {
    let profile: fn([i64; 3]) -> f64 = |_| 50.0;
    let rig = SimulatedRig::new(profile, 1000).with_positions(start);
    Positioner::new(rig, 1000).expect("positioner")
}

/// Replays scripted results per axis; once an axis' script is used up it
/// reports the axis as already optimal.
#[derive(Default)]
struct ScriptedOptimizer {
    scripts: [VecDeque<Result<i64, AlignError>>; 3],
    calls: Vec<AxisId>,
}

impl ScriptedOptimizer {
    fn script(
        mut self,
        axis: AxisId,
        results: impl IntoIterator<Item = Result<i64, AlignError>>,
    ) -> Self {
        self.scripts[axis.index()].extend(results);
        self
    }
}

impl<R: Rig> AxisOptimizer<R> for ScriptedOptimizer {
    fn optimize(
        &mut self,
        stages: &mut Positioner<R>,
        axis: AxisId,
        _sink: &mut dyn ProgressSink,
    ) -> Result<i64, AlignError> {
        self.calls.push(axis);
        match self.scripts[axis.index()].pop_front() {
            Some(Ok(position)) => stages.move_to(axis, position),
            Some(Err(err)) => Err(err),
            None => Ok(stages.position(axis)),
        }
    }
}

#[test]
fn stable_axes_converge_in_one_round() {
    let mut stages = stages([500, 500, 500]);
    let mut optimizer = ScriptedOptimizer::default();
    let mut events = Vec::new();

    let status = ConvergenceController::new(&bench_config()).run(
        &mut stages,
        &mut optimizer,
        &mut events,
    );

    assert_eq!(status, ConvergenceStatus::AllConverged { passes: 3 });
    assert_eq!(optimizer.calls, vec![AxisId::X, AxisId::Y, AxisId::Z]);
    assert!(AxisId::ALL.iter().all(|axis| stages.record(*axis).converged));
    assert_eq!(
        events.last(),
        Some(&AlignmentEvent::ConvergenceFinished { status })
    );
}

#[test]
fn begin_references_z_against_travel_center() {
    let mut stages = stages([300, 400, 700]);
    let mut controller = ConvergenceController::new(&bench_config());

    controller.begin(&mut stages);

    assert_eq!(stages.record(AxisId::X).reference_position, 300);
    assert_eq!(stages.record(AxisId::Y).reference_position, 400);
    assert_eq!(stages.record(AxisId::Z).reference_position, 500);
    assert_eq!(controller.converged(), [false; 3]);
    assert_eq!(controller.state(), &ControllerState::Scanning(AxisId::X));
}

#[test]
fn single_unstable_pass_resets_every_flag() {
    let mut stages = stages([500, 500, 500]);
    let mut optimizer = ScriptedOptimizer::default().script(AxisId::Z, [Ok(540)]);
    let mut controller = ConvergenceController::new(&bench_config());
    let mut events = Vec::new();
    controller.begin(&mut stages);

    controller.step(&mut stages, &mut optimizer, &mut events);
    controller.step(&mut stages, &mut optimizer, &mut events);
    assert_eq!(controller.converged(), [true, true, false]);

    let state = controller.step(&mut stages, &mut optimizer, &mut events);
    assert_eq!(state, &ControllerState::Scanning(AxisId::X));
    assert_eq!(controller.converged(), [false; 3]);
    assert!(AxisId::ALL.iter().all(|axis| !stages.record(*axis).converged));
    let z = stages.record(AxisId::Z);
    assert_eq!(z.reference_position, 540);
    assert_eq!(z.optimized_position, 540);
    assert_eq!(
        events.last(),
        Some(&AlignmentEvent::AxisReset {
            axis: AxisId::Z,
            pass: 2,
            drift: 40,
        })
    );

    while !controller.state().is_terminal() {
        controller.step(&mut stages, &mut optimizer, &mut events);
    }
    assert_eq!(
        controller.status(),
        Some(ConvergenceStatus::AllConverged { passes: 6 })
    );
    assert_eq!(stages.positions(), [500, 500, 540]);
}

#[test]
fn drift_of_exactly_one_coarse_step_counts_as_stable() {
    let mut stages = stages([500, 500, 500]);
    let mut optimizer = ScriptedOptimizer::default().script(AxisId::X, [Ok(510)]);

    let status = ConvergenceController::new(&bench_config()).run(
        &mut stages,
        &mut optimizer,
        &mut NoopSink,
    );

    assert_eq!(status, ConvergenceStatus::AllConverged { passes: 3 });
}

#[test]
fn axes_needing_three_passes_exhaust_small_cycle_budget() {
    let config = SessionConfig {
        cycle_limit: 2,
        ..bench_config()
    };
    let mut stages = stages([500, 500, 500]);
    let mut optimizer = ScriptedOptimizer::default()
        .script(AxisId::X, [Ok(600), Ok(700)])
        .script(AxisId::Y, [Ok(600), Ok(700)])
        .script(AxisId::Z, [Ok(600), Ok(700)]);

    let status = ConvergenceController::new(&config).run(
        &mut stages,
        &mut optimizer,
        &mut NoopSink,
    );

    assert_eq!(
        status,
        ConvergenceStatus::Failed(FailureReason::CycleLimitExceeded { limit: 2 })
    );
    assert_eq!(optimizer.calls.len(), 3);
}

#[test]
fn cycle_budget_ending_on_travel_limit_needs_realignment() {
    let config = SessionConfig {
        cycle_limit: 1,
        ..bench_config()
    };
    let mut stages = stages([500, 500, 500]);
    let mut optimizer = ScriptedOptimizer::default().script(AxisId::Y, [Ok(0)]);

    let status = ConvergenceController::new(&config).run(
        &mut stages,
        &mut optimizer,
        &mut NoopSink,
    );

    assert_eq!(
        status,
        ConvergenceStatus::Failed(FailureReason::TravelLimitReached {
            axis: AxisId::Y,
            position: 0,
        })
    );
}

#[test]
fn out_of_range_optimizer_failure_reports_travel_limit() {
    let mut stages = stages([1000, 500, 500]);
    let mut optimizer = ScriptedOptimizer::default().script(
        AxisId::X,
        [Err(AlignError::OutOfRange {
            axis: AxisId::X,
            target: 1010,
            max_position: 1000,
        })],
    );
    let mut events = Vec::new();

    let status = ConvergenceController::new(&bench_config()).run(
        &mut stages,
        &mut optimizer,
        &mut events,
    );

    let reason = FailureReason::TravelLimitReached {
        axis: AxisId::X,
        position: 1000,
    };
    assert!(reason.requires_manual_realignment());
    assert_eq!(status, ConvergenceStatus::Failed(reason));
    assert_eq!(
        events.last(),
        Some(&AlignmentEvent::ConvergenceFinished { status })
    );
}

#[test]
fn in_range_optimizer_failure_aborts_with_context() {
    let err = AlignError::StepLimitExceeded {
        axis: AxisId::Y,
        direction: Direction::Negative,
        limit: 100,
    };
    let mut stages = stages([500, 500, 500]);
    let mut optimizer = ScriptedOptimizer::default().script(AxisId::Y, [Err(err.clone())]);

    let status = ConvergenceController::new(&bench_config()).run(
        &mut stages,
        &mut optimizer,
        &mut NoopSink,
    );

    assert_eq!(
        status,
        ConvergenceStatus::Failed(FailureReason::OptimizerAborted {
            axis: AxisId::Y,
            direction: Some(Direction::Negative),
            message: err.to_string(),
        })
    );
    assert_eq!(optimizer.calls, vec![AxisId::X, AxisId::Y]);
}

#[test]
fn terminal_state_ignores_further_steps() {
    let mut stages = stages([500, 500, 500]);
    let mut optimizer = ScriptedOptimizer::default();
    let mut controller = ConvergenceController::new(&bench_config());
    controller.begin(&mut stages);
    for _ in 0..3 {
        controller.step(&mut stages, &mut optimizer, &mut NoopSink);
    }
    assert_eq!(controller.state(), &ControllerState::AllConverged);

    controller.step(&mut stages, &mut optimizer, &mut NoopSink);
    assert_eq!(controller.passes(), 3);
    assert_eq!(optimizer.calls.len(), 3);
}
