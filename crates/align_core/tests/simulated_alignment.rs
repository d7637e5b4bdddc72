use align_core::{Aligner, SessionConfig};
use rig::{Calibration, GaussianBeam, SimulatedRig};
use shared::{
    domain::AxisId,
    protocol::{AlignmentEvent, AlignmentOutcome, FailureReason, OptimizationPhase},
};

fn config() -> SessionConfig {
    SessionConfig {
        noise_exceedance_factor: 2.0,
        coarse_step: 10.0,
        step_limit: 100,
        cycle_limit: 20,
        threshold_factor: 0.5,
        min_resolution: 1.0,
        scan_dimension: 600.0,
        max_position: 2000,
        center_position: 1000,
        counts_per_unit: 1.0,
    }
}

fn beam_at(center: [f64; 3]) -> GaussianBeam {
    GaussianBeam {
        center,
        waist: 120.0,
        rayleigh_range: 300.0,
        peak: 100.0,
    }
}

fn rig(beam: GaussianBeam, start: [i64; 3]) -> SimulatedRig<GaussianBeam> {
    SimulatedRig::new(beam, 2000)
        .with_positions(start)
        .with_background(1.0)
}

#[test]
fn offset_beam_is_found_converged_and_refined() {
    let mut rig = rig(beam_at([1250.0, 1000.0, 1000.0]), [0, 0, 0]);
    let dark_current = rig.measure_dark_current().expect("dark current");
    assert_eq!(dark_current, 1.0);

    let mut aligner = Aligner::with_sink(config(), rig, Vec::new()).expect("aligner");
    aligner.center_stages().expect("center");
    let outcome = aligner.run(dark_current).expect("pipeline");

    let positions = match outcome {
        AlignmentOutcome::Aligned { positions } => positions,
        other => panic!("expected alignment, got {other:?}"),
    };
    for (position, expected) in positions.iter().zip([1250, 1000, 1000]) {
        assert!((position - expected).abs() <= 10, "{positions:?}");
    }

    let events = aligner.sink();
    assert!(events
        .iter()
        .any(|event| matches!(event, AlignmentEvent::SignalFound { .. })));
    assert!(events
        .iter()
        .any(|event| matches!(event, AlignmentEvent::AxisReset { axis: AxisId::X, .. })));
    let fine_passes = events
        .iter()
        .filter(|event| {
            matches!(
                event,
                AlignmentEvent::AxisOptimized {
                    phase: OptimizationPhase::Fine,
                    ..
                }
            )
        })
        .count();
    assert_eq!(fine_passes, 3);

    for axis in AxisId::ALL {
        let record = aligner.record(axis);
        let edges = record.edges.expect("edges");
        assert!(edges.contains(record.current_position));
        assert_eq!(record.optimized_position, edges.midpoint());
    }
}

#[test]
fn beam_against_travel_end_needs_manual_realignment() {
    let rig = rig(beam_at([1990.0, 1000.0, 1000.0]), [1960, 1000, 1000]);
    let mut aligner = Aligner::new(config(), rig).expect("aligner");

    let outcome = aligner.run(1.0).expect("pipeline");

    let reason = FailureReason::TravelLimitReached {
        axis: AxisId::X,
        position: 2000,
    };
    assert!(reason.requires_manual_realignment());
    assert_eq!(outcome, AlignmentOutcome::ConvergenceFailed { reason });
    assert_eq!(aligner.positions()[0], 2000);
}

#[test]
fn beam_outside_scan_area_is_reported_as_not_found() {
    let config = SessionConfig {
        scan_dimension: 100.0,
        ..config()
    };
    let rig = rig(beam_at([1800.0, 1800.0, 1000.0]), [1000, 1000, 1000]);
    let mut aligner = Aligner::new(config, rig).expect("aligner");

    let outcome = aligner.run(1.0).expect("pipeline");

    assert_eq!(
        outcome,
        AlignmentOutcome::SignalNotFound {
            percent_covered: 100.0
        }
    );
}
