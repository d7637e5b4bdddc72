//! Fine single-axis edge refinement by geometric step halving.

use rig::Rig;
use shared::{
    domain::{AxisId, Direction, Edges},
    protocol::{AlignmentEvent, EdgeSide, OptimizationPhase},
};
use tracing::{debug, info};

use crate::{
    config::SessionConfig, convergence::AxisOptimizer, error::AlignError, motion::Positioner,
    progress::ProgressSink,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FineScan {
    pub axis: AxisId,
    pub edges: Edges,
    pub position: i64,
    /// Reading at the pass origin; edges sit where the signal crosses
    /// `threshold_factor` of it.
    pub reference_reading: f64,
}

pub struct FineOptimizer<'a> {
    config: &'a SessionConfig,
}

impl<'a> FineOptimizer<'a> {
    pub fn new(config: &'a SessionConfig) -> Self {
        Self { config }
    }

    /// Refines both edges of `axis` and centers on their midpoint.
    ///
    /// Each side starts from the edge the coarse pass recorded on the axis,
    /// or one coarse step either side of the origin when there is none. Any
    /// move outside the travel range is returned as an error; nothing is
    /// retried.
    pub fn run<R: Rig>(
        &self,
        stages: &mut Positioner<R>,
        axis: AxisId,
        sink: &mut dyn ProgressSink,
    ) -> Result<FineScan, AlignError> {
        let origin = stages.position(axis);
        let seeds = stages.record(axis).edges.unwrap_or_else(|| {
            let step = self.config.coarse_step_counts();
            Edges::new(origin - step, origin + step)
        });

        let reference_reading = stages.read_signal()?;
        let threshold = reference_reading * self.config.threshold_factor;
        debug!(
            %axis,
            origin,
            reference_reading,
            low = seeds.low,
            high = seeds.high,
            "fine optimization started"
        );

        let high = self.refine(stages, axis, seeds.high, Direction::Positive, threshold)?;
        publish_edge(sink, axis, EdgeSide::High, high);
        let low = self.refine(stages, axis, seeds.low, Direction::Negative, threshold)?;
        publish_edge(sink, axis, EdgeSide::Low, low);

        let edges = Edges::new(low, high);
        let position = stages.move_to(axis, edges.midpoint())?;
        stages.commit(stages.record(axis).optimized(edges));
        info!(%axis, low, high, width = edges.width(), position, "fine optimization complete");
        sink.publish(AlignmentEvent::AxisOptimized {
            axis,
            phase: OptimizationPhase::Fine,
            edges,
            position,
        });

        Ok(FineScan {
            axis,
            edges,
            position,
            reference_reading,
        })
    }

    /// Homes in on the threshold crossing on the `outward` side of the peak.
    ///
    /// A reading at or below the threshold means the stage is past the edge,
    /// so the next move heads back toward the peak; otherwise it heads out.
    fn refine<R: Rig>(
        &self,
        stages: &mut Positioner<R>,
        axis: AxisId,
        seed: i64,
        outward: Direction,
        threshold: f64,
    ) -> Result<i64, AlignError> {
        stages.move_to(axis, seed)?;

        let min_step = self.config.min_resolution;
        let min_counts = self.config.min_step_counts();
        let mut step = self.config.coarse_step;
        while step > min_step {
            step = (step / 2.0).max(min_step);
            let reading = stages.read_signal()?;
            let heading = if reading <= threshold {
                outward.flipped()
            } else {
                outward
            };
            let counts = self.config.to_counts(step).max(min_counts);
            stages.move_by(axis, heading.sign() * counts)?;
        }

        let edge = stages.position(axis);
        debug!(%axis, %outward, edge, "fine edge refined");
        Ok(edge)
    }
}

impl<R: Rig> AxisOptimizer<R> for FineOptimizer<'_> {
    fn optimize(
        &mut self,
        stages: &mut Positioner<R>,
        axis: AxisId,
        sink: &mut dyn ProgressSink,
    ) -> Result<i64, AlignError> {
        Ok(self.run(stages, axis, sink)?.position)
    }
}

fn publish_edge(sink: &mut dyn ProgressSink, axis: AxisId, side: EdgeSide, position: i64) {
    sink.publish(AlignmentEvent::EdgeLocated {
        axis,
        phase: OptimizationPhase::Fine,
        side,
        position,
    });
}

#[cfg(test)]
mod tests {
    use rig::{IntensityProfile, MoveKind, SimulatedRig};

    use super::*;
    use crate::{progress::NoopSink, test_support::bench_config};

    fn stages_on<P: IntensityProfile>(
        profile: P,
        start: [i64; 3],
    ) -> Positioner<SimulatedRig<P>> {
        let rig = SimulatedRig::new(profile, 1000).with_positions(start);
        Positioner::new(rig, 1000).expect("positioner")
    }

    fn relative_steps<P: IntensityProfile>(stages: &Positioner<SimulatedRig<P>>) -> Vec<i64> {
        stages
            .rig()
            .moves()
            .iter()
            .filter(|m| m.kind == MoveKind::Relative)
            .map(|m| m.delta().abs())
            .collect()
    }

    fn triangle(p: [i64; 3]) -> f64 {
        (100 - (p[0] - 500).abs()).max(0) as f64
    }

    #[test]
    fn refines_coarse_edges_to_threshold_crossing() {
        let mut stages = stages_on(triangle, [500, 500, 500]);
        let coarse = stages.record(AxisId::X).optimized(Edges::new(450, 550));
        stages.commit(coarse);
        let mut events = Vec::new();

        let scan = FineOptimizer::new(&bench_config())
            .run(&mut stages, AxisId::X, &mut events)
            .expect("fine optimization");

        assert_eq!(scan.reference_reading, 100.0);
        assert_eq!(scan.edges, Edges { low: 450, high: 550 });
        assert_eq!(scan.position, 500);
        assert_eq!(stages.record(AxisId::X).optimized_position, 500);
        assert!(matches!(
            events.last(),
            Some(AlignmentEvent::AxisOptimized {
                phase: OptimizationPhase::Fine,
                position: 500,
                ..
            })
        ));
    }

    #[test]
    fn halving_steps_never_drop_below_resolution() {
        let config = bench_config();
        let mut stages = stages_on(triangle, [500, 500, 500]);
        let coarse = stages.record(AxisId::X).optimized(Edges::new(450, 550));
        stages.commit(coarse);

        FineOptimizer::new(&config)
            .run(&mut stages, AxisId::X, &mut NoopSink)
            .expect("fine optimization");

        let steps = relative_steps(&stages);
        assert_eq!(steps, vec![5, 3, 1, 1, 5, 3, 1, 1]);
        assert!(steps.iter().all(|step| *step >= config.min_step_counts()));
    }

    #[test]
    fn fractional_resolution_rounds_final_step_up() {
        let config = SessionConfig {
            min_resolution: 1.4,
            ..bench_config()
        };
        let mut stages = stages_on(triangle, [500, 500, 500]);
        let coarse = stages.record(AxisId::X).optimized(Edges::new(450, 550));
        stages.commit(coarse);

        let scan = FineOptimizer::new(&config)
            .run(&mut stages, AxisId::X, &mut NoopSink)
            .expect("fine optimization");

        let steps = relative_steps(&stages);
        assert_eq!(steps, vec![5, 3, 2, 5, 3, 2]);
        assert!(steps.iter().all(|step| *step as f64 >= config.min_resolution));
        assert_eq!(scan.edges, Edges { low: 450, high: 550 });
        assert_eq!(scan.position, 500);
    }

    #[test]
    fn falls_back_to_one_coarse_step_around_origin_without_edges() {
        let profile = |p: [i64; 3]| (100 - 10 * (p[1] - 500).abs()).max(0) as f64;
        let config = bench_config();
        let mut stages = stages_on(profile, [500, 500, 500]);

        let scan = FineOptimizer::new(&config)
            .run(&mut stages, AxisId::Y, &mut NoopSink)
            .expect("fine optimization");

        // Crossings of half height sit at 495 and 505.
        assert_eq!(scan.edges, Edges { low: 496, high: 504 });
        assert!((scan.edges.high - 505).abs() as f64 <= config.min_resolution);
        assert!((scan.edges.low - 495).abs() as f64 <= config.min_resolution);
        assert_eq!(scan.position, 500);
    }

    #[test]
    fn bound_violation_is_fatal() {
        let mut stages = stages_on(triangle, [995, 500, 500]);

        let err = FineOptimizer::new(&bench_config())
            .run(&mut stages, AxisId::X, &mut NoopSink)
            .expect_err("seed beyond travel");

        assert_eq!(
            err,
            AlignError::OutOfRange {
                axis: AxisId::X,
                target: 1005,
                max_position: 1000,
            }
        );
        assert_eq!(stages.position(AxisId::X), 995);
    }
}
