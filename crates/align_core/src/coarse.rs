//! Coarse single-axis boundary search.
//!
//! Walks outward in fixed steps while tracking the running maximum. The first
//! reading at or below `threshold_factor * max` marks an edge. After the
//! positive edge the axis returns to one step below the reference sample (the
//! position of the running maximum) and walks the negative side. A new maximum
//! on the negative side means the positive edge was judged against a maximum
//! that was too small; it is then re-derived from the recorded samples.

use rig::Rig;
use shared::{
    domain::{AxisId, Direction, Edges},
    protocol::{AlignmentEvent, EdgeSide, OptimizationPhase},
};
use tracing::{debug, info, warn};

use crate::{
    config::SessionConfig, convergence::AxisOptimizer, error::AlignError, motion::Positioner,
    progress::ProgressSink,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub position: i64,
    pub reading: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoarseScan {
    pub axis: AxisId,
    pub edges: Edges,
    pub position: i64,
    pub max_reading: f64,
    /// The positive edge was re-derived after a larger maximum turned up.
    pub edge_corrected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Classified {
    NewMaximum,
    /// Below the running maximum but above its threshold fraction.
    Shoulder,
    Edge,
}

/// Samples and running maximum owned by a single optimizer invocation.
struct BoundarySearch {
    threshold_factor: f64,
    max: Option<f64>,
    peak_position: i64,
    positive: Vec<Sample>,
    negative: Vec<Sample>,
    positive_edge_valid: bool,
}

impl BoundarySearch {
    fn new(threshold_factor: f64, origin: i64) -> Self {
        Self {
            threshold_factor,
            max: None,
            peak_position: origin,
            positive: Vec::new(),
            negative: Vec::new(),
            positive_edge_valid: true,
        }
    }

    fn classify(&self, reading: f64) -> Classified {
        match self.max {
            None => Classified::NewMaximum,
            Some(max) if reading > max => Classified::NewMaximum,
            Some(max) if reading <= max * self.threshold_factor => Classified::Edge,
            Some(_) => Classified::Shoulder,
        }
    }

    fn record(&mut self, direction: Direction, sample: Sample) {
        match direction {
            Direction::Positive => self.positive.push(sample),
            Direction::Negative => self.negative.push(sample),
        }
    }

    fn raise_max(&mut self, direction: Direction, sample: Sample) {
        if direction == Direction::Negative {
            self.positive_edge_valid = false;
        }
        self.max = Some(sample.reading);
        self.peak_position = sample.position;
    }

    /// First recorded sample (positive list first) at or below the final threshold.
    fn corrected_edge(&self) -> Option<Sample> {
        let threshold = self.max? * self.threshold_factor;
        self.positive
            .iter()
            .chain(&self.negative)
            .find(|sample| sample.reading <= threshold)
            .copied()
    }
}

pub struct CoarseOptimizer {
    step: i64,
    threshold_factor: f64,
    step_limit: u32,
}

impl CoarseOptimizer {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            step: config.coarse_step_counts(),
            threshold_factor: config.threshold_factor,
            step_limit: config.step_limit,
        }
    }

    pub fn run<R: Rig>(
        &self,
        stages: &mut Positioner<R>,
        axis: AxisId,
        sink: &mut dyn ProgressSink,
    ) -> Result<CoarseScan, AlignError> {
        let origin = stages.position(axis);
        let mut search = BoundarySearch::new(self.threshold_factor, origin);
        debug!(%axis, origin, step = self.step, "coarse optimization started");

        let mut high = self.walk(stages, axis, Direction::Positive, &mut search)?;
        publish_edge(sink, axis, EdgeSide::High, high);

        stages.move_to(axis, search.peak_position - self.step)?;
        let low = self.walk(stages, axis, Direction::Negative, &mut search)?;
        publish_edge(sink, axis, EdgeSide::Low, low);

        let mut edge_corrected = false;
        if !search.positive_edge_valid {
            match search.corrected_edge() {
                Some(sample) => {
                    info!(
                        %axis,
                        naive = high,
                        corrected = sample.position,
                        "positive edge re-derived"
                    );
                    high = sample.position;
                    edge_corrected = true;
                    sink.publish(AlignmentEvent::EdgeCorrected {
                        axis,
                        position: high,
                    });
                }
                None => warn!(
                    %axis,
                    edge = high,
                    "no recorded sample below final threshold; keeping edge"
                ),
            }
        }

        let edges = Edges::new(low, high);
        let position = stages.move_to(axis, edges.midpoint())?;
        stages.commit(stages.record(axis).optimized(edges));
        info!(%axis, low = edges.low, high = edges.high, position, "coarse optimization complete");
        sink.publish(AlignmentEvent::AxisOptimized {
            axis,
            phase: OptimizationPhase::Coarse,
            edges,
            position,
        });

        Ok(CoarseScan {
            axis,
            edges,
            position,
            max_reading: search.max.unwrap_or_default(),
            edge_corrected,
        })
    }

    /// Steps outward in `direction` until a reading falls to the threshold;
    /// returns the position of that reading.
    fn walk<R: Rig>(
        &self,
        stages: &mut Positioner<R>,
        axis: AxisId,
        direction: Direction,
        search: &mut BoundarySearch,
    ) -> Result<i64, AlignError> {
        for _ in 0..self.step_limit {
            let position = stages.position(axis);
            let reading = stages.read_signal()?;
            let sample = Sample { position, reading };

            match search.classify(reading) {
                Classified::Edge => {
                    debug!(%axis, %direction, position, reading, "edge reached");
                    return Ok(position);
                }
                Classified::NewMaximum => {
                    search.record(direction, sample);
                    search.raise_max(direction, sample);
                }
                Classified::Shoulder => search.record(direction, sample),
            }
            stages.move_by(axis, direction.sign() * self.step)?;
        }

        Err(AlignError::StepLimitExceeded {
            axis,
            direction,
            limit: self.step_limit,
        })
    }
}

impl<R: Rig> AxisOptimizer<R> for CoarseOptimizer {
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
        phase: OptimizationPhase::Coarse,
        side,
        position,
    });
}

#[cfg(test)]
#[path = "tests/coarse_tests.rs"]
mod tests;
