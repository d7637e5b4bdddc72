//! Signal-guided alignment engine for a three-stage optical rig.
//!
//! The pipeline runs a planar spiral search for any usable signal, repeats
//! coarse edge optimization round-robin until every axis is stable, then
//! refines each axis once with the fine optimizer. All hardware calls are
//! synchronous and strictly sequential.

pub mod coarse;
pub mod config;
pub mod convergence;
pub mod error;
pub mod fine;
pub mod motion;
pub mod progress;
pub mod spiral;

use rig::Rig;
use shared::{
    domain::{AxisId, AxisRecord},
    protocol::{AlignmentOutcome, ConvergenceStatus, SpiralOutcome},
};
use tracing::info;

pub use coarse::{CoarseOptimizer, CoarseScan};
pub use config::SessionConfig;
pub use convergence::{AxisOptimizer, ControllerState, ConvergenceController};
pub use error::AlignError;
pub use fine::{FineOptimizer, FineScan};
pub use motion::Positioner;
pub use progress::{NoopSink, ProgressSink};

/// One alignment session: an immutable configuration, the position model over
/// the rig, and the outlet progress events are published to.
pub struct Aligner<R, S = NoopSink> {
    config: SessionConfig,
    stages: Positioner<R>,
    sink: S,
}

impl<R: Rig> Aligner<R> {
    pub fn new(config: SessionConfig, rig: R) -> Result<Self, AlignError> {
        Self::with_sink(config, rig, NoopSink)
    }
}

impl<R: Rig, S: ProgressSink> Aligner<R, S> {
    /// Validates `config` before the rig is touched.
    pub fn with_sink(config: SessionConfig, rig: R, sink: S) -> Result<Self, AlignError> {
        config.validate()?;
        let stages = Positioner::new(rig, config.max_position)?;
        Ok(Self {
            config,
            stages,
            sink,
        })
    }

    pub fn stages(&self) -> &Positioner<R> {
        &self.stages
    }

    pub fn stages_mut(&mut self) -> &mut Positioner<R> {
        &mut self.stages
    }

    pub fn record(&self, axis: AxisId) -> AxisRecord {
        self.stages.record(axis)
    }

    pub fn positions(&self) -> [i64; 3] {
        self.stages.positions()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Moves every axis to the configured travel center.
    pub fn center_stages(&mut self) -> Result<[i64; 3], AlignError> {
        for axis in AxisId::ALL {
            self.stages.move_to(axis, self.config.center_position)?;
        }
        info!(center = self.config.center_position, "stages centered");
        Ok(self.positions())
    }

    pub fn run_spiral_search(&mut self, dark_current: f64) -> Result<SpiralOutcome, AlignError> {
        spiral::run_spiral_search(&mut self.stages, &self.config, dark_current, &mut self.sink)
    }

    pub fn run_coarse_optimize(&mut self, axis: AxisId) -> Result<CoarseScan, AlignError> {
        CoarseOptimizer::new(&self.config).run(&mut self.stages, axis, &mut self.sink)
    }

    pub fn run_fine_optimize(&mut self, axis: AxisId) -> Result<FineScan, AlignError> {
        FineOptimizer::new(&self.config).run(&mut self.stages, axis, &mut self.sink)
    }

    /// Round-robin coarse optimization until all axes hold still or a limit is hit.
    pub fn run_multi_axis_convergence(&mut self) -> ConvergenceStatus {
        let mut optimizer = CoarseOptimizer::new(&self.config);
        ConvergenceController::new(&self.config).run(
            &mut self.stages,
            &mut optimizer,
            &mut self.sink,
        )
    }

    /// Full pipeline: spiral search, convergence, then one fine pass per axis.
    ///
    /// Search outcomes that call for operator action are returned as
    /// [`AlignmentOutcome`] values; errors are reserved for failures outside
    /// the search itself (bad dark current, rig faults, a fine pass hitting a
    /// travel limit).
    pub fn run(&mut self, dark_current: f64) -> Result<AlignmentOutcome, AlignError> {
        let spiral = self.run_spiral_search(dark_current)?;
        if !spiral.found {
            return Ok(AlignmentOutcome::SignalNotFound {
                percent_covered: spiral.percent_covered,
            });
        }

        match self.run_multi_axis_convergence() {
            ConvergenceStatus::AllConverged { passes } => {
                info!(passes, "coarse convergence reached; refining");
            }
            ConvergenceStatus::Failed(reason) => {
                return Ok(AlignmentOutcome::ConvergenceFailed { reason });
            }
        }

        for axis in AxisId::ALL {
            self.run_fine_optimize(axis)?;
        }
        let positions = self.positions();
        info!(?positions, "alignment complete");
        Ok(AlignmentOutcome::Aligned { positions })
    }
}
