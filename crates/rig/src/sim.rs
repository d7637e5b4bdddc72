use shared::{domain::AxisId, error::RigError};
use tracing::debug;

use crate::{Calibration, IntensityProfile, Rig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    Relative,
    Absolute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveRecord {
    pub axis: AxisId,
    pub kind: MoveKind,
    pub from: i64,
    pub to: i64,
}

impl MoveRecord {
    pub fn delta(&self) -> i64 {
        self.to - self.from
    }
}

/// In-memory rig: ideal stages with hard travel limits over an intensity profile.
pub struct SimulatedRig<P> {
    profile: P,
    positions: [i64; 3],
    max_position: i64,
    background: f64,
    beam_blocked: bool,
    reads: u64,
    moves: Vec<MoveRecord>,
}

impl<P: IntensityProfile> SimulatedRig<P> {
    pub fn new(profile: P, max_position: i64) -> Self {
        Self {
            profile,
            positions: [0; 3],
            max_position,
            background: 0.0,
            beam_blocked: false,
            reads: 0,
            moves: Vec::new(),
        }
    }

    /// Places the stages without recording moves, as if left there by hand.
    pub fn with_positions(mut self, positions: [i64; 3]) -> Self {
        self.positions = positions;
        self
    }

    /// Dark-current level added to every reading.
    pub fn with_background(mut self, background: f64) -> Self {
        self.background = background;
        self
    }

    pub fn positions(&self) -> [i64; 3] {
        self.positions
    }

    pub fn moves(&self) -> &[MoveRecord] {
        &self.moves
    }

    pub fn reads(&self) -> u64 {
        self.reads
    }

    pub fn set_beam_blocked(&mut self, blocked: bool) {
        self.beam_blocked = blocked;
    }

    fn apply(&mut self, axis: AxisId, kind: MoveKind, target: i64) -> Result<(), RigError> {
        if !(0..=self.max_position).contains(&target) {
            return Err(RigError::OutOfRange {
                axis,
                target,
                max_position: self.max_position,
            });
        }
        let from = self.positions[axis.index()];
        self.positions[axis.index()] = target;
        self.moves.push(MoveRecord {
            axis,
            kind,
            from,
            to: target,
        });
        Ok(())
    }
}

impl<P: IntensityProfile> Rig for SimulatedRig<P> {
    fn position(&self, axis: AxisId) -> Result<i64, RigError> {
        Ok(self.positions[axis.index()])
    }

    fn move_by(&mut self, axis: AxisId, delta: i64) -> Result<(), RigError> {
        let target = self.positions[axis.index()] + delta;
        self.apply(axis, MoveKind::Relative, target)
    }

    fn move_to(&mut self, axis: AxisId, target: i64) -> Result<(), RigError> {
        self.apply(axis, MoveKind::Absolute, target)
    }

    fn read_signal(&mut self) -> Result<f64, RigError> {
        self.reads += 1;
        if self.beam_blocked {
            return Ok(self.background);
        }
        Ok(self.background + self.profile.intensity(self.positions))
    }
}

impl<P: IntensityProfile> Calibration for SimulatedRig<P> {
    fn measure_dark_current(&mut self) -> Result<f64, RigError> {
        self.set_beam_blocked(true);
        let reading = self.read_signal();
        self.set_beam_blocked(false);
        let reading = reading?;
        debug!(reading, "measured dark current with beam blocked");
        Ok(reading)
    }
}

#[cfg(test)]
#[path = "tests/sim_tests.rs"]
mod tests;
