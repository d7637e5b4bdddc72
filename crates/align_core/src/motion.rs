//! Position model: the single owner of per-axis records and the rig they describe.

use rig::Rig;
use shared::domain::{AxisId, AxisRecord};
use tracing::{debug, error};

use crate::error::AlignError;

/// Wraps a [`Rig`] and keeps each axis' tracked position in lockstep with it.
///
/// Every move is bounds-checked before it is issued, so a rejected move leaves
/// both the hardware and the tracked position untouched. After each move the
/// stage is queried; a mismatch is reported as [`AlignError::PositionDesync`].
pub struct Positioner<R> {
    rig: R,
    max_position: i64,
    axes: [AxisRecord; 3],
}

impl<R: Rig> Positioner<R> {
    pub fn new(rig: R, max_position: i64) -> Result<Self, AlignError> {
        let mut axes = AxisId::ALL.map(|axis| AxisRecord::new(axis, 0));
        for axis in AxisId::ALL {
            axes[axis.index()] = AxisRecord::new(axis, rig.position(axis)?);
        }
        Ok(Self {
            rig,
            max_position,
            axes,
        })
    }

    pub fn position(&self, axis: AxisId) -> i64 {
        self.axes[axis.index()].current_position
    }

    pub fn positions(&self) -> [i64; 3] {
        AxisId::ALL.map(|axis| self.position(axis))
    }

    pub fn record(&self, axis: AxisId) -> AxisRecord {
        self.axes[axis.index()]
    }

    /// Replaces an axis record. The record must describe where the stage is.
    pub fn commit(&mut self, record: AxisRecord) {
        debug_assert_eq!(
            record.current_position,
            self.position(record.id),
            "committed record must not move the stage"
        );
        self.axes[record.id.index()] = record;
    }

    pub fn in_range(&self, position: i64) -> bool {
        (0..=self.max_position).contains(&position)
    }

    /// The axis sits on either end of its travel.
    pub fn at_travel_limit(&self, axis: AxisId) -> bool {
        let position = self.position(axis);
        position <= 0 || position >= self.max_position
    }

    pub fn check_target(&self, axis: AxisId, target: i64) -> Result<(), AlignError> {
        if self.in_range(target) {
            Ok(())
        } else {
            Err(AlignError::OutOfRange {
                axis,
                target,
                max_position: self.max_position,
            })
        }
    }

    pub fn move_by(&mut self, axis: AxisId, delta: i64) -> Result<i64, AlignError> {
        let current = self.position(axis);
        let target = current
            .checked_add(delta)
            .ok_or_else(|| AlignError::OutOfRange {
                axis,
                target: current.saturating_add(delta),
                max_position: self.max_position,
            })?;
        self.check_target(axis, target)?;
        self.rig.move_by(axis, delta)?;
        self.settle(axis, target)
    }

    pub fn move_to(&mut self, axis: AxisId, target: i64) -> Result<i64, AlignError> {
        self.check_target(axis, target)?;
        if target == self.position(axis) {
            return Ok(target);
        }
        self.rig.move_to(axis, target)?;
        self.settle(axis, target)
    }

    pub fn read_signal(&mut self) -> Result<f64, AlignError> {
        Ok(self.rig.read_signal()?)
    }

    pub fn rig(&self) -> &R {
        &self.rig
    }

    pub fn rig_mut(&mut self) -> &mut R {
        &mut self.rig
    }

    fn settle(&mut self, axis: AxisId, target: i64) -> Result<i64, AlignError> {
        let reported = self.rig.position(axis)?;
        if reported != target {
            error!(%axis, tracked = target, reported, "stage position desynchronized");
            return Err(AlignError::PositionDesync {
                axis,
                tracked: target,
                reported,
            });
        }
        debug!(%axis, position = target, "stage settled");
        let index = axis.index();
        self.axes[index] = self.axes[index].at(target);
        Ok(target)
    }
}
