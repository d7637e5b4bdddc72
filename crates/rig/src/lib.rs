//! Hardware seams for the alignment engine: motorized stages and the
//! photocurrent meter, plus a simulated rig for dry runs and tests.

use shared::{domain::AxisId, error::RigError};

mod profile;
mod sim;

pub use profile::{GaussianBeam, GridProfile, IntensityProfile};
pub use sim::{MoveKind, MoveRecord, SimulatedRig};

/// Three linear stages and a signal source sampled at their current positions.
///
/// All calls block until the hardware has finished. Positions are in encoder counts.
pub trait Rig {
    fn position(&self, axis: AxisId) -> Result<i64, RigError>;
    fn move_by(&mut self, axis: AxisId, delta: i64) -> Result<(), RigError>;
    fn move_to(&mut self, axis: AxisId, target: i64) -> Result<(), RigError>;
    fn read_signal(&mut self) -> Result<f64, RigError>;
}

/// Shutter-closed baseline measurement supplied by the calibration step.
pub trait Calibration {
    fn measure_dark_current(&mut self) -> Result<f64, RigError>;
}

impl<R: Rig + ?Sized> Rig for &mut R {
    fn position(&self, axis: AxisId) -> Result<i64, RigError> {
        (**self).position(axis)
    }

    fn move_by(&mut self, axis: AxisId, delta: i64) -> Result<(), RigError> {
        (**self).move_by(axis, delta)
    }

    fn move_to(&mut self, axis: AxisId, target: i64) -> Result<(), RigError> {
        (**self).move_to(axis, target)
    }

    fn read_signal(&mut self) -> Result<f64, RigError> {
        (**self).read_signal()
    }
}

impl<R: Rig + ?Sized> Rig for Box<R> {
    fn position(&self, axis: AxisId) -> Result<i64, RigError> {
        (**self).position(axis)
    }

    fn move_by(&mut self, axis: AxisId, delta: i64) -> Result<(), RigError> {
        (**self).move_by(axis, delta)
    }

    fn move_to(&mut self, axis: AxisId, target: i64) -> Result<(), RigError> {
        (**self).move_to(axis, target)
    }

    fn read_signal(&mut self) -> Result<f64, RigError> {
        (**self).read_signal()
    }
}
