//! Planar spiral search for any usable signal.

use std::iter;

use rig::Rig;
use shared::{
    domain::{AxisId, Direction},
    protocol::{AlignmentEvent, SpiralOutcome},
};
use tracing::{info, warn};

use crate::{config::SessionConfig, error::AlignError, motion::Positioner, progress::ProgressSink};

/// One coarse unit step of the spiral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiralMove {
    pub axis: AxisId,
    pub direction: Direction,
}

/// Lazily yields the unit steps of `cycle_stop` expanding square rings on x/y,
/// followed by the closing half-cycle leg along x.
///
/// Ring `c` moves `c` steps along x then `c` along y, positive for odd rings
/// and negative for even ones.
pub fn spiral_path(cycle_stop: u64) -> impl Iterator<Item = SpiralMove> {
    let rings = (1..=cycle_stop).flat_map(|cycle| {
        let direction = ring_direction(cycle);
        [AxisId::X, AxisId::Y]
            .into_iter()
            .map(move |axis| (axis, direction, cycle))
    });
    let closing = iter::once((AxisId::X, ring_direction(cycle_stop + 1), cycle_stop));

    rings.chain(closing).flat_map(|(axis, direction, steps)| {
        iter::repeat(SpiralMove { axis, direction }).take(steps as usize)
    })
}

pub fn total_steps(cycle_stop: u64) -> u64 {
    cycle_stop * (cycle_stop + 2)
}

fn ring_direction(cycle: u64) -> Direction {
    if cycle % 2 == 1 {
        Direction::Positive
    } else {
        Direction::Negative
    }
}

/// Signal sufficiency test: the reading exceeds the dark current by `factor`.
pub fn exceeds_noise(reading: f64, dark_current: f64, factor: f64) -> bool {
    reading / dark_current >= factor
}

fn percent_covered(steps_taken: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        steps_taken as f64 * 100.0 / total as f64
    }
}

pub fn run_spiral_search<R: Rig>(
    stages: &mut Positioner<R>,
    config: &SessionConfig,
    dark_current: f64,
    sink: &mut dyn ProgressSink,
) -> Result<SpiralOutcome, AlignError> {
    if !(dark_current.is_finite() && dark_current > 0.0) {
        return Err(AlignError::InvalidDarkCurrent(dark_current));
    }

    let cycle_stop = config.cycle_stop();
    let total = total_steps(cycle_stop);
    let step = config.coarse_step_counts();
    let factor = config.noise_exceedance_factor;
    info!(cycle_stop, total_steps = total, step, "starting planar spiral search");

    let mut steps_taken = 0;
    for spiral_move in spiral_path(cycle_stop) {
        let reading = stages.read_signal()?;
        if exceeds_noise(reading, dark_current, factor) {
            return Ok(signal_found(reading, steps_taken, total, sink));
        }
        stages.move_by(spiral_move.axis, spiral_move.direction.sign() * step)?;
        steps_taken += 1;
        sink.publish(AlignmentEvent::SpiralProgress {
            steps_taken,
            total_steps: total,
            percent_covered: percent_covered(steps_taken, total),
        });
    }

    let reading = stages.read_signal()?;
    if exceeds_noise(reading, dark_current, factor) {
        return Ok(signal_found(reading, steps_taken, total, sink));
    }

    warn!(steps_taken, "scan area exhausted without usable signal");
    sink.publish(AlignmentEvent::SpiralExhausted {
        percent_covered: 100.0,
    });
    Ok(SpiralOutcome {
        found: false,
        percent_covered: 100.0,
        steps_taken,
    })
}

fn signal_found(
    reading: f64,
    steps_taken: u64,
    total: u64,
    sink: &mut dyn ProgressSink,
) -> SpiralOutcome {
    let percent_covered = percent_covered(steps_taken, total);
    info!(reading, steps_taken, percent_covered, "usable signal found");
    sink.publish(AlignmentEvent::SignalFound {
        reading,
        percent_covered,
    });
    SpiralOutcome {
        found: true,
        percent_covered,
        steps_taken,
    }
}

#[cfg(test)]
#[path = "tests/spiral_tests.rs"]
mod tests;
