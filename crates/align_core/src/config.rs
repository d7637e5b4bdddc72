use serde::{Deserialize, Serialize};

use crate::error::AlignError;

/// Immutable parameters for one alignment run.
///
/// Lengths (`coarse_step`, `min_resolution`, `scan_dimension`) are in
/// µm-equivalent units; positions (`max_position`, `center_position`) are in
/// encoder counts. `counts_per_unit` converts between the two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub noise_exceedance_factor: f64,
    pub coarse_step: f64,
    pub step_limit: u32,
    pub cycle_limit: u32,
    pub threshold_factor: f64,
    pub min_resolution: f64,
    pub scan_dimension: f64,
    pub max_position: i64,
    pub center_position: i64,
    pub counts_per_unit: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            noise_exceedance_factor: 2.0,
            coarse_step: 50.0,
            step_limit: 200,
            cycle_limit: 30,
            threshold_factor: 0.9,
            min_resolution: 0.05,
            scan_dimension: 24_984.0,
            max_position: 857_600,
            center_position: 428_800,
            counts_per_unit: 34.304,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), AlignError> {
        positive("noise_exceedance_factor", self.noise_exceedance_factor)?;
        positive("coarse_step", self.coarse_step)?;
        positive("min_resolution", self.min_resolution)?;
        positive("scan_dimension", self.scan_dimension)?;
        positive("counts_per_unit", self.counts_per_unit)?;

        if self.step_limit == 0 {
            return Err(invalid("step_limit must be at least 1"));
        }
        if self.cycle_limit == 0 {
            return Err(invalid("cycle_limit must be at least 1"));
        }
        if !(self.threshold_factor > 0.0 && self.threshold_factor <= 1.0) {
            return Err(invalid(format!(
                "threshold_factor must lie in (0, 1], got {}",
                self.threshold_factor
            )));
        }
        if self.max_position <= 0 {
            return Err(invalid(format!(
                "max_position must be positive, got {}",
                self.max_position
            )));
        }
        if !(0..=self.max_position).contains(&self.center_position) {
            return Err(invalid(format!(
                "center_position {} outside travel range [0, {}]",
                self.center_position, self.max_position
            )));
        }
        if self.coarse_step_counts() > self.max_position {
            return Err(invalid(format!(
                "coarse_step of {} counts exceeds travel range [0, {}]",
                self.coarse_step_counts(),
                self.max_position
            )));
        }
        Ok(())
    }

    /// Converts a length to encoder counts; every move is at least one count.
    pub fn to_counts(&self, units: f64) -> i64 {
        ((units * self.counts_per_unit).round() as i64).max(1)
    }

    pub fn coarse_step_counts(&self) -> i64 {
        self.to_counts(self.coarse_step)
    }

    /// Smallest move the fine pass may issue, rounded up to whole counts.
    pub fn min_step_counts(&self) -> i64 {
        ((self.min_resolution * self.counts_per_unit).ceil() as i64).max(1)
    }

    /// Number of complete expanding rings that fit the planar scan area.
    pub fn cycle_stop(&self) -> u64 {
        2 * (self.scan_dimension / (2.0 * self.coarse_step)).floor() as u64
    }
}

fn positive(name: &str, value: f64) -> Result<(), AlignError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be a positive number, got {value}")))
    }
}

fn invalid(message: impl Into<String>) -> AlignError {
    AlignError::InvalidConfiguration(message.into())
}
