use std::{fs, path::Path};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

/// Photocurrent contributed by the beam at a stage position (encoder counts).
pub trait IntensityProfile {
    fn intensity(&self, position: [i64; 3]) -> f64;
}

impl<F> IntensityProfile for F
where
    F: Fn([i64; 3]) -> f64,
{
    fn intensity(&self, position: [i64; 3]) -> f64 {
        self(position)
    }
}

/// Focused Gaussian beam: the spot widens and dims away from the focal plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianBeam {
    /// Beam axis position in x/y and focal plane in z.
    pub center: [f64; 3],
    /// 1/e² intensity radius at focus.
    pub waist: f64,
    pub rayleigh_range: f64,
    pub peak: f64,
}

impl GaussianBeam {
    fn spot_radius(&self, dz: f64) -> f64 {
        let u = dz / self.rayleigh_range;
        self.waist * (1.0 + u * u).sqrt()
    }
}

impl IntensityProfile for GaussianBeam {
    fn intensity(&self, position: [i64; 3]) -> f64 {
        let dx = position[0] as f64 - self.center[0];
        let dy = position[1] as f64 - self.center[1];
        let dz = position[2] as f64 - self.center[2];
        let w = self.spot_radius(dz);
        let r2 = dx * dx + dy * dy;
        self.peak * (self.waist / w).powi(2) * (-2.0 * r2 / (w * w)).exp()
    }
}

/// Planar intensity map, e.g. a captured laser profile. Cell `[row][col]`
/// covers x in `[origin_x + col*cell_size, origin_x + (col+1)*cell_size)`, and
/// likewise rows along y. Outside the grid the intensity is zero; z is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridProfile {
    pub origin: [i64; 2],
    pub cell_size: i64,
    pub cells: Vec<Vec<f64>>,
}

impl GridProfile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read laser profile '{}'", path.display()))?;
        let profile: GridProfile = serde_json::from_str(&raw)
            .with_context(|| format!("invalid laser profile json in '{}'", path.display()))?;
        profile.validate()?;
        Ok(profile)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.cell_size <= 0 {
            bail!("laser profile cell_size must be positive, got {}", self.cell_size);
        }
        let Some(width) = self.cells.first().map(Vec::len) else {
            bail!("laser profile has no rows");
        };
        if width == 0 || self.cells.iter().any(|row| row.len() != width) {
            bail!("laser profile rows must be non-empty and of equal length");
        }
        Ok(())
    }

    fn cell_index(&self, coordinate: i64, origin: i64, len: usize) -> Option<usize> {
        let offset = coordinate - origin;
        if offset < 0 {
            return None;
        }
        let index = usize::try_from(offset / self.cell_size).ok()?;
        (index < len).then_some(index)
    }
}

impl IntensityProfile for GridProfile {
    fn intensity(&self, position: [i64; 3]) -> f64 {
        let rows = self.cells.len();
        let cols = self.cells.first().map_or(0, Vec::len);
        let row = self.cell_index(position[1], self.origin[1], rows);
        let col = self.cell_index(position[0], self.origin[0], cols);
        match (row, col) {
            (Some(row), Some(col)) => self.cells[row][col],
            _ => 0.0,
        }
    }
}
