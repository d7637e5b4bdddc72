use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use align_core::SessionConfig;
use anyhow::{bail, Context};
use rig::GaussianBeam;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const ENV_PREFIX: &str = "ALIGN__";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub session: SessionConfig,
    pub simulation: SimulationSettings,
    pub report_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            simulation: SimulationSettings::default(),
            report_path: "./reports/alignment.json".into(),
        }
    }
}

/// Simulated rig used in place of stage controllers and a photocurrent meter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationSettings {
    /// Offset from the travel center where manual pre-alignment leaves the stages.
    pub start_offset: [i64; 3],
    pub background: f64,
    pub beam_center: [f64; 3],
    pub beam_waist: f64,
    pub rayleigh_range: f64,
    pub beam_peak: f64,
    /// Grid laser profile (JSON); replaces the Gaussian beam when set.
    pub profile_path: Option<PathBuf>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            start_offset: [6_000, -4_000, 0],
            background: 0.5,
            beam_center: [431_200.0, 427_900.0, 429_500.0],
            beam_waist: 40_000.0,
            rayleigh_range: 200_000.0,
            beam_peak: 1_000.0,
            profile_path: None,
        }
    }
}

impl SimulationSettings {
    pub fn beam(&self) -> GaussianBeam {
        GaussianBeam {
            center: self.beam_center,
            waist: self.beam_waist,
            rayleigh_range: self.rayleigh_range,
            peak: self.beam_peak,
        }
    }
}

/// Defaults, overlaid by the TOML file at `path` when it exists, overlaid by
/// `ALIGN__<SECTION>__<FIELD>` environment variables.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    load_settings_with(path, env::vars())
}

pub fn load_settings_with(
    path: &Path,
    vars: impl IntoIterator<Item = (String, String)>,
) -> anyhow::Result<Settings> {
    let settings = match fs::read_to_string(path) {
        Ok(raw) => toml::from_str(&raw)
            .with_context(|| format!("invalid settings file '{}'", path.display()))?,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "no settings file; using defaults");
            Settings::default()
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))
        }
    };
    apply_env_overrides(settings, vars)
}

fn apply_env_overrides(
    settings: Settings,
    vars: impl IntoIterator<Item = (String, String)>,
) -> anyhow::Result<Settings> {
    let mut tree = match toml::Value::try_from(&settings).context("failed to encode settings")? {
        toml::Value::Table(tree) => tree,
        other => bail!("settings encoded as {}, expected a table", other.type_str()),
    };
    let mut overridden = false;

    for (key, raw) in vars {
        let Some(path) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let segments: Vec<String> = path.split("__").map(str::to_ascii_lowercase).collect();
        set_path(&mut tree, &segments, parse_env_value(&raw))
            .with_context(|| format!("invalid override {key}"))?;
        debug!(%key, "settings override applied");
        overridden = true;
    }

    if !overridden {
        return Ok(settings);
    }
    toml::Value::Table(tree)
        .try_into::<Settings>()
        .context("environment overrides produce invalid settings")
}

fn set_path(tree: &mut toml::Table, segments: &[String], value: toml::Value) -> anyhow::Result<()> {
    let Some((leaf, parents)) = segments.split_last() else {
        bail!("empty settings path");
    };
    let mut table = tree;
    for segment in parents {
        table = match table.get_mut(segment.as_str()) {
            Some(toml::Value::Table(inner)) => inner,
            _ => bail!("unknown settings section '{segment}'"),
        };
    }
    table.insert(leaf.clone(), value);
    Ok(())
}

/// Reads the value as a TOML literal (`25`, `0.8`, `[1, 2, 3]`), falling back
/// to a plain string.
fn parse_env_value(raw: &str) -> toml::Value {
    toml::from_str::<toml::Table>(&format!("value = {raw}"))
        .ok()
        .and_then(|mut table| table.remove("value"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
