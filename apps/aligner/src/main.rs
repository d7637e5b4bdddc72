use std::path::PathBuf;

use align_core::{Aligner, SessionConfig};
use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use rig::{Calibration, GridProfile, IntensityProfile, SimulatedRig};
use shared::{domain::AxisId, protocol::AlignmentOutcome};
use tokio::{sync::mpsc, task};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod config;
mod progress;
mod report;

use config::{load_settings, SimulationSettings};
use progress::{pump_events, ChannelSink};
use report::AlignmentReport;

/// Aligns a simulated three-stage optical rig onto the beam.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "aligner.toml")]
    config: PathBuf,
    /// Skip the shutter-closed calibration and use this dark current.
    #[arg(long)]
    dark_current: Option<f64>,
    /// Where to write the JSON run report.
    #[arg(long)]
    report: Option<PathBuf>,
    /// Grid laser profile (JSON) to simulate instead of the Gaussian beam.
    #[arg(long)]
    profile: Option<PathBuf>,
}

struct SessionResult {
    dark_current: f64,
    outcome: AlignmentOutcome,
    final_positions: [i64; 3],
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let args = Args::parse();

    let mut settings = load_settings(&args.config)?;
    if let Some(path) = args.report {
        settings.report_path = path;
    }
    if let Some(path) = args.profile {
        settings.simulation.profile_path = Some(path);
    }

    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    info!(%run_id, config = %args.config.display(), "alignment run starting");

    let (tx, rx) = mpsc::unbounded_channel();
    let reporter = tokio::spawn(pump_events(rx));
    let session = settings.session.clone();
    let simulation = settings.simulation.clone();
    let dark_current = args.dark_current;
    let worker = match &settings.simulation.profile_path {
        Some(path) => {
            let grid = GridProfile::load(path)?;
            task::spawn_blocking(move || {
                align(grid, session, simulation, dark_current, ChannelSink::new(tx))
            })
        }
        None => {
            let beam = simulation.beam();
            task::spawn_blocking(move || {
                align(beam, session, simulation, dark_current, ChannelSink::new(tx))
            })
        }
    };

    let result = worker.await.context("alignment worker panicked")??;
    let events_published = reporter.await.context("progress reporter failed")?;

    match &result.outcome {
        AlignmentOutcome::Aligned { positions } => info!(?positions, "rig aligned"),
        AlignmentOutcome::SignalNotFound { percent_covered } => {
            warn!(percent_covered, "no usable signal found - manual realignment required")
        }
        AlignmentOutcome::ConvergenceFailed { reason } => {
            warn!(?reason, "{}", reason.remediation())
        }
    }

    let report = AlignmentReport {
        run_id,
        started_at,
        completed_at: Utc::now(),
        config: settings.session,
        dark_current: result.dark_current,
        outcome: result.outcome,
        final_positions: result.final_positions,
        events_published,
    };
    report.write(&settings.report_path)?;
    info!(path = %settings.report_path.display(), "run report written");
    Ok(())
}

/// Blocking session on the simulated rig: center, apply the manual
/// pre-alignment offset, calibrate, then run the full pipeline.
fn align<P: IntensityProfile>(
    profile: P,
    config: SessionConfig,
    simulation: SimulationSettings,
    dark_current: Option<f64>,
    sink: ChannelSink,
) -> anyhow::Result<SessionResult> {
    let rig =
        SimulatedRig::new(profile, config.max_position).with_background(simulation.background);
    let mut aligner =
        Aligner::with_sink(config, rig, sink).context("invalid session configuration")?;

    aligner.center_stages().context("failed to center stages")?;
    for axis in AxisId::ALL {
        aligner
            .stages_mut()
            .move_by(axis, simulation.start_offset[axis.index()])
            .with_context(|| format!("pre-alignment offset on axis {axis} leaves travel range"))?;
    }

    let dark_current = match dark_current {
        Some(value) => value,
        None => aligner
            .stages_mut()
            .rig_mut()
            .measure_dark_current()
            .context("dark current calibration failed")?,
    };
    info!(dark_current, positions = ?aligner.positions(), "pre-alignment complete");

    let outcome = aligner.run(dark_current).context("alignment aborted")?;
    Ok(SessionResult {
        dark_current,
        outcome,
        final_positions: aligner.positions(),
    })
}
