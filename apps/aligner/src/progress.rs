//! One-way progress pump from the blocking alignment worker to the log.

use align_core::ProgressSink;
use shared::protocol::{AlignmentEvent, ConvergenceStatus};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

/// Forwards engine events onto an unbounded channel. Sending never blocks the
/// search thread; events are dropped once the reporter has gone away.
pub struct ChannelSink(UnboundedSender<AlignmentEvent>);

impl ChannelSink {
    pub fn new(tx: UnboundedSender<AlignmentEvent>) -> Self {
        Self(tx)
    }
}

impl ProgressSink for ChannelSink {
    fn publish(&mut self, event: AlignmentEvent) {
        let _ = self.0.send(event);
    }
}

/// Logs every event until the sending side is dropped; returns how many arrived.
pub async fn pump_events(mut rx: UnboundedReceiver<AlignmentEvent>) -> usize {
    let mut received = 0;
    while let Some(event) = rx.recv().await {
        log_event(&event);
        received += 1;
    }
    received
}

fn log_event(event: &AlignmentEvent) {
    match event {
        AlignmentEvent::SpiralProgress {
            steps_taken,
            total_steps,
            percent_covered,
        } => debug!(steps_taken, total_steps, percent_covered, "spiral progress"),
        AlignmentEvent::SignalFound {
            reading,
            percent_covered,
        } => info!(reading, percent_covered, "signal found"),
        AlignmentEvent::SpiralExhausted { percent_covered } => {
            warn!(percent_covered, "no usable signal in scan area - manual realignment required")
        }
        AlignmentEvent::AxisPassStarted { axis, pass } => debug!(%axis, pass, "optimizing axis"),
        AlignmentEvent::EdgeLocated {
            axis,
            phase,
            side,
            position,
        } => debug!(%axis, ?phase, ?side, position, "edge located"),
        AlignmentEvent::EdgeCorrected { axis, position } => {
            info!(%axis, position, "positive edge corrected")
        }
        AlignmentEvent::AxisOptimized {
            axis,
            phase,
            edges,
            position,
        } => info!(%axis, ?phase, low = edges.low, high = edges.high, position, "axis optimized"),
        AlignmentEvent::AxisPassed { axis, pass, drift } => {
            info!(%axis, pass, drift, "axis within tolerance")
        }
        AlignmentEvent::AxisReset { axis, pass, drift } => {
            info!(%axis, pass, drift, "axis drifted; restarting round")
        }
        AlignmentEvent::ConvergenceFinished { status } => match status {
            ConvergenceStatus::AllConverged { passes } => info!(passes, "axes converged"),
            ConvergenceStatus::Failed(reason) => {
                warn!(?reason, "{}", reason.remediation())
            }
        },
    }
}
