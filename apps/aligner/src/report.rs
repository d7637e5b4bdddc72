use std::{fs, path::Path};

use align_core::SessionConfig;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::protocol::AlignmentOutcome;
use uuid::Uuid;

/// Persisted summary of one alignment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub config: SessionConfig,
    pub dark_current: f64,
    pub outcome: AlignmentOutcome,
    pub final_positions: [i64; 3],
    pub events_published: usize,
}

impl AlignmentReport {
    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create report directory '{}'", parent.display())
            })?;
        }
        let json = serde_json::to_string_pretty(self).context("failed to encode run report")?;
        fs::write(path, json)
            .with_context(|| format!("failed to write run report '{}'", path.display()))
    }
}
