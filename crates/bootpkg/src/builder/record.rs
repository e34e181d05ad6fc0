//! Summary of the last pipeline run, kept as JSON under the root.

use crate::builder::pipeline::PipelineReport;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRecord {
    /// RFC 3339 local time.
    pub started_at: String,
    pub duration_secs: f64,
    pub success: bool,
    pub artifact: Option<PathBuf>,
    pub failed_stage: Option<String>,
    pub error: Option<String>,
    pub stages: Vec<String>,
    pub drivers: Vec<DriverRecord>,
    pub prebuilt: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverRecord {
    pub name: String,
    pub built: bool,
    pub skipped: bool,
    pub warnings: Vec<String>,
}

impl BuildRecord {
    pub fn from_report(report: &PipelineReport) -> Self {
        let failure = report.outcome.failure();

        Self {
            started_at: report.started_at.to_rfc3339(),
            duration_secs: report.duration.as_secs_f64(),
            success: report.outcome.is_success(),
            artifact: report.outcome.artifact().map(Path::to_path_buf),
            failed_stage: failure.map(|f| f.stage.to_string()),
            error: failure.map(ToString::to_string),
            stages: report.stages.iter().map(ToString::to_string).collect(),
            drivers: report
                .drivers
                .iter()
                .map(|d| DriverRecord {
                    name: d.name.clone(),
                    built: d.built,
                    skipped: d.skipped(),
                    warnings: d.warnings.iter().map(ToString::to_string).collect(),
                })
                .collect(),
            prebuilt: report.prebuilt.clone(),
        }
    }

    /// Load a record written by [`BuildRecord::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("No build record at {}", path.display()))?;
        let record = serde_json::from_str(&contents).context("Failed to parse build record")?;
        Ok(record)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents).context("Failed to write build record")?;
        Ok(())
    }
}
