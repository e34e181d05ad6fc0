//! Error types for the package builder.
//!
//! - [`StageError`] aborts the pipeline (wrapped with its stage in [`PipelineFailure`])
//! - [`DriverWarning`] is recorded per driver and never aborts
//! - [`ConfigError`] is raised before any stage runs

use crate::builder::pipeline::Stage;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a required stage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    #[error("source sync failed: {0}")]
    Sync(String),

    #[error("build step failed: {0}")]
    Compile(String),

    #[error("environment setup failed: {0}")]
    Setup(String),

    #[error("packaging failed: {0}")]
    Packaging(String),
}

impl StageError {
    /// Taxonomy name shown in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::Sync(_) => "SyncError",
            StageError::Compile(_) => "CompileError",
            StageError::Setup(_) => "SetupError",
            StageError::Packaging(_) => "PackagingError",
        }
    }
}

/// A required stage failed; the pipeline stopped here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{stage} failed ({}): {error}", .error.kind())]
pub struct PipelineFailure {
    pub stage: Stage,
    #[source]
    pub error: StageError,
}

/// Non-fatal problem with one driver sub-build.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverWarning {
    #[error("{name}: skipped, incomplete spec (missing {})", .missing.join(", "))]
    IncompleteSpec {
        name: String,
        missing: Vec<&'static str>,
    },

    #[error("{name}: skipped, {field} '{value}' must be a relative path inside the root")]
    InvalidPath {
        name: String,
        field: &'static str,
        value: String,
    },

    #[error("{name}: clone failed (exit {exit_code})")]
    CloneFailed { name: String, exit_code: i32 },

    #[error("{name}: pull failed (exit {exit_code}), building existing checkout")]
    PullFailed { name: String, exit_code: i32 },

    #[error("{name}: build script failed (exit {exit_code})")]
    BuildFailed { name: String, exit_code: i32 },

    #[error("{name}: failed to copy {artifact} to {}: {reason}", .dest.display())]
    CopyFailed {
        name: String,
        artifact: String,
        dest: PathBuf,
        reason: String,
    },
}

impl DriverWarning {
    /// Whether the driver entry was rejected before anything ran.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            DriverWarning::IncompleteSpec { .. } | DriverWarning::InvalidPath { .. }
        )
    }
}

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid JSON in config {}: {source}", .path.display())]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{field} must be a relative path inside the root directory, got '{value}'")]
    EscapesRoot { field: &'static str, value: String },

    #[error("Home directory could not be determined for '{0}'")]
    NoHome(String),

    #[error("IO error during config operations: {0}")]
    Io(#[from] io::Error),
}
