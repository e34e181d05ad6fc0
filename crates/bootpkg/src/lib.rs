//! Bootloader installer package builder.
//!
//! Drives the whole build through a [`CommandRunner`], so everything above
//! process execution can be exercised without the real toolchain.

pub mod builder;

pub use builder::command::{CommandResult, CommandRunner, CommandSpec, SystemRunner};
pub use builder::config::{BuildConfig, Layout};
pub use builder::error::{ConfigError, DriverWarning, PipelineFailure, StageError};
pub use builder::pipeline::{Pipeline, PipelineOutcome, PipelineReport, Stage};
