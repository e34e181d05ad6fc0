//! Bootloader package build system.
//!
//! Structure:
//! - `command` - External command execution (`CommandRunner`)
//! - `vcs` / `revision` - Source tree sync and revision pinning
//! - `tools` - Auxiliary tool builds with cache-skip
//! - `drivers` / `prebuilt` - Driver sub-builds and downloads
//! - `package` - Patch overlay, packaging, artifact check
//! - `pipeline` - The fixed stage sequence
//! - `status` / `doctor` / `record` - Reporting

pub mod command;
pub mod config;
pub mod doctor;
pub mod drivers;
pub mod error;
pub mod package;
pub mod pipeline;
pub mod prebuilt;
pub mod record;
pub mod revision;
pub mod status;
pub mod tools;
pub mod vcs;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use command::CommandRunner;
use config::BuildConfig;
use pipeline::{Pipeline, PipelineOutcome, PipelineReport};
use revision::RevisionPin;
use std::path::PathBuf;

/// Build commands for the CLI.
#[derive(Subcommand)]
pub enum BuildCommands {
    /// Sync sources, build tools and drivers, assemble the package
    Build {
        #[command(flatten)]
        config: ConfigArgs,
        /// Skip driver sub-builds
        #[arg(long)]
        no_drivers: bool,
    },
    /// Show synced sources, tool cache and the last build
    Status {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Print the bootloader tree's checked-out revision
    Revision {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Check that required host tools are installed
    Doctor,
}

/// Where the configuration comes from, plus per-run overrides.
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigArgs {
    /// JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Working directory (default ~/src)
    #[arg(long)]
    pub root: Option<PathBuf>,
    /// Bootloader revision: latest, current, or a revision number
    #[arg(long)]
    pub revision: Option<String>,
}

impl ConfigArgs {
    pub fn load(&self, debug: bool) -> Result<BuildConfig> {
        let mut config = match &self.config {
            Some(path) => BuildConfig::load(path)?,
            None => BuildConfig::default(),
        };
        if let Some(root) = &self.root {
            config.root.clone_from(root);
        }
        if let Some(revision) = &self.revision {
            config.bootloader_revision = RevisionPin::from(revision.clone());
        }
        config.debug |= debug;
        Ok(config)
    }
}

/// Run the whole pipeline and return the package path.
pub fn build(runner: &dyn CommandRunner, config: &BuildConfig) -> Result<PathBuf> {
    println!("=== Building bootloader package ===\n");

    let pipeline = Pipeline::new(runner, config).context("Invalid configuration")?;
    let report = pipeline.run();
    print_summary(&report);

    match report.outcome {
        PipelineOutcome::Success(artifact) => {
            println!("\n=== Build complete ===");
            Ok(artifact)
        }
        PipelineOutcome::Failure(failure) => bail!("{failure}"),
    }
}

fn print_summary(report: &PipelineReport) {
    if !report.drivers.is_empty() {
        println!("\nDrivers:");
        for driver in &report.drivers {
            let state = if driver.built {
                "[built]"
            } else if driver.skipped() {
                "[skipped]"
            } else {
                "[failed]"
            };
            println!("  {:20} {state} {} file(s)", driver.name, driver.copied.len());
            for warning in &driver.warnings {
                println!("    {warning}");
            }
        }
    }
    println!(
        "\n  {} stage(s) in {:.1}s",
        report.stages.len(),
        report.duration.as_secs_f64()
    );
}

/// Print the checked-out bootloader revision.
pub fn revision(runner: &dyn CommandRunner, config: &BuildConfig) -> Result<()> {
    let layout = config.layout()?;
    let source = config.bootloader_source(&layout);
    match revision::current_revision(runner, &source) {
        Some(rev) => {
            println!("{rev}");
            Ok(())
        }
        None => bail!(
            "No revision located for {}. Run: bootpkg build",
            source.local_path.display()
        ),
    }
}
