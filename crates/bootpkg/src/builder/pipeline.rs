//! The fixed build sequence.
//!
//! Stages run strictly in order. The first required stage that fails stops
//! the run; best-effort stages (drivers and prebuilt downloads) only log.

use crate::builder::command::{chain_succeeded, CommandRunner, CommandSpec};
use crate::builder::config::{BuildConfig, Layout};
use crate::builder::drivers::{self, DriverOutcome};
use crate::builder::error::{ConfigError, PipelineFailure, StageError};
use crate::builder::record::BuildRecord;
use crate::builder::revision::resolve_pin;
use crate::builder::tools::{self, ToolStatus};
use crate::builder::vcs::{self, SyncOptions};
use crate::builder::{package, prebuilt};
use chrono::{DateTime, Local};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    SyncSdk,
    SyncBootloader,
    CompileBaseTools,
    SetupSdkEnvironment,
    BuildAuxiliaryTools,
    InstallPatches,
    CleanBootloaderTree,
    BuildDrivers,
    FetchPrebuiltDrivers,
    StagePrebuiltDrivers,
    AssemblePackage,
    VerifyArtifact,
}

impl Stage {
    /// Every stage in execution order.
    pub const ALL: [Stage; 12] = [
        Stage::SyncSdk,
        Stage::SyncBootloader,
        Stage::CompileBaseTools,
        Stage::SetupSdkEnvironment,
        Stage::BuildAuxiliaryTools,
        Stage::InstallPatches,
        Stage::CleanBootloaderTree,
        Stage::BuildDrivers,
        Stage::FetchPrebuiltDrivers,
        Stage::StagePrebuiltDrivers,
        Stage::AssemblePackage,
        Stage::VerifyArtifact,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::SyncSdk => "SyncSDK",
            Stage::SyncBootloader => "SyncBootloaderSource",
            Stage::CompileBaseTools => "CompileBaseTools",
            Stage::SetupSdkEnvironment => "SetupSDKEnvironment",
            Stage::BuildAuxiliaryTools => "BuildAuxiliaryTools",
            Stage::InstallPatches => "InstallPatches",
            Stage::CleanBootloaderTree => "CleanBootloaderTree",
            Stage::BuildDrivers => "BuildDrivers",
            Stage::FetchPrebuiltDrivers => "FetchPrebuiltDrivers",
            Stage::StagePrebuiltDrivers => "StagePrebuiltDrivers",
            Stage::AssemblePackage => "AssemblePackage",
            Stage::VerifyArtifact => "VerifyArtifact",
        }
    }

    /// Whether a failure here aborts the run.
    pub fn is_required(self) -> bool {
        !matches!(
            self,
            Stage::BuildDrivers | Stage::FetchPrebuiltDrivers | Stage::StagePrebuiltDrivers
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Absolute path of the finished package.
    Success(PathBuf),
    Failure(PipelineFailure),
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Success(_))
    }

    pub fn artifact(&self) -> Option<&Path> {
        match self {
            PipelineOutcome::Success(path) => Some(path),
            PipelineOutcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&PipelineFailure> {
        match self {
            PipelineOutcome::Success(_) => None,
            PipelineOutcome::Failure(failure) => Some(failure),
        }
    }
}

/// Everything one run did.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub outcome: PipelineOutcome,
    /// Stages entered, in order. The last one is the failed stage on failure.
    pub stages: Vec<Stage>,
    pub tools: Vec<(&'static str, ToolStatus)>,
    pub drivers: Vec<DriverOutcome>,
    /// Prebuilt drivers that downloaded.
    pub prebuilt: Vec<String>,
    pub started_at: DateTime<Local>,
    pub duration: Duration,
}

/// Results gathered while the stages run.
#[derive(Default)]
struct Progress {
    stages: Vec<Stage>,
    tools: Vec<(&'static str, ToolStatus)>,
    drivers: Vec<DriverOutcome>,
    prebuilt: Vec<String>,
}

impl Progress {
    fn enter<T>(
        &mut self,
        stage: Stage,
        f: impl FnOnce() -> Result<T, StageError>,
    ) -> Result<T, PipelineFailure> {
        info!("=== {stage} ===");
        self.stages.push(stage);
        f().map_err(|error| {
            error!(stage = %stage, kind = error.kind(), required = stage.is_required(), "{error}");
            PipelineFailure { stage, error }
        })
    }
}

pub struct Pipeline<'a> {
    runner: &'a dyn CommandRunner,
    config: &'a BuildConfig,
    layout: Layout,
}

impl<'a> Pipeline<'a> {
    /// Validate the configuration; no commands run here.
    pub fn new(runner: &'a dyn CommandRunner, config: &'a BuildConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            runner,
            config,
            layout: config.layout()?,
        })
    }

    /// Run every stage and persist a [`BuildRecord`] of the result.
    pub fn run(&self) -> PipelineReport {
        let started_at = Local::now();
        let clock = Instant::now();
        let mut progress = Progress::default();

        let outcome = match self.execute(&mut progress) {
            Ok(artifact) => {
                info!(artifact = %artifact.display(), "build complete");
                PipelineOutcome::Success(artifact)
            }
            Err(failure) => PipelineOutcome::Failure(failure),
        };

        let report = PipelineReport {
            outcome,
            stages: progress.stages,
            tools: progress.tools,
            drivers: progress.drivers,
            prebuilt: progress.prebuilt,
            started_at,
            duration: clock.elapsed(),
        };

        let record_file = self.layout.record_file();
        if let Err(e) = BuildRecord::from_report(&report).save(&record_file) {
            warn!(path = %record_file.display(), "could not write build record: {e:#}");
        }
        report
    }

    fn execute(&self, progress: &mut Progress) -> Result<PathBuf, PipelineFailure> {
        let stream = self.config.debug;
        let layout = &self.layout;

        let sdk = self.config.sdk_source(layout);
        progress.enter(Stage::SyncSdk, || {
            let opts = SyncOptions {
                stream,
                revision: None,
            };
            vcs::sync(self.runner, &sdk, &opts)
        })?;

        let bootloader = self.config.bootloader_source(layout);
        progress.enter(Stage::SyncBootloader, || {
            let opts = SyncOptions {
                stream,
                revision: resolve_pin(self.runner, &bootloader, &self.config.bootloader_revision),
            };
            vcs::sync(self.runner, &bootloader, &opts)
        })?;

        progress.enter(Stage::CompileBaseTools, || {
            let cmd = CommandSpec::new(["make", "-C"])
                .arg(layout.base_tools().to_string_lossy())
                .current_dir(&layout.sdk)
                .stream(stream);
            self.require(&cmd, StageError::Compile)
        })?;

        progress.enter(Stage::SetupSdkEnvironment, || {
            let cmd = CommandSpec::new(["bash", "-c", "source edksetup.sh"])
                .current_dir(&layout.sdk)
                .stream(stream);
            self.require(&cmd, StageError::Setup)
        })?;

        progress.tools = progress.enter(Stage::BuildAuxiliaryTools, || {
            tools::ensure_all(self.runner, layout, stream)
        })?;

        progress.enter(Stage::InstallPatches, || {
            package::install_patches(self.runner, layout, stream)
        })?;

        progress.enter(Stage::CleanBootloaderTree, || {
            let chain: Vec<CommandSpec> = [["bash", "ebuild.sh", "-cleanall"], ["bash", "ebuild.sh", "-fr"]]
                .into_iter()
                .map(|args| {
                    CommandSpec::new(args)
                        .current_dir(&layout.bootloader)
                        .stream(stream)
                })
                .collect();
            let results = self.runner.run_chain(&chain, true);
            if chain_succeeded(&results) {
                return Ok(());
            }
            let reason = match results.last() {
                Some(last) => last.describe(&chain[results.len() - 1].line()),
                None => "ebuild.sh ran no commands".to_string(),
            };
            Err(StageError::Compile(reason))
        })?;

        progress.drivers = progress.enter(Stage::BuildDrivers, || {
            Ok(drivers::build_all(self.runner, &self.config.drivers, layout, stream))
        })?;
        log_driver_summary(&progress.drivers);

        progress.prebuilt = progress.enter(Stage::FetchPrebuiltDrivers, || {
            Ok(prebuilt::fetch(
                self.runner,
                &self.config.prebuilt_base_url,
                &self.config.prebuilt_drivers,
                layout,
                stream,
            ))
        })?;

        let fetched = progress.prebuilt.clone();
        let staged = progress.enter(Stage::StagePrebuiltDrivers, || {
            Ok(prebuilt::stage(&fetched, layout))
        })?;
        info!(count = staged, "prebuilt drivers staged");

        let name = progress.enter(Stage::AssemblePackage, || {
            package::assemble(self.runner, layout, stream)
        })?;

        progress.enter(Stage::VerifyArtifact, || package::verify(layout, name.as_deref()))
    }

    /// Run one command; a non-zero exit becomes `kind(reason)`.
    fn require(
        &self,
        cmd: &CommandSpec,
        kind: fn(String) -> StageError,
    ) -> Result<(), StageError> {
        let result = self.runner.run(cmd);
        if result.success() {
            Ok(())
        } else {
            Err(kind(result.describe(&cmd.line())))
        }
    }
}

fn log_driver_summary(outcomes: &[DriverOutcome]) {
    let built = outcomes.iter().filter(|o| o.built).count();
    let skipped = outcomes.iter().filter(|o| o.skipped()).count();
    info!(
        total = outcomes.len(),
        built,
        skipped,
        failed = outcomes.len() - built - skipped,
        "driver builds finished"
    );
}
