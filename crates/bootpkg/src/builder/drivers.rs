//! Driver plugin sub-builds.
//!
//! Each driver is an independent git project with its own build script. One
//! broken upstream project never blocks the others or the package: every
//! problem here becomes a [`DriverWarning`] on that driver's outcome.

use crate::builder::command::{CommandRunner, CommandSpec};
use crate::builder::config::{is_inside, Layout};
use crate::builder::error::DriverWarning;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Artifact file names: a single name or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArtifactNames {
    One(String),
    Many(Vec<String>),
}

impl ArtifactNames {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            ArtifactNames::One(name) => vec![name.clone()],
            ArtifactNames::Many(names) => names.clone(),
        }
    }
}

/// A driver as written in the configuration. Nothing is required here;
/// [`DriverSpec::try_from`] decides whether the entry is usable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverEntry {
    pub repo: Option<String>,
    /// Checkout directory, relative to the root.
    pub path: Option<String>,
    /// Build output directory, relative to the root.
    pub output: Option<String>,
    pub artifacts: Option<ArtifactNames>,
    pub script: Option<String>,
    pub interpreter: Option<String>,
}

impl DriverEntry {
    /// Best available name for log lines, even for broken entries.
    pub fn label(&self) -> String {
        self.path
            .as_deref()
            .or(self.repo.as_deref())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("<unnamed driver>")
            .to_string()
    }
}

/// A validated driver sub-build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverSpec {
    pub repo_url: String,
    pub relative_path: String,
    pub output_relative_path: String,
    pub artifact_names: Vec<String>,
    pub build_script: String,
    pub interpreter: String,
}

impl TryFrom<&DriverEntry> for DriverSpec {
    type Error = DriverWarning;

    fn try_from(entry: &DriverEntry) -> Result<Self, Self::Error> {
        let mut missing = Vec::new();
        let repo_url = required(entry.repo.as_ref(), "repo", &mut missing);
        let relative_path = required(entry.path.as_ref(), "path", &mut missing);
        let output_relative_path = required(entry.output.as_ref(), "output", &mut missing);
        let artifact_names: Vec<String> = entry
            .artifacts
            .as_ref()
            .map(ArtifactNames::to_vec)
            .unwrap_or_default()
            .into_iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        if artifact_names.is_empty() {
            missing.push("artifacts");
        }
        let build_script = required(entry.script.as_ref(), "script", &mut missing);
        let interpreter = required(entry.interpreter.as_ref(), "interpreter", &mut missing);

        if !missing.is_empty() {
            return Err(DriverWarning::IncompleteSpec {
                name: entry.label(),
                missing,
            });
        }

        for (field, value) in [("path", &relative_path), ("output", &output_relative_path)] {
            if !is_inside(std::path::Path::new(value)) {
                return Err(DriverWarning::InvalidPath {
                    name: entry.label(),
                    field,
                    value: value.clone(),
                });
            }
        }
        if let Some(bad) = artifact_names
            .iter()
            .find(|n| n.contains('/') || n.as_str() == "..")
        {
            return Err(DriverWarning::InvalidPath {
                name: entry.label(),
                field: "artifacts",
                value: bad.clone(),
            });
        }

        Ok(Self {
            repo_url,
            relative_path,
            output_relative_path,
            artifact_names,
            build_script,
            interpreter,
        })
    }
}

/// Trimmed value of a required field; records its name when absent or blank.
fn required(value: Option<&String>, field: &'static str, missing: &mut Vec<&'static str>) -> String {
    let value = value.map(|v| v.trim()).unwrap_or_default();
    if value.is_empty() {
        missing.push(field);
    }
    value.to_string()
}

/// What happened to one driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverOutcome {
    pub name: String,
    /// The build script ran and exited 0.
    pub built: bool,
    /// Destination files written.
    pub copied: Vec<PathBuf>,
    pub warnings: Vec<DriverWarning>,
}

impl DriverOutcome {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            built: false,
            copied: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, warning: DriverWarning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    /// The entry was rejected before anything ran.
    pub fn skipped(&self) -> bool {
        self.warnings.iter().any(DriverWarning::is_skip)
    }
}

/// Drivers built when the configuration does not list any.
pub fn default_drivers() -> Vec<DriverEntry> {
    [
        (
            "https://github.com/acidanthera/AptioFixPkg",
            "AptioFixPkg",
            vec!["AptioMemoryFix.efi", "AptioInputFix.efi"],
        ),
        (
            "https://github.com/acidanthera/ApfsSupportPkg",
            "ApfsSupportPkg",
            vec!["ApfsDriverLoader.efi"],
        ),
    ]
    .into_iter()
    .map(|(repo, pkg, artifacts)| DriverEntry {
        repo: Some(repo.to_string()),
        path: Some(pkg.to_string()),
        output: Some(format!("{pkg}/UDK/Build/{pkg}/RELEASE_XCODE5/X64")),
        artifacts: Some(ArtifactNames::Many(
            artifacts.into_iter().map(ToString::to_string).collect(),
        )),
        script: Some("macbuild.tool".to_string()),
        interpreter: Some("bash".to_string()),
    })
    .collect()
}

/// Attempt every entry in order. Never fails as a whole.
pub fn build_all(
    runner: &dyn CommandRunner,
    entries: &[DriverEntry],
    layout: &Layout,
    stream: bool,
) -> Vec<DriverOutcome> {
    info!(count = entries.len(), "building drivers");
    entries
        .iter()
        .map(|entry| build_one(runner, entry, layout, stream))
        .collect()
}

fn build_one(
    runner: &dyn CommandRunner,
    entry: &DriverEntry,
    layout: &Layout,
    stream: bool,
) -> DriverOutcome {
    let spec = match DriverSpec::try_from(entry) {
        Ok(spec) => spec,
        Err(warning) => {
            let mut outcome = DriverOutcome::new(&entry.label());
            outcome.warn(warning);
            return outcome;
        }
    };

    let name = spec.relative_path.clone();
    let mut outcome = DriverOutcome::new(&name);
    let checkout = layout.root.join(&spec.relative_path);

    if !checkout.join(".git").is_dir() {
        info!(driver = %name, "checking out a fresh copy");
        let clone = runner.run(
            &CommandSpec::new(["git", "clone"])
                .arg(&spec.repo_url)
                .arg(checkout.to_string_lossy())
                .current_dir(&layout.root)
                .stream(stream),
        );
        if !clone.success() {
            outcome.warn(DriverWarning::CloneFailed {
                name,
                exit_code: clone.exit_code,
            });
            return outcome;
        }
    }

    let pull = runner.run(
        &CommandSpec::new(["git", "pull"])
            .current_dir(&checkout)
            .stream(stream),
    );
    if !pull.success() {
        outcome.warn(DriverWarning::PullFailed {
            name: name.clone(),
            exit_code: pull.exit_code,
        });
    }

    let chmod = runner.run(
        &CommandSpec::new(["chmod", "+x", spec.build_script.as_str()]).current_dir(&checkout),
    );
    if !chmod.success() {
        debug!(driver = %name, "{}", chmod.describe("chmod"));
    }

    info!(driver = %name, script = %spec.build_script, "building");
    let build = runner.run(
        &CommandSpec::new([spec.interpreter.as_str(), spec.build_script.as_str()])
            .current_dir(&checkout)
            .stream(stream),
    );
    if !build.success() {
        outcome.warn(DriverWarning::BuildFailed {
            name,
            exit_code: build.exit_code,
        });
        return outcome;
    }
    outcome.built = true;

    copy_artifacts(&spec, layout, &mut outcome);
    outcome
}

/// Copy each artifact into both driver directories. Failures are per file.
fn copy_artifacts(spec: &DriverSpec, layout: &Layout, outcome: &mut DriverOutcome) {
    let source_dir = layout.root.join(&spec.output_relative_path);

    for artifact in &spec.artifact_names {
        let src = source_dir.join(artifact);
        for dest_dir in [layout.legacy_drivers(), layout.uefi_drivers()] {
            let dest = dest_dir.join(artifact);
            match std::fs::create_dir_all(&dest_dir).and_then(|()| std::fs::copy(&src, &dest)) {
                Ok(_) => {
                    debug!(driver = %outcome.name, dest = %dest.display(), "copied");
                    outcome.copied.push(dest);
                }
                Err(e) => outcome.warn(DriverWarning::CopyFailed {
                    name: outcome.name.clone(),
                    artifact: artifact.clone(),
                    dest,
                    reason: e.to_string(),
                }),
            }
        }
    }
}
