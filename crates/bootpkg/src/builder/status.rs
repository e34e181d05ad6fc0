//! `bootpkg status`: what is already synced and built under the root.

use crate::builder::command::CommandRunner;
use crate::builder::config::BuildConfig;
use crate::builder::error::ConfigError;
use crate::builder::record::BuildRecord;
use crate::builder::revision::current_revision;
use crate::builder::tools::AUX_TOOLS;
use chrono::{DateTime, Local};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStatus {
    pub name: String,
    pub path: PathBuf,
    pub checked_out: bool,
    pub revision: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCache {
    pub name: &'static str,
    pub path: PathBuf,
    /// Modification time of the marker, if it exists.
    pub built_at: Option<DateTime<Local>>,
}

#[derive(Debug, Clone)]
pub struct StatusReport {
    pub sources: Vec<SourceStatus>,
    pub tools: Vec<ToolCache>,
    /// Driver label and whether its checkout exists.
    pub drivers: Vec<(String, bool)>,
    pub last_build: Option<BuildRecord>,
}

impl StatusReport {
    pub fn collect(runner: &dyn CommandRunner, config: &BuildConfig) -> Result<Self, ConfigError> {
        let layout = config.layout()?;

        let sources = [config.sdk_source(&layout), config.bootloader_source(&layout)]
            .into_iter()
            .map(|source| SourceStatus {
                checked_out: source.is_checked_out(),
                revision: current_revision(runner, &source),
                name: source.name,
                path: source.local_path,
            })
            .collect();

        let tools = AUX_TOOLS
            .iter()
            .map(|tool| {
                let path = tool.artifact_path(&layout);
                let built_at = std::fs::metadata(&path)
                    .and_then(|m| m.modified())
                    .ok()
                    .map(DateTime::<Local>::from);
                ToolCache {
                    name: tool.name,
                    path,
                    built_at,
                }
            })
            .collect();

        let drivers = config
            .drivers
            .iter()
            .map(|entry| {
                let checked_out = entry
                    .path
                    .as_deref()
                    .is_some_and(|p| layout.root.join(p).join(".git").is_dir());
                (entry.label(), checked_out)
            })
            .collect();

        Ok(Self {
            sources,
            tools,
            drivers,
            last_build: BuildRecord::load(&layout.record_file()).ok(),
        })
    }

    pub fn print(&self) {
        println!("Sources:\n");
        for source in &self.sources {
            if source.checked_out {
                let rev = source.revision.as_deref().unwrap_or("unknown");
                println!("  {:12} [synced] @ {rev} {}", source.name, source.path.display());
            } else {
                println!("  {:12} [missing] {}", source.name, source.path.display());
            }
        }

        println!("\nAuxiliary tools:\n");
        for tool in &self.tools {
            match tool.built_at {
                Some(at) => println!("  {:12} [cached] {}", tool.name, at.format("%Y-%m-%d %H:%M")),
                None => println!("  {:12} [missing] {}", tool.name, tool.path.display()),
            }
        }

        println!("\nDrivers:\n");
        if self.drivers.is_empty() {
            println!("  (none configured)");
        }
        for (name, checked_out) in &self.drivers {
            let state = if *checked_out { "[synced]" } else { "[missing]" };
            println!("  {name:20} {state}");
        }

        println!("\nLast build:\n");
        match &self.last_build {
            None => println!("  (none)"),
            Some(record) if record.success => {
                let artifact = record
                    .artifact
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                println!("  {} [ok] {artifact}", record.started_at);
            }
            Some(record) => println!(
                "  {} [failed] {}",
                record.started_at,
                record.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}
