//! Source tree synchronization (clone-or-update).
//!
//! A tree without its VCS marker directory gets a fresh checkout. A tree that
//! has one gets updated and then cleaned. The clean only runs after the update
//! succeeded, so a failed pull never destroys local state.

use crate::builder::command::{chain_succeeded, CommandRunner, CommandSpec};
use crate::builder::error::StageError;
use std::path::PathBuf;
use tracing::info;

/// Version-control system of a source tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VcsKind {
    /// Distributed (git).
    Git,
    /// Centralized (subversion).
    Svn,
}

impl VcsKind {
    /// Directory whose presence means "already checked out".
    pub fn marker(self) -> &'static str {
        match self {
            VcsKind::Git => ".git",
            VcsKind::Svn => ".svn",
        }
    }
}

/// One synchronized source tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoSource {
    pub name: String,
    pub url: String,
    pub local_path: PathBuf,
    pub kind: VcsKind,
    pub branch: Option<String>,
    /// Subdirectory that survives the post-update clean (git only).
    pub preserve: Option<String>,
}

impl RepoSource {
    pub fn is_checked_out(&self) -> bool {
        self.local_path.join(self.kind.marker()).is_dir()
    }
}

/// What [`sync`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncAction {
    CheckedOut,
    Updated,
}

#[derive(Clone, Debug, Default)]
pub struct SyncOptions {
    pub stream: bool,
    /// Target revision; `None` means latest.
    pub revision: Option<String>,
}

/// Bring `source` up to date, checking it out first if needed.
pub fn sync(
    runner: &dyn CommandRunner,
    source: &RepoSource,
    opts: &SyncOptions,
) -> Result<SyncAction, StageError> {
    if !source.is_checked_out() {
        info!(source = %source.name, url = %source.url, "checking out a fresh copy");

        if let Some(parent) = source.local_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StageError::Sync(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let result = runner.run(&checkout_command(source, opts));
        if !result.success() {
            return Err(StageError::Sync(
                result.describe(&format!("checkout of {}", source.name)),
            ));
        }
        return Ok(SyncAction::CheckedOut);
    }

    info!(source = %source.name, revision = opts.revision.as_deref().unwrap_or("latest"), "updating");

    let results = runner.run_chain(&update_commands(source, opts), true);
    if !chain_succeeded(&results) {
        let reason = results.last().map_or_else(
            || format!("update of {} ran no commands", source.name),
            |r| r.describe(&format!("update of {}", source.name)),
        );
        return Err(StageError::Sync(reason));
    }
    Ok(SyncAction::Updated)
}

/// Fresh checkout: shallow clone for git, plain checkout for svn.
pub fn checkout_command(source: &RepoSource, opts: &SyncOptions) -> CommandSpec {
    let dest = source.local_path.to_string_lossy().into_owned();

    let cmd = match source.kind {
        VcsKind::Git => {
            let mut cmd = CommandSpec::new(["git", "clone"]).arg(&source.url);
            if let Some(branch) = &source.branch {
                cmd = cmd.args(["-b", branch.as_str()]);
            }
            cmd.args(["--depth", "1"]).arg(dest)
        }
        VcsKind::Svn => {
            let mut cmd = CommandSpec::new(["svn", "checkout"]);
            if let Some(rev) = &opts.revision {
                cmd = cmd.args(["-r", rev.as_str()]);
            }
            cmd.arg(&source.url).arg(dest)
        }
    };

    let cmd = match source.local_path.parent() {
        Some(parent) => cmd.current_dir(parent),
        None => cmd,
    };
    cmd.stream(opts.stream)
}

/// Update sequence: fetch first, destructive cleanup after.
pub fn update_commands(source: &RepoSource, opts: &SyncOptions) -> Vec<CommandSpec> {
    let cmds = match source.kind {
        VcsKind::Git => {
            let mut clean = CommandSpec::new(["git", "clean", "-fdx"]);
            if let Some(keep) = &source.preserve {
                clean = clean.args(["-e".to_string(), format!("{keep}/")]);
            }
            vec![CommandSpec::new(["git", "pull"]), clean]
        }
        VcsKind::Svn => {
            let rev = opts.revision.as_deref().unwrap_or("HEAD");
            vec![
                CommandSpec::new(["svn".to_string(), "update".to_string(), format!("-r{rev}")]),
                CommandSpec::new(["svn", "revert", "-R", "."]),
                CommandSpec::new(["svn", "cleanup", "--remove-unversioned"]),
            ]
        }
    };

    cmds.into_iter()
        .map(|c| c.current_dir(&source.local_path).stream(opts.stream))
        .collect()
}
