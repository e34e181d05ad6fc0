//! Checked-out revision lookup and revision pinning.

use crate::builder::command::{CommandRunner, CommandSpec};
use crate::builder::vcs::{RepoSource, VcsKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Label preceding the revision number in `svn info` output (matched case-insensitively).
const SVN_REVISION_LABEL: &str = "revision: ";

/// Which revision the bootloader tree is synchronized to.
///
/// Serialized as `"latest"`, `"current"`, or the revision itself.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RevisionPin {
    /// Always update to the newest revision.
    #[default]
    Latest,
    /// Stay on whatever revision is checked out now.
    Current,
    /// A fixed revision.
    Fixed(String),
}

impl From<String> for RevisionPin {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" | "latest" | "head" => RevisionPin::Latest,
            "current" => RevisionPin::Current,
            _ => RevisionPin::Fixed(trimmed.to_string()),
        }
    }
}

impl From<RevisionPin> for String {
    fn from(pin: RevisionPin) -> Self {
        pin.to_string()
    }
}

impl fmt::Display for RevisionPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevisionPin::Latest => f.write_str("latest"),
            RevisionPin::Current => f.write_str("current"),
            RevisionPin::Fixed(rev) => f.write_str(rev),
        }
    }
}

/// Revision currently checked out in `source`, if it can be determined.
///
/// `None` means "cannot pin", never an error: the tree may be missing,
/// unreadable, or the query output may lack a revision.
pub fn current_revision(runner: &dyn CommandRunner, source: &RepoSource) -> Option<String> {
    if !source.is_checked_out() {
        return None;
    }

    let cmd = match source.kind {
        VcsKind::Svn => CommandSpec::new(["svn", "info"]),
        VcsKind::Git => CommandSpec::new(["git", "rev-parse", "--short", "HEAD"]),
    }
    .current_dir(&source.local_path);

    let result = runner.run(&cmd);
    if !result.success() {
        debug!(source = %source.name, "{}", result.describe(&cmd.line()));
        return None;
    }

    match source.kind {
        VcsKind::Svn => parse_svn_revision(&result.stdout),
        VcsKind::Git => first_line(&result.stdout),
    }
}

/// Extract the value after the revision label, up to the next line break.
pub fn parse_svn_revision(info: &str) -> Option<String> {
    let lower = info.to_lowercase();
    let (_, rest) = lower.split_once(SVN_REVISION_LABEL)?;
    first_line(rest)
}

fn first_line(text: &str) -> Option<String> {
    let line = text.split('\n').next().unwrap_or_default().trim();
    (!line.is_empty()).then(|| line.to_string())
}

/// Turn a pin into the revision to sync to (`None` = latest).
pub fn resolve_pin(
    runner: &dyn CommandRunner,
    source: &RepoSource,
    pin: &RevisionPin,
) -> Option<String> {
    match pin {
        RevisionPin::Latest => None,
        RevisionPin::Fixed(rev) => Some(rev.clone()),
        RevisionPin::Current => {
            let rev = current_revision(runner, source);
            if rev.is_none() {
                warn!(source = %source.name, "no revision located, syncing to latest");
            }
            rev
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SVN_INFO: &str = "Path: .\n\
        Working Copy Root Path: /src/UDK2018/Clover\n\
        URL: https://svn.code.sf.net/p/cloverefiboot/code\n\
        Repository Root: https://svn.code.sf.net/p/cloverefiboot/code\n\
        Revision: 4920\n\
        Node Kind: directory\n\
        Last Changed Rev: 4919\n";

    #[test]
    fn test_parse_svn_revision() {
        assert_eq!(parse_svn_revision(SVN_INFO), Some("4920".to_string()));
    }

    #[test]
    fn test_parse_svn_revision_case_insensitive_and_crlf() {
        assert_eq!(
            parse_svn_revision("REVISION: 123\r\nfoo"),
            Some("123".to_string())
        );
    }

    #[test]
    fn test_parse_svn_revision_absent() {
        assert_eq!(parse_svn_revision("svn: E155007: not a working copy"), None);
        assert_eq!(parse_svn_revision("Revision: \n"), None);
        assert_eq!(parse_svn_revision(""), None);
    }

    #[test]
    fn test_pin_from_string() {
        assert_eq!(RevisionPin::from(String::new()), RevisionPin::Latest);
        assert_eq!(RevisionPin::from("HEAD".to_string()), RevisionPin::Latest);
        assert_eq!(RevisionPin::from("Current".to_string()), RevisionPin::Current);
        assert_eq!(
            RevisionPin::from(" 4920 ".to_string()),
            RevisionPin::Fixed("4920".to_string())
        );
    }

    #[test]
    fn test_pin_serde() {
        let pin: RevisionPin = serde_json::from_str("\"4920\"").unwrap();
        assert_eq!(pin, RevisionPin::Fixed("4920".to_string()));
        assert_eq!(serde_json::to_string(&RevisionPin::Current).unwrap(), "\"current\"");
    }
}
