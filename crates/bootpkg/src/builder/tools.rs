//! Auxiliary host tools the bootloader build needs (gettext, mtoc, nasm).
//!
//! The installed binary is the cache marker: if it exists the tool is not
//! rebuilt. There is no freshness check.

use crate::builder::command::{CommandRunner, CommandSpec};
use crate::builder::config::Layout;
use crate::builder::error::StageError;
use std::path::PathBuf;
use tracing::info;

/// A tool built by one of the bootloader tree's helper scripts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuxTool {
    pub name: &'static str,
    /// Script in the bootloader tree, run with bash.
    pub script: &'static str,
    /// Installed file under `<root>/opt/local/bin`.
    pub artifact: &'static str,
}

impl AuxTool {
    pub fn artifact_path(&self, layout: &Layout) -> PathBuf {
        layout.tools_bin().join(self.artifact)
    }

    pub fn is_cached(&self, layout: &Layout) -> bool {
        self.artifact_path(layout).exists()
    }
}

/// Order does not matter; all must exist before the main build.
pub const AUX_TOOLS: &[AuxTool] = &[
    AuxTool {
        name: "gettext",
        script: "buildgettext.sh",
        artifact: "gettext",
    },
    AuxTool {
        name: "mtoc",
        script: "buildmtoc.sh",
        artifact: "mtoc.NEW",
    },
    AuxTool {
        name: "nasm",
        script: "buildnasm.sh",
        artifact: "nasm",
    },
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolStatus {
    Cached,
    Built,
}

/// Build `tool` unless its artifact already exists.
pub fn ensure_built(
    runner: &dyn CommandRunner,
    tool: &AuxTool,
    layout: &Layout,
    stream: bool,
) -> Result<ToolStatus, StageError> {
    if tool.is_cached(layout) {
        info!(tool = tool.name, "already built, skipping");
        return Ok(ToolStatus::Cached);
    }

    info!(tool = tool.name, "building");
    let result = runner.run(
        &CommandSpec::new(["bash", tool.script])
            .current_dir(&layout.bootloader)
            .stream(stream),
    );
    if !result.success() {
        return Err(StageError::Compile(
            result.describe(&format!("building {}", tool.name)),
        ));
    }
    Ok(ToolStatus::Built)
}

/// Ensure every auxiliary tool, stopping at the first failure.
pub fn ensure_all(
    runner: &dyn CommandRunner,
    layout: &Layout,
    stream: bool,
) -> Result<Vec<(&'static str, ToolStatus)>, StageError> {
    AUX_TOOLS
        .iter()
        .map(|tool| ensure_built(runner, tool, layout, stream).map(|status| (tool.name, status)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_names() {
        let names: Vec<_> = AUX_TOOLS.iter().map(|t| t.name).collect();
        assert_eq!(names, ["gettext", "mtoc", "nasm"]);
    }

    #[test]
    fn test_artifact_paths() {
        let layout = Layout {
            root: PathBuf::from("/work"),
            sdk: PathBuf::from("/work/UDK2018"),
            bootloader: PathBuf::from("/work/UDK2018/Clover"),
        };
        assert_eq!(
            AUX_TOOLS[1].artifact_path(&layout),
            PathBuf::from("/work/opt/local/bin/mtoc.NEW")
        );
    }
}
