//! Host checks for the programs the pipeline shells out to.
//!
//! Diagnostics only: the pipeline never consults this.

use anyhow::{bail, Result};
use std::env::consts::{ARCH, OS};

/// Programs some stage invokes directly.
pub const HOST_TOOLS: &[&str] = &["git", "svn", "make", "bash", "sh", "curl", "cp", "chmod"];

/// Host tools not found on `PATH`.
pub fn missing_tools() -> Vec<&'static str> {
    HOST_TOOLS
        .iter()
        .copied()
        .filter(|tool| which::which(tool).is_err())
        .collect()
}

pub fn run() -> Result<()> {
    eprintln!("Host: {OS} ({ARCH})");
    if OS != "macos" {
        eprintln!("[WARN] packaging scripts expect macOS; other hosts can sync but not package");
    }

    let missing = missing_tools();
    for tool in HOST_TOOLS {
        if missing.contains(tool) {
            eprintln!("[FAIL] missing `{tool}` in PATH");
        } else {
            eprintln!("[OK] {tool}");
        }
    }

    if !missing.is_empty() {
        bail!("doctor checks failed: {} not found", missing.join(", "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tools_is_subset() {
        for tool in missing_tools() {
            assert!(HOST_TOOLS.contains(&tool));
        }
    }

    #[test]
    fn test_checks_shell_used_for_patches() {
        assert!(HOST_TOOLS.contains(&"sh"));
        assert!(HOST_TOOLS.contains(&"curl"));
    }
}
