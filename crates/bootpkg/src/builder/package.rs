//! Patch overlay, package assembly and artifact verification.

use crate::builder::command::{CommandRunner, CommandSpec};
use crate::builder::config::Layout;
use crate::builder::error::StageError;
use std::path::PathBuf;
use tracing::{info, warn};

/// Text the packaging script prints right before the package file name.
pub const PACKAGE_MARKER: &str = "Package name: ";

/// Overlay the SDK patch tree onto the SDK checkout.
pub fn install_patches(
    runner: &dyn CommandRunner,
    layout: &Layout,
    stream: bool,
) -> Result<(), StageError> {
    // Shell command so the glob expands.
    let cmd = CommandSpec::shell(format!(
        "cp -R \"{}\"/* \"{}\"",
        layout.patches().display(),
        layout.sdk.display()
    ))
    .current_dir(&layout.sdk)
    .stream(stream);

    let result = runner.run(&cmd);
    if !result.success() {
        return Err(StageError::Compile(result.describe("installing patches")));
    }
    Ok(())
}

/// Run the packaging script and return the package name it reported.
///
/// Output is always captured here since the name is parsed from it; with
/// `stream` it is also echoed live.
pub fn assemble(
    runner: &dyn CommandRunner,
    layout: &Layout,
    stream: bool,
) -> Result<Option<String>, StageError> {
    let cmd = CommandSpec::new(["bash".to_string(), layout.makepkg().to_string_lossy().into_owned()])
        .current_dir(&layout.bootloader)
        .stream(stream);

    let result = runner.run(&cmd);
    if !result.success() {
        return Err(StageError::Packaging(result.describe("makepkg")));
    }

    let name = parse_package_name(&result.stdout);
    match &name {
        Some(name) => info!(package = %name, "package assembled"),
        None => warn!("packaging output did not report a package name"),
    }
    Ok(name)
}

/// Text between [`PACKAGE_MARKER`] and the next line break, without colour
/// codes or carriage returns.
pub fn parse_package_name(output: &str) -> Option<String> {
    let plain = strip_ansi(output);
    let (_, rest) = plain.split_once(PACKAGE_MARKER)?;
    let line = rest.split('\n').next().unwrap_or_default();
    let name = strip_bare_sgr(line).replace('\r', "");
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Remove `ESC [ params final` sequences.
fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'[') {
            chars.next();
            for c in chars.by_ref() {
                if ('@'..='~').contains(&c) {
                    break;
                }
            }
        }
    }
    out
}

/// Leading `[39;49;00m`-style colour codes whose escape byte was lost.
fn strip_bare_sgr(mut text: &str) -> &str {
    while let Some(rest) = text.strip_prefix('[') {
        let params = rest
            .find(|c: char| !(c.is_ascii_digit() || c == ';'))
            .unwrap_or(rest.len());
        match rest[params..].strip_prefix('m') {
            Some(after) if params > 0 => text = after,
            _ => break,
        }
    }
    text
}

/// Check that the reported package exists in the output directory.
pub fn verify(layout: &Layout, name: Option<&str>) -> Result<PathBuf, StageError> {
    let Some(name) = name else {
        return Err(StageError::Packaging(
            "package name not found in packaging output".to_string(),
        ));
    };

    let artifact = layout.out_dir().join(name);
    if !artifact.exists() {
        return Err(StageError::Packaging(format!(
            "package {} was not produced",
            artifact.display()
        )));
    }
    Ok(artifact)
}
