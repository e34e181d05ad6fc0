//! Scripted command runner shared by the integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use bootpkg::{BuildConfig, CommandResult, CommandRunner, CommandSpec};
use std::cell::RefCell;
use std::path::Path;

/// Records every command; commands succeed with empty output unless a rule
/// matches the start of their command line.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Vec<(String, CommandResult)>,
    history: RefCell<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands starting with `prefix` exit with `code`.
    pub fn fail(mut self, prefix: impl Into<String>, code: i32) -> Self {
        self.rules.push((
            prefix.into(),
            CommandResult {
                stdout: String::new(),
                stderr: "scripted failure\n".to_string(),
                exit_code: code,
            },
        ));
        self
    }

    /// Commands starting with `prefix` succeed and print `stdout`.
    pub fn respond(mut self, prefix: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.rules.push((
            prefix.into(),
            CommandResult {
                stdout: stdout.into(),
                ..CommandResult::default()
            },
        ));
        self
    }

    pub fn lines(&self) -> Vec<String> {
        self.history.borrow().iter().map(CommandSpec::line).collect()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.lines().iter().filter(|l| l.starts_with(prefix)).count()
    }

    pub fn ran(&self, prefix: &str) -> bool {
        self.count(prefix) > 0
    }

    pub fn find(&self, prefix: &str) -> Option<CommandSpec> {
        self.history
            .borrow()
            .iter()
            .find(|c| c.line().starts_with(prefix))
            .cloned()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, cmd: &CommandSpec) -> CommandResult {
        self.history.borrow_mut().push(cmd.clone());
        let line = cmd.line();
        self.rules
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_default()
    }
}

/// Default configuration rooted at `root`.
pub fn config_at(root: &Path) -> BuildConfig {
    BuildConfig {
        root: root.to_path_buf(),
        ..BuildConfig::default()
    }
}

pub fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, b"").unwrap();
}
