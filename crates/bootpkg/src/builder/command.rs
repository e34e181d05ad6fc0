//! External command execution.
//!
//! Every tool the pipeline touches (git, svn, make, bash, curl) goes through a
//! [`CommandRunner`]. Commands carry their own working directory; nothing in
//! this crate changes the process-wide current directory.

use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// A single command invocation.
///
/// `args` is the program followed by its arguments. With `shell` set, the
/// arguments are joined and handed to `sh -c` instead.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub args: Vec<String>,
    pub shell: bool,
    pub dir: Option<PathBuf>,
    pub stream: bool,
}

impl CommandSpec {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// A shell command line (globs and redirections are interpreted).
    pub fn shell(line: impl Into<String>) -> Self {
        Self {
            args: vec![line.into()],
            shell: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Echo output live while still capturing it.
    #[must_use]
    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Program name, or the whole line for shell commands.
    pub fn program(&self) -> &str {
        self.args.first().map_or("", String::as_str)
    }

    /// Human-readable command line for logs and matching.
    pub fn line(&self) -> String {
        self.args.join(" ")
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line())
    }
}

/// Captured result of one command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    /// Exit code 0 is the only success signal.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Result for a command that could not be started at all.
    pub fn spawn_failure(reason: impl fmt::Display) -> Self {
        Self {
            stdout: String::new(),
            stderr: reason.to_string(),
            exit_code: -1,
        }
    }

    /// One-line failure description: exit code plus the last stderr line.
    pub fn describe(&self, what: &str) -> String {
        match self.stderr.lines().rev().find(|l| !l.trim().is_empty()) {
            Some(line) => format!("{what} exited with code {}: {}", self.exit_code, line.trim()),
            None => format!("{what} exited with code {}", self.exit_code),
        }
    }
}

/// Contract for running external commands.
pub trait CommandRunner {
    fn run(&self, cmd: &CommandSpec) -> CommandResult;

    /// Run commands in order. With `stop_on_failure`, the list halts after the
    /// first non-zero exit and later commands are never started.
    fn run_chain(&self, cmds: &[CommandSpec], stop_on_failure: bool) -> Vec<CommandResult> {
        let mut results = Vec::with_capacity(cmds.len());
        for cmd in cmds {
            let result = self.run(cmd);
            let failed = !result.success();
            results.push(result);
            if failed && stop_on_failure {
                break;
            }
        }
        results
    }
}

/// A chain succeeded only if every command that ran exited 0.
pub fn chain_succeeded(results: &[CommandResult]) -> bool {
    !results.is_empty() && results.iter().all(CommandResult::success)
}

/// Runs commands on the host with `std::process`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &CommandSpec) -> CommandResult {
        debug!(command = %cmd, dir = ?cmd.dir, "running");

        let Some(mut command) = to_command(cmd) else {
            return CommandResult::spawn_failure("empty command");
        };

        let result = if cmd.stream {
            run_streaming(&mut command)
        } else {
            run_captured(&mut command)
        };

        result.unwrap_or_else(|e| {
            warn!(program = cmd.program(), error = %e, "failed to start command");
            CommandResult::spawn_failure(format!("failed to run {}: {e}", cmd.program()))
        })
    }
}

fn to_command(cmd: &CommandSpec) -> Option<Command> {
    let mut command = if cmd.shell {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd.line());
        c
    } else {
        let (program, args) = cmd.args.split_first()?;
        let mut c = Command::new(program);
        c.args(args);
        c
    };

    if let Some(dir) = &cmd.dir {
        command.current_dir(dir);
    }
    command.stdin(Stdio::null());
    Some(command)
}

fn run_captured(command: &mut Command) -> io::Result<CommandResult> {
    let output = command.output()?;
    Ok(CommandResult {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code().unwrap_or(-1),
    })
}

fn run_streaming(command: &mut Command) -> io::Result<CommandResult> {
    let mut child = command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stderr = child.stderr.take();
    let stderr_reader = std::thread::spawn(move || tee(stderr, io::stderr()));
    let stdout = tee(child.stdout.take(), io::stdout());
    let stderr = stderr_reader.join().unwrap_or_default();
    let status = child.wait()?;

    Ok(CommandResult {
        stdout,
        stderr,
        exit_code: status.code().unwrap_or(-1),
    })
}

/// Copy `source` line by line into `sink`, returning everything read.
fn tee<R: Read, W: Write>(source: Option<R>, mut sink: W) -> String {
    let mut captured = String::new();
    let Some(source) = source else {
        return captured;
    };

    let mut reader = BufReader::new(source);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let _ = sink.write_all(&line);
                let _ = sink.flush();
                captured.push_str(&String::from_utf8_lossy(&line));
            }
        }
    }
    captured
}
