//! External command execution.
//!
//! All subprocesses (git, pip, mono probes) are spawned through the
//! [`CommandRunner`] trait so that the pipeline can be driven against a
//! scripted host in tests. Calls block until the child exits; there is no
//! timeout.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::HostError;
use crate::platform::find_executable;
use crate::Result;

/// A single external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name, resolved through PATH.
    pub program: String,

    /// Arguments passed verbatim.
    pub args: Vec<String>,

    /// Working directory for the child; `None` inherits ours.
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
        }
    }

    /// Run the command inside `dir` without touching the process working directory.
    pub fn in_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    /// Whether this invocation is `program` followed by the given leading args.
    pub fn matches(&self, program: &str, leading_args: &[&str]) -> bool {
        self.program == program
            && self.args.len() >= leading_args.len()
            && self
                .args
                .iter()
                .zip(leading_args)
                .all(|(actual, expected)| actual == expected)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal.
    pub exit_code: Option<i32>,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Human-readable exit status.
    pub fn status_text(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exit code {}", code),
            None => "termination by signal".to_string(),
        }
    }

    /// stdout and stderr joined, for tools that print banners to either stream.
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }

    /// Turn a non-zero exit into [`HostError::CommandFailed`].
    pub fn into_success(self, spec: &CommandSpec) -> Result<CommandOutput> {
        if self.success() {
            Ok(self)
        } else {
            Err(HostError::CommandFailed {
                command: spec.to_string(),
                status: self.status_text(),
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Seam for every interaction with host executables.
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion and capture its output.
    ///
    /// A missing executable is reported as [`HostError::NotFound`]; a non-zero
    /// exit is *not* an error at this level.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Look an executable up on PATH without running it.
    fn locate(&self, program: &str) -> Option<PathBuf>;

    /// Run and require a zero exit status.
    fn run_checked(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.run(spec)?.into_success(spec)
    }
}

/// [`CommandRunner`] backed by `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        SystemRunner
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        debug!(command = %spec, cwd = ?spec.cwd, "Running external command");

        let mut command = Command::new(&spec.program);
        command.args(&spec.args);
        if let Some(dir) = &spec.cwd {
            command.current_dir(dir);
        }

        let output = command.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                HostError::NotFound {
                    program: spec.program.clone(),
                }
            } else {
                HostError::Spawn {
                    program: spec.program.clone(),
                    source: e,
                }
            }
        })?;

        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };
        debug!(command = %spec, status = %result.status_text(), "External command finished");
        Ok(result)
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        let path = std::env::var_os("PATH")?;
        find_executable(program, &path)
    }
}
