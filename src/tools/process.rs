//! Shell command execution capability used by `run_shell`.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::tools::BoxFuture;
use crate::{AppError, Result};

/// Captured outcome of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    /// Full standard output, lossily decoded.
    pub stdout: String,
    /// Full standard error, lossily decoded.
    pub stderr: String,
}

impl ProcessOutput {
    /// Whether the process exited with code zero.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs a command line to completion.
///
/// A non-zero exit is reported through [`ProcessOutput::code`], not as an
/// error.
pub trait ProcessRunner: Send + Sync {
    /// Run `command` in `cwd` and capture its output.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] when the process cannot be spawned or its
    /// output cannot be collected.
    fn run<'a>(&'a self, command: &'a str, cwd: &'a Path) -> BoxFuture<'a, Result<ProcessOutput>>;
}

/// [`ProcessRunner`] that hands the command line to the platform shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl ProcessRunner for ShellRunner {
    fn run<'a>(&'a self, command: &'a str, cwd: &'a Path) -> BoxFuture<'a, Result<ProcessOutput>> {
        Box::pin(async move {
            debug!(command, cwd = %cwd.display(), "spawning shell command");
            let output = shell_command(command)
                .current_dir(cwd)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|err| AppError::Io(format!("failed to spawn `{command}`: {err}")))?;

            Ok(ProcessOutput {
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        })
    }
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd.exe");
    cmd.arg("/c").arg(command);
    cmd
}

#[cfg(not(windows))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c").arg(command);
    cmd
}
