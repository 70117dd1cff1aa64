//! Subprocess runner: launches external package tools and reports raw output.

use std::process::Stdio;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::error::{OpError, RunError};
use crate::utils::is_root;

/// pkexec exits with 126 when the authentication dialog is dismissed and 127
/// when authorization could not be obtained.
const PKEXEC_DISMISSED: i32 = 126;
const PKEXEC_NOT_AUTHORIZED: i32 = 127;

/// A fully built command line for one external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub privileged: bool,
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            privileged: false,
            timeout: None,
        }
    }

    pub fn privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// The user dismissed the privilege prompt; the tool never ran.
    pub cancelled: bool,
}

#[cfg(test)]
impl ProcessOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
            cancelled: false,
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
            cancelled: false,
        }
    }
}

impl ProcessOutput {
    /// Returns stdout when the exit code is 0 or one of `extra_ok`, otherwise
    /// the tool's own error text.
    pub fn into_stdout(self, extra_ok: &[i32]) -> Result<String, OpError> {
        if self.cancelled {
            return Err(OpError::PrivilegeCancelled);
        }
        match self.exit_code {
            Some(0) => Ok(self.stdout),
            Some(code) if extra_ok.contains(&code) => Ok(self.stdout),
            code => {
                let output = if self.stderr.trim().is_empty() {
                    self.stdout.trim().to_string()
                } else {
                    self.stderr.trim().to_string()
                };
                Err(OpError::NonZeroExit { code, output })
            }
        }
    }
}

/// Seam between the backends and the operating system.
#[cfg_attr(test, mockall::automock)]
pub trait Executor: Send + Sync {
    fn execute(&self, invocation: Invocation) -> BoxFuture<'static, Result<ProcessOutput, RunError>>;
}

/// Runs invocations as tokio child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioExecutor;

impl Executor for TokioExecutor {
    fn execute(&self, invocation: Invocation) -> BoxFuture<'static, Result<ProcessOutput, RunError>> {
        Box::pin(run_invocation(invocation))
    }
}

async fn run_invocation(invocation: Invocation) -> Result<ProcessOutput, RunError> {
    if which::which(&invocation.program).is_err() {
        return Err(RunError::ToolNotFound(invocation.program));
    }

    let elevate = invocation.privileged && !is_root();
    let mut cmd = if elevate {
        if which::which("pkexec").is_err() {
            return Err(RunError::ToolNotFound("pkexec".to_string()));
        }
        let mut cmd = tokio::process::Command::new("pkexec");
        cmd.arg(&invocation.program);
        preserve_display_env(&mut cmd);
        cmd
    } else {
        tokio::process::Command::new(&invocation.program)
    };

    cmd.args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!(command = %invocation.command_line(), elevate, "spawning");

    let child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            RunError::ToolNotFound(invocation.program.clone())
        } else {
            RunError::Spawn {
                program: invocation.program.clone(),
                message: e.to_string(),
            }
        }
    })?;

    // Dropping the pending future on timeout drops the child, which kills it.
    let waited = match invocation.timeout {
        Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| {
                tracing::warn!(command = %invocation.command_line(), secs = limit.as_secs(), "timed out");
                RunError::Timeout {
                    program: invocation.program.clone(),
                    secs: limit.as_secs(),
                }
            })?,
        None => child.wait_with_output().await,
    };

    let output = waited.map_err(|e| RunError::Spawn {
        program: invocation.program.clone(),
        message: e.to_string(),
    })?;

    let exit_code = output.status.code();
    let cancelled = elevate && matches!(exit_code, Some(PKEXEC_DISMISSED) | Some(PKEXEC_NOT_AUTHORIZED));
    if cancelled {
        tracing::info!(command = %invocation.command_line(), "privilege prompt dismissed");
    }

    Ok(ProcessOutput {
        exit_code,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        cancelled,
    })
}

/// The polkit agent needs the caller's display to draw its password dialog.
fn preserve_display_env(cmd: &mut tokio::process::Command) {
    for key in ["DISPLAY", "XAUTHORITY", "WAYLAND_DISPLAY"] {
        if let Ok(value) = std::env::var(key) {
            cmd.env(key, value);
        }
    }
}
