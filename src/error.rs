use std::path::PathBuf;

use thiserror::Error;

use crate::model::{Action, Ecosystem};

/// Failure of the subprocess runner itself, before any output is interpreted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunError {
    #[error("{0} is not installed")]
    ToolNotFound(String),
    #[error("{program} did not finish within {secs}s")]
    Timeout { program: String, secs: u64 },
    #[error("failed to run {program}: {message}")]
    Spawn { program: String, message: String },
}

/// Failure of a single requested operation. None of these are fatal to the
/// application; each is scoped to the operation that produced it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OpError {
    #[error("Cannot {action} {ecosystem} packages: {tool} was not found")]
    ToolNotFound {
        tool: String,
        ecosystem: Ecosystem,
        action: Action,
    },
    /// Carries the tool's own error text unchanged.
    #[error("{output}")]
    NonZeroExit { code: Option<i32>, output: String },
    #[error("Operation cancelled")]
    PrivilegeCancelled,
    #[error("Cannot {action} {ecosystem} packages: permission denied for {}", path.display())]
    PermissionDenied {
        path: PathBuf,
        ecosystem: Ecosystem,
        action: Action,
    },
    #[error("{action} of {ecosystem} packages timed out after {secs}s")]
    Timeout {
        ecosystem: Ecosystem,
        action: Action,
        secs: u64,
    },
    #[error("{}: {message}", path.display())]
    Filesystem { path: PathBuf, message: String },
    #[error("{action} is not supported for {ecosystem} packages")]
    Unsupported { ecosystem: Ecosystem, action: Action },
    #[error("Select a {ecosystem} package to {action} first")]
    MissingTarget { ecosystem: Ecosystem, action: Action },
    #[error("{0}")]
    Spawn(String),
}

impl OpError {
    pub fn from_run(error: RunError, ecosystem: Ecosystem, action: Action) -> Self {
        match error {
            RunError::ToolNotFound(tool) => OpError::ToolNotFound { tool, ecosystem, action },
            RunError::Timeout { secs, .. } => OpError::Timeout { ecosystem, action, secs },
            RunError::Spawn { .. } => OpError::Spawn(error.to_string()),
        }
    }

    pub fn from_io(error: &std::io::Error, path: impl Into<PathBuf>, ecosystem: Ecosystem, action: Action) -> Self {
        let path = path.into();
        if error.kind() == std::io::ErrorKind::PermissionDenied {
            OpError::PermissionDenied { path, ecosystem, action }
        } else {
            OpError::Filesystem {
                path,
                message: error.to_string(),
            }
        }
    }

    /// Cancelled prompts are reported as a neutral notice, not an error.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, OpError::PrivilegeCancelled)
    }
}

/// A panel refused a request because another one is still running on it.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("{ecosystem} is busy with {running}; try again when it finishes")]
pub struct PanelBusy {
    pub ecosystem: Ecosystem,
    pub running: Action,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_not_found_names_action_and_ecosystem() {
        let error = OpError::from_run(RunError::ToolNotFound("dnf".into()), Ecosystem::System, Action::Install);
        assert_eq!(error.to_string(), "Cannot install system packages: dnf was not found");
    }

    #[test]
    fn nonzero_exit_keeps_tool_text_verbatim() {
        let error = OpError::NonZeroExit {
            code: Some(1),
            output: "Error: Unable to find a match: nosuchpkg".into(),
        };
        assert_eq!(error.to_string(), "Error: Unable to find a match: nosuchpkg");
        assert!(!error.is_cancellation());
        assert!(OpError::PrivilegeCancelled.is_cancellation());
    }

    #[test]
    fn permission_denied_io_maps_to_dedicated_variant() {
        let io = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        let error = OpError::from_io(&io, "/opt/apps", Ecosystem::Portable, Action::Install);
        assert!(matches!(error, OpError::PermissionDenied { .. }));
        assert!(error.to_string().contains("install appimage"));
    }
}
