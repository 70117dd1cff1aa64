//! OpenMandriva edition detection and the repository selector launcher.

use std::fmt;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use thiserror::Error;

use crate::runner::{Executor, Invocation};
use crate::utils::is_root;

pub const OS_RELEASE: &str = "/etc/os-release";

/// Release tools shipped under different names across OpenMandriva releases,
/// in order of preference.
const REPO_SELECTORS: [&str; 4] = ["om-release-switcher", "om-release-selector", "om-repoman", "om-repo-picker"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edition {
    Cooker,
    Rome,
    Rock,
}

impl Edition {
    const ALL: [Edition; 3] = [Edition::Cooker, Edition::Rome, Edition::Rock];

    fn key(&self) -> &'static str {
        match self {
            Edition::Cooker => "cooker",
            Edition::Rome => "rome",
            Edition::Rock => "rock",
        }
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Edition::Cooker => "Cooker",
            Edition::Rome => "ROME",
            Edition::Rock => "Rock",
        })
    }
}

/// Matches whole words only, so `google-chrome` is not ROME.
fn find_edition(text: &str) -> Option<Edition> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower.split(|c: char| !c.is_ascii_alphanumeric()).collect();
    Edition::ALL.into_iter().find(|edition| words.contains(&edition.key()))
}

/// Repo ids such as `openmandriva_rome_main_release` name the edition.
pub fn edition_from_repolist(output: &str) -> Option<Edition> {
    find_edition(output)
}

pub fn edition_from_os_release(content: &str) -> Option<Edition> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("VARIANT_ID="))
        .and_then(|value| find_edition(value.trim().trim_matches('"').trim_matches('\'')))
}

/// Asks `dnf repolist --enabled` first and falls back to `VARIANT_ID`.
pub async fn detect(executor: &dyn Executor, timeout: Duration, os_release: &Path) -> Option<Edition> {
    let invocation = Invocation::new("dnf", ["repolist", "--enabled"]).timeout(Some(timeout));
    match executor.execute(invocation).await {
        Ok(output) if output.exit_code == Some(0) => {
            if let Some(edition) = edition_from_repolist(&output.stdout) {
                tracing::info!(%edition, "edition detected from enabled repositories");
                return Some(edition);
            }
        }
        Ok(output) => tracing::debug!(code = ?output.exit_code, "dnf repolist failed"),
        Err(e) => tracing::debug!(error = %e, "dnf repolist unavailable"),
    }

    let content = tokio::fs::read_to_string(os_release).await.ok()?;
    let edition = edition_from_os_release(&content);
    tracing::debug!(?edition, "edition from os-release");
    edition
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepoSelectorError {
    #[error("Could not find the OpenMandriva repo selector. Install one of {}, e.g. pkexec dnf install -y om-release-switcher", REPO_SELECTORS.join(", "))]
    NotFound,
    #[error("failed to start {tool}: {message}")]
    Spawn { tool: &'static str, message: String },
}

pub fn find_repo_selector(installed: impl Fn(&str) -> bool) -> Option<&'static str> {
    REPO_SELECTORS.into_iter().find(|tool| installed(tool))
}

/// Opens the repository selector through pkexec, detached from FiNDy.
pub fn launch_repo_selector() -> Result<&'static str, RepoSelectorError> {
    let tool = find_repo_selector(|tool| which::which(tool).is_ok()).ok_or(RepoSelectorError::NotFound)?;
    let mut command = if is_root() {
        Command::new(tool)
    } else {
        let mut command = Command::new("pkexec");
        command.arg(tool);
        command
    };
    let child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn()
        .map_err(|e| RepoSelectorError::Spawn {
            tool,
            message: e.to_string(),
        })?;
    tracing::info!(tool, pid = child.id(), "repo selector launched");
    Ok(tool)
}
