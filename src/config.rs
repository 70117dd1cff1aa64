use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::theme_detect::ThemePreference;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub theme: ThemePreference,
    /// Zero disables the periodic update check.
    pub update_check_interval_secs: u64,
    pub query_timeout_secs: u64,
    pub flatpak_remote: String,
    pub dnf_update_verb: String,
    pub appimage_dir: Option<PathBuf>,
    /// Hand AppImages to Gear Lever when its flatpak is installed.
    pub gear_lever: bool,
    pub parsers: ParserConfig,
}

/// Column layouts of the external tools' output. These drift between tool
/// versions, so they live in the config file rather than in the parsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub flatpak_columns: Vec<String>,
    pub dnf_header_prefixes: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            flatpak_columns: ["application", "name", "version", "branch", "description"]
                .into_iter()
                .map(String::from)
                .collect(),
            dnf_header_prefixes: [
                "Installed",
                "Available",
                "Last metadata",
                "Obsoleting",
                "Upgrade",
                "Extra",
                "Security",
                "Updating and loading",
                "Repositories loaded",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: ThemePreference::Auto,
            update_check_interval_secs: 3600,
            query_timeout_secs: 60,
            flatpak_remote: "flathub".to_string(),
            dnf_update_verb: "upgrade".to_string(),
            appimage_dir: None,
            gear_lever: true,
            parsers: ParserConfig::default(),
        }
    }
}

impl Config {
    /// Loads the config file, writing defaults on first run. A file that no
    /// longer parses is left alone and defaults are used instead.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            match serde_json::from_str(&content) {
                Ok(config) => Ok(config),
                Err(e) => {
                    tracing::warn!(path = %config_path.display(), error = %e, "invalid config, using defaults");
                    Ok(Config::default())
                }
            }
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, content)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let base = dirs::config_dir().context("no configuration directory for this user")?;
        Ok(base.join("findy").join("config.json"))
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs.max(1))
    }

    pub fn update_interval(&self) -> Option<Duration> {
        (self.update_check_interval_secs > 0).then(|| Duration::from_secs(self.update_check_interval_secs))
    }

    /// `~/AppImages` when it exists, otherwise the per-user applications
    /// subdirectory.
    pub fn appimage_dir(&self) -> PathBuf {
        if let Some(dir) = &self.appimage_dir {
            return dir.clone();
        }
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let preferred = home.join("AppImages");
        if preferred.is_dir() {
            preferred
        } else {
            applications_dir().join("appimages")
        }
    }
}

/// Per-user application-menu directory for launcher entries.
pub fn applications_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("applications")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_missing_fields_with_defaults() {
        let config: Config = serde_json::from_str(r#"{"theme":"light","query_timeout_secs":5}"#).unwrap();
        assert_eq!(config.theme, ThemePreference::Light);
        assert_eq!(config.query_timeout(), Duration::from_secs(5));
        assert_eq!(config.flatpak_remote, "flathub");
        assert_eq!(config.parsers.flatpak_columns[0], "application");
        assert!(config.gear_lever);
    }

    #[test]
    fn zero_interval_disables_update_checks() {
        let config = Config {
            update_check_interval_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.update_interval(), None);
        assert_eq!(Config::default().update_interval(), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn explicit_appimage_dir_wins() {
        let config = Config {
            appimage_dir: Some(PathBuf::from("/srv/bundles")),
            ..Config::default()
        };
        assert_eq!(config.appimage_dir(), PathBuf::from("/srv/bundles"));
    }
}
