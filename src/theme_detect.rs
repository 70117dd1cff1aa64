//! Picks a light or dark theme from the desktop environment's settings.

use std::path::PathBuf;
use std::process::Command;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeVariant {
    Light,
    Dark,
}

impl ThemeVariant {
    pub fn toggled(self) -> Self {
        match self {
            ThemeVariant::Light => ThemeVariant::Dark,
            ThemeVariant::Dark => ThemeVariant::Light,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeVariant::Light => "light",
            ThemeVariant::Dark => "dark",
        }
    }
}

/// User override stored in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    #[default]
    Auto,
    Light,
    Dark,
}

#[derive(Debug, Error)]
pub enum ThemeSourceError {
    #[error("{0} is not available")]
    Unavailable(&'static str),
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Command(String),
}

/// One place a desktop environment records its light/dark preference.
/// `Ok(None)` means the source was readable but expressed no preference.
pub trait ThemeSource {
    fn name(&self) -> &'static str;
    fn read(&self) -> Result<Option<ThemeVariant>, ThemeSourceError>;
}

pub const FALLBACK: ThemeVariant = ThemeVariant::Dark;

/// Resolves the theme: an explicit preference wins, then the default
/// sources in priority order, then [`FALLBACK`].
pub fn resolve(preference: ThemePreference) -> ThemeVariant {
    match preference {
        ThemePreference::Light => ThemeVariant::Light,
        ThemePreference::Dark => ThemeVariant::Dark,
        ThemePreference::Auto => {
            let kde = KdeGlobals::default_location();
            let sources: [&dyn ThemeSource; 2] = [&GnomeColorScheme, &kde];
            detect(&sources)
        }
    }
}

/// Tries each source in order; failures fall through to the next one.
pub fn detect(sources: &[&dyn ThemeSource]) -> ThemeVariant {
    for source in sources {
        match source.read() {
            Ok(Some(variant)) => {
                tracing::info!(source = source.name(), theme = variant.as_str(), "theme detected");
                return variant;
            }
            Ok(None) => tracing::debug!(source = source.name(), "no theme preference"),
            Err(e) => tracing::debug!(source = source.name(), error = %e, "theme source unreadable"),
        }
    }
    tracing::info!(theme = FALLBACK.as_str(), "using fallback theme");
    FALLBACK
}

/// GNOME's `org.gnome.desktop.interface color-scheme` key.
pub struct GnomeColorScheme;

impl ThemeSource for GnomeColorScheme {
    fn name(&self) -> &'static str {
        "gsettings"
    }

    fn read(&self) -> Result<Option<ThemeVariant>, ThemeSourceError> {
        if which::which("gsettings").is_err() {
            return Err(ThemeSourceError::Unavailable("gsettings"));
        }
        let output = Command::new("gsettings")
            .args(["get", "org.gnome.desktop.interface", "color-scheme"])
            .output()
            .map_err(|e| ThemeSourceError::Command(e.to_string()))?;
        if !output.status.success() {
            return Err(ThemeSourceError::Command(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(parse_color_scheme(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// `'prefer-dark'` → dark, `'prefer-light'` → light, `'default'` → no opinion.
pub fn parse_color_scheme(value: &str) -> Option<ThemeVariant> {
    match value.trim().trim_matches('\'') {
        "prefer-dark" => Some(ThemeVariant::Dark),
        "prefer-light" => Some(ThemeVariant::Light),
        _ => None,
    }
}

/// KDE Plasma's `kdeglobals` file.
pub struct KdeGlobals {
    path: Option<PathBuf>,
}

impl KdeGlobals {
    #[cfg(test)]
    pub fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    pub fn default_location() -> Self {
        Self {
            path: dirs::config_dir().map(|dir| dir.join("kdeglobals")),
        }
    }
}

impl ThemeSource for KdeGlobals {
    fn name(&self) -> &'static str {
        "kdeglobals"
    }

    fn read(&self) -> Result<Option<ThemeVariant>, ThemeSourceError> {
        let path = self.path.as_ref().ok_or(ThemeSourceError::Unavailable("config directory"))?;
        let content = std::fs::read_to_string(path).map_err(|source| ThemeSourceError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(parse_kdeglobals(&content))
    }
}

/// Uses `[General] ColorScheme` when present, otherwise the window
/// background colour's luminance.
pub fn parse_kdeglobals(content: &str) -> Option<ThemeVariant> {
    let mut section = "";
    let mut scheme: Option<&str> = None;
    let mut background: Option<&str> = None;

    for line in content.lines().map(str::trim) {
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = name;
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match (section, key.trim()) {
            ("General", "ColorScheme") => scheme = Some(value.trim()),
            ("Colors:Window", "BackgroundNormal") => background = Some(value.trim()),
            _ => {}
        }
    }

    if let Some(scheme) = scheme.filter(|s| !s.is_empty()) {
        return Some(if scheme.to_lowercase().contains("dark") {
            ThemeVariant::Dark
        } else {
            ThemeVariant::Light
        });
    }

    let channels: Vec<f32> = background?
        .split(',')
        .filter_map(|c| c.trim().parse::<f32>().ok())
        .collect();
    if channels.len() < 3 {
        return None;
    }
    let luminance = 0.2126 * channels[0] + 0.7152 * channels[1] + 0.0722 * channels[2];
    Some(if luminance < 128.0 {
        ThemeVariant::Dark
    } else {
        ThemeVariant::Light
    })
}
