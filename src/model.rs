use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The three package ecosystems FiNDy manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    System,
    Sandboxed,
    Portable,
}

impl Ecosystem {
    pub const ALL: [Ecosystem; 3] = [Ecosystem::System, Ecosystem::Sandboxed, Ecosystem::Portable];

    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::System => "system",
            Ecosystem::Sandboxed => "flatpak",
            Ecosystem::Portable => "appimage",
        }
    }

    /// Label used for tabs and notices.
    pub fn label(&self) -> &'static str {
        match self {
            Ecosystem::System => "DNF Packages",
            Ecosystem::Sandboxed => "Flatpak Apps",
            Ecosystem::Portable => "AppImages",
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Search,
    Install,
    Remove,
    Update,
    List,
    ListUpdates,
    Info,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Search => "search",
            Action::Install => "install",
            Action::Remove => "remove",
            Action::Update => "update",
            Action::List => "list",
            Action::ListUpdates => "list-updates",
            Action::Info => "info",
        }
    }

    /// Install, remove and update change the system; everything else only reads.
    pub fn is_mutation(&self) -> bool {
        matches!(self, Action::Install | Action::Remove | Action::Update)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Narrows a search to installed or available packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchFilter {
    #[default]
    All,
    Installed,
    Available,
}

impl SearchFilter {
    pub const ALL: [SearchFilter; 3] = [SearchFilter::All, SearchFilter::Installed, SearchFilter::Available];
}

impl fmt::Display for SearchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SearchFilter::All => "All Packages",
            SearchFilter::Installed => "Installed Only",
            SearchFilter::Available => "Available Only",
        })
    }
}

/// One package as reported by an ecosystem's list or search output.
///
/// `(ecosystem, name)` identifies a record. `name` is always the value the
/// ecosystem's tool accepts as an install/remove target: the dnf package
/// name, the flatpak application ID, or the AppImage file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub ecosystem: Ecosystem,
    pub name: String,
    pub version: Option<String>,
    pub installed: bool,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub origin: Option<String>,
}

impl PackageRecord {
    pub fn new(ecosystem: Ecosystem, name: impl Into<String>, installed: bool) -> Self {
        Self {
            ecosystem,
            name: name.into(),
            version: None,
            installed,
            display_name: None,
            description: None,
            origin: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        let version = version.into();
        self.version = (!version.is_empty()).then_some(version);
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        self.display_name = (!display_name.is_empty()).then_some(display_name);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = (!description.is_empty()).then_some(description);
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        let origin = origin.into();
        self.origin = (!origin.is_empty()).then_some(origin);
        self
    }

    pub fn title(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// A single user-triggered request against one ecosystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRequest {
    pub ecosystem: Ecosystem,
    pub action: Action,
    pub target: String,
    pub requires_privilege: bool,
    pub filter: SearchFilter,
}

impl OperationRequest {
    pub fn new(ecosystem: Ecosystem, action: Action, target: impl Into<String>) -> Self {
        Self {
            ecosystem,
            action,
            target: target.into(),
            requires_privilege: ecosystem == Ecosystem::System && action.is_mutation(),
            filter: SearchFilter::All,
        }
    }

    pub fn list(ecosystem: Ecosystem) -> Self {
        Self::new(ecosystem, Action::List, "")
    }

    pub fn list_updates(ecosystem: Ecosystem) -> Self {
        Self::new(ecosystem, Action::ListUpdates, "")
    }

    pub fn search(ecosystem: Ecosystem, query: impl Into<String>, filter: SearchFilter) -> Self {
        Self {
            filter,
            ..Self::new(ecosystem, Action::Search, query)
        }
    }

    /// Mutations may legitimately run long; queries get a bounded timeout.
    pub fn timeout(&self, query_timeout: Duration) -> Option<Duration> {
        (!self.action.is_mutation()).then_some(query_timeout)
    }
}

/// What a backend hands back for a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Records(Vec<PackageRecord>),
    Completed(String),
    Details(String),
}
