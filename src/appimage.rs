//! Portable AppImage bundles kept in one directory, each with a launcher
//! entry in the user's application menu. When the Gear Lever flatpak is
//! installed it does the desktop integration, removal and updates instead.

use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Local};
use futures::future::BoxFuture;
use regex::Regex;
use tokio::fs;
use tokio::sync::OnceCell;

use crate::backend::{require_target, run_tool, success_message, Backend};
use crate::config::{applications_dir, Config};
use crate::error::OpError;
use crate::model::{Action, Ecosystem, OperationRequest, Outcome, PackageRecord};
use crate::runner::{Executor, Invocation};

const EXTENSION: &str = ".appimage";
const BUNDLE_MODE: u32 = 0o755;
const FLATPAK: &str = "flatpak";
const GEAR_LEVER_APP: &str = "it.mijorus.gearlever";

#[derive(Debug, Clone)]
pub struct AppImageBackend {
    dir: PathBuf,
    applications_dir: PathBuf,
    gear_lever: Option<GearLever>,
}

/// Gear Lever, driven through `flatpak run`. Whether it is installed is
/// asked once and shared by every clone of the backend.
#[derive(Clone)]
struct GearLever {
    executor: Arc<dyn Executor>,
    detection_timeout: Duration,
    detected: Arc<OnceCell<bool>>,
}

impl std::fmt::Debug for GearLever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GearLever")
            .field("detected", &self.detected.get())
            .finish_non_exhaustive()
    }
}

impl GearLever {
    async fn is_available(&self) -> bool {
        *self
            .detected
            .get_or_init(|| async move {
                let invocation =
                    Invocation::new(FLATPAK, ["info", GEAR_LEVER_APP]).timeout(Some(self.detection_timeout));
                let available = matches!(
                    self.executor.execute(invocation).await,
                    Ok(output) if output.exit_code == Some(0)
                );
                tracing::info!(available, "gear lever detection");
                available
            })
            .await
    }

    async fn run(&self, request: &OperationRequest, args: Vec<String>) -> Result<String, OpError> {
        let mut all = vec!["run".to_string(), GEAR_LEVER_APP.to_string()];
        all.extend(args);
        run_tool(self.executor.as_ref(), Invocation::new(FLATPAK, all), request, &[]).await
    }
}

/// Name and comment of a launcher entry.
#[derive(Debug, Default, PartialEq, Eq)]
struct LauncherInfo {
    name: Option<String>,
    comment: Option<String>,
}

impl AppImageBackend {
    pub fn new(dir: PathBuf, applications_dir: PathBuf) -> Self {
        Self {
            dir,
            applications_dir,
            gear_lever: None,
        }
    }

    pub fn from_config(config: &Config, executor: Arc<dyn Executor>) -> Self {
        let backend = Self::new(config.appimage_dir(), applications_dir());
        if config.gear_lever {
            backend.with_gear_lever(executor, config.query_timeout())
        } else {
            backend
        }
    }

    /// Uses Gear Lever whenever `flatpak info it.mijorus.gearlever` succeeds.
    pub fn with_gear_lever(mut self, executor: Arc<dyn Executor>, detection_timeout: Duration) -> Self {
        self.gear_lever = Some(GearLever {
            executor,
            detection_timeout,
            detected: Arc::new(OnceCell::new()),
        });
        self
    }

    async fn gear_lever(&self) -> Option<&GearLever> {
        let gear_lever = self.gear_lever.as_ref()?;
        gear_lever.is_available().await.then_some(gear_lever)
    }

    fn launcher_path(&self, file_name: &str) -> PathBuf {
        self.applications_dir.join(format!("{}.desktop", stem(file_name)))
    }

    /// Our menu entry first, then the entries Gear Lever and other tools
    /// leave next to the bundle.
    fn launcher_candidates(&self, file_name: &str) -> [PathBuf; 3] {
        [
            self.launcher_path(file_name),
            self.dir.join(format!("{file_name}.desktop")),
            self.dir.join(format!("{}.desktop", stem(file_name))),
        ]
    }

    /// Resolves a remove/info target, which must be a bundle file name inside
    /// the AppImage directory.
    fn bundle_path(&self, request: &OperationRequest) -> Result<(String, PathBuf), OpError> {
        let file_name = require_target(request)?;
        if file_name.contains('/') || !is_bundle(file_name) {
            return Err(OpError::Filesystem {
                path: PathBuf::from(file_name),
                message: format!("not an AppImage in {}", self.dir.display()),
            });
        }
        Ok((file_name.to_string(), self.dir.join(file_name)))
    }

    fn io_error(&self, error: &std::io::Error, path: &Path, request: &OperationRequest) -> OpError {
        OpError::from_io(error, path, request.ecosystem, request.action)
    }

    async fn list(&self, request: &OperationRequest) -> Result<Vec<PackageRecord>, OpError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(dir = %self.dir.display(), "appimage directory does not exist yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.io_error(&e, &self.dir, request)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| self.io_error(&e, &self.dir, request))? {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if is_bundle(&file_name) {
                names.push(file_name);
            }
        }
        names.sort();

        let mut records = Vec::with_capacity(names.len());
        for file_name in names {
            let launcher = self.read_launcher(&file_name).await;
            let display_name = launcher.name.unwrap_or_else(|| display_name_from_file(&file_name));
            let description = launcher
                .comment
                .unwrap_or_else(|| format!("AppImage: {display_name}"));
            records.push(
                PackageRecord::new(Ecosystem::Portable, file_name, true)
                    .with_display_name(display_name)
                    .with_description(description)
                    .with_origin(self.dir.display().to_string()),
            );
        }
        Ok(records)
    }

    async fn read_launcher(&self, file_name: &str) -> LauncherInfo {
        for path in self.launcher_candidates(file_name) {
            if let Ok(content) = fs::read_to_string(&path).await {
                return parse_launcher(&content);
            }
        }
        LauncherInfo::default()
    }

    async fn install(&self, request: &OperationRequest) -> Result<String, OpError> {
        let source = PathBuf::from(require_target(request)?);
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| is_bundle(n))
            .ok_or_else(|| OpError::Filesystem {
                path: source.clone(),
                message: "not an AppImage file".into(),
            })?;

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| self.io_error(&e, &self.dir, request))?;
        let dest = self.dir.join(&file_name);
        let source_real = fs::canonicalize(&source)
            .await
            .map_err(|e| self.io_error(&e, &source, request))?;
        if fs::canonicalize(&dest).await.ok().as_ref() != Some(&source_real) {
            fs::copy(&source, &dest)
                .await
                .map_err(|e| self.io_error(&e, &source, request))?;
        }
        fs::set_permissions(&dest, std::fs::Permissions::from_mode(BUNDLE_MODE))
            .await
            .map_err(|e| self.io_error(&e, &dest, request))?;

        if let Some(gear_lever) = self.gear_lever().await {
            let args = vec!["--integrate".to_string(), dest.display().to_string()];
            match gear_lever.run(request, args).await {
                Ok(_) => {
                    tracing::info!(bundle = %dest.display(), "appimage integrated by gear lever");
                    return Ok(format!("Integrated {file_name} with Gear Lever"));
                }
                Err(e) => tracing::warn!(error = %e, "gear lever integration failed, writing launcher entry"),
            }
        }

        let launcher = self.launcher_path(&file_name);
        fs::create_dir_all(&self.applications_dir)
            .await
            .map_err(|e| self.io_error(&e, &self.applications_dir, request))?;
        fs::write(&launcher, launcher_entry(&dest, &display_name_from_file(&file_name)))
            .await
            .map_err(|e| self.io_error(&e, &launcher, request))?;

        tracing::info!(bundle = %dest.display(), launcher = %launcher.display(), "appimage installed");
        Ok(format!("AppImage installed to {}", dest.display()))
    }

    async fn remove(&self, request: &OperationRequest) -> Result<String, OpError> {
        let (file_name, bundle) = self.bundle_path(request)?;
        if let Some(gear_lever) = self.gear_lever().await {
            match gear_lever.run(request, vec!["--remove".to_string(), bundle.display().to_string()]).await {
                Ok(_) => return Ok(format!("Removed {file_name} via Gear Lever")),
                Err(e) => tracing::warn!(error = %e, "gear lever removal failed, cleaning up manually"),
            }
        }

        fs::remove_file(&bundle).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OpError::Filesystem {
                    path: bundle.clone(),
                    message: "AppImage not found".into(),
                }
            } else {
                self.io_error(&e, &bundle, request)
            }
        })?;

        for launcher in self.launcher_candidates(&file_name) {
            match fs::remove_file(&launcher).await {
                Ok(()) => tracing::debug!(launcher = %launcher.display(), "launcher entry removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(self.io_error(&e, &launcher, request)),
            }
        }
        Ok(success_message(Action::Remove, &file_name))
    }

    async fn info(&self, request: &OperationRequest) -> Result<String, OpError> {
        let (file_name, path) = self.bundle_path(request)?;
        let metadata = fs::metadata(&path).await.map_err(|e| self.io_error(&e, &path, request))?;
        let launcher = self.read_launcher(&file_name).await;

        let name = launcher.name.unwrap_or_else(|| display_name_from_file(&file_name));
        let mode = metadata.permissions().mode() & 0o7777;
        let modified = metadata
            .modified()
            .map(|time| DateTime::<Local>::from(time).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|_| "unknown".into());

        let mut details = format!("App Name      : {name}\nFilename      : {file_name}\n");
        if let Some(comment) = launcher.comment {
            details.push_str(&format!("Description   : {comment}\n"));
        }
        details.push_str(&format!(
            "Size          : {}\nLast Modified : {modified}\nPath          : {}\nPermissions   : {mode:#o}\nExecutable    : {}\n",
            format_size(metadata.len()),
            path.display(),
            if mode & 0o111 != 0 { "Yes" } else { "No" },
        ));
        let integration = if self.gear_lever().await.is_some() { "Gear Lever" } else { "Manual" };
        details.push_str(&format!("Integration   : {integration}\n"));
        Ok(details)
    }

    async fn handle(&self, request: OperationRequest) -> Result<Outcome, OpError> {
        match request.action {
            Action::List => Ok(Outcome::Records(self.list(&request).await?)),
            Action::Search => {
                let query = request.target.trim().to_lowercase();
                let records = self
                    .list(&request)
                    .await?
                    .into_iter()
                    .filter(|r| query.is_empty() || r.name.to_lowercase().contains(&query) || r.title().to_lowercase().contains(&query))
                    .collect();
                Ok(Outcome::Records(records))
            }
            // Neither manual bundles nor Gear Lever can list pending updates.
            Action::ListUpdates => Ok(Outcome::Records(Vec::new())),
            Action::Install => Ok(Outcome::Completed(self.install(&request).await?)),
            Action::Remove => Ok(Outcome::Completed(self.remove(&request).await?)),
            Action::Info => Ok(Outcome::Details(self.info(&request).await?)),
            Action::Update => match self.gear_lever().await {
                Some(gear_lever) => {
                    gear_lever.run(&request, vec!["--fetch-updates".to_string()]).await?;
                    Ok(Outcome::Completed("Gear Lever: update check completed".to_string()))
                }
                None => Err(OpError::Unsupported {
                    ecosystem: request.ecosystem,
                    action: request.action,
                }),
            },
        }
    }
}

impl Backend for AppImageBackend {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Portable
    }

    fn perform(&self, request: OperationRequest) -> BoxFuture<'static, Result<Outcome, OpError>> {
        let backend = self.clone();
        Box::pin(async move { backend.handle(request).await })
    }
}

/// Starts a bundle in its own process group so it outlives FiNDy.
pub fn launch(path: &Path) -> Result<(), OpError> {
    let child = Command::new(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn()
        .map_err(|e| OpError::Filesystem {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    tracing::info!(bundle = %path.display(), pid = child.id(), "appimage launched");
    Ok(())
}

fn is_bundle(file_name: &str) -> bool {
    file_name.to_lowercase().ends_with(EXTENSION) && file_name.len() > EXTENSION.len()
}

/// `Krita-5.2.AppImage` → `Krita-5.2`
fn stem(file_name: &str) -> &str {
    if is_bundle(file_name) {
        &file_name[..file_name.len() - EXTENSION.len()]
    } else {
        file_name
    }
}

/// Human name from a bundle's file name: separators become spaces, version
/// numbers go, words are capitalised. Falls back to the stem when nothing is
/// left.
pub fn display_name_from_file(file_name: &str) -> String {
    static VERSION: OnceLock<Regex> = OnceLock::new();
    let version = VERSION.get_or_init(|| Regex::new(r"[0-9]+(\.[0-9]+)*").expect("valid version regex"));

    let base = stem(file_name).replace(['_', '-'], " ");
    let words: Vec<String> = version
        .replace_all(&base, "")
        .split_whitespace()
        .map(capitalize)
        .collect();
    if words.is_empty() {
        stem(file_name).to_string()
    } else {
        words.join(" ")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn parse_launcher(content: &str) -> LauncherInfo {
    let mut info = LauncherInfo::default();
    for line in content.lines().map(str::trim) {
        if let Some(value) = line.strip_prefix("Name=") {
            info.name.get_or_insert_with(|| value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("Comment=") {
            info.comment.get_or_insert_with(|| value.trim().to_string());
        }
    }
    info.name = info.name.filter(|n| !n.is_empty());
    info.comment = info.comment.filter(|c| !c.is_empty());
    info
}

fn launcher_entry(bundle: &Path, name: &str) -> String {
    format!(
        "[Desktop Entry]\nType=Application\nName={name}\nComment=AppImage: {name}\nExec=\"{}\"\nIcon=application-x-executable\nTerminal=false\nCategories=Utility;\n",
        bundle.display()
    )
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}
