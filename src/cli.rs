use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;

use crate::backend::Backends;
use crate::config::Config;
use crate::edition;
use crate::error::OpError;
use crate::model::{Action, Ecosystem, OperationRequest, Outcome, PackageRecord, SearchFilter};
use crate::runner::{Executor, TokioExecutor};
use crate::theme_detect;
use crate::utils::{confirm, print_error, print_info, print_success, print_warning};

#[derive(Parser)]
#[clap(name = "findy")]
#[clap(
    about = "A unified package manager for dnf, flatpak, and AppImages",
    long_about = "A unified package manager for dnf, flatpak, and AppImages.\n\nRun without arguments to open the graphical interface.\nEvery subcommand works on system (dnf) packages unless --flatpak or --appimage is given."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

/// Which ecosystem a subcommand works on.
#[derive(Args, Debug, Clone, Copy)]
pub struct Source {
    /// Use flatpak instead of the system package manager
    #[clap(short, long, conflicts_with = "appimage")]
    flatpak: bool,
    /// Use the AppImage directory instead of the system package manager
    #[clap(short = 'a', long)]
    appimage: bool,
}

impl Source {
    fn ecosystem(&self) -> Ecosystem {
        match (self.flatpak, self.appimage) {
            (true, _) => Ecosystem::Sandboxed,
            (_, true) => Ecosystem::Portable,
            _ => Ecosystem::System,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// List installed packages
    List {
        #[clap(flatten)]
        source: Source,
    },
    /// Search for packages
    Search {
        /// Search query
        query: String,
        /// Only show installed packages
        #[clap(long, conflicts_with = "available")]
        installed: bool,
        /// Only show packages that are not installed
        #[clap(long)]
        available: bool,
        #[clap(flatten)]
        source: Source,
    },
    /// Install packages (AppImages are given as file paths)
    Install {
        /// Package names to install
        #[clap(required = true)]
        packages: Vec<String>,
        /// Don't ask for confirmation
        #[clap(short, long)]
        yes: bool,
        #[clap(flatten)]
        source: Source,
    },
    /// Remove packages
    Remove {
        /// Package names to remove
        #[clap(required = true)]
        packages: Vec<String>,
        /// Don't ask for confirmation
        #[clap(short, long)]
        yes: bool,
        #[clap(flatten)]
        source: Source,
    },
    /// Update packages (if none are named, update everything)
    Update {
        /// Package names to update
        packages: Vec<String>,
        /// Don't ask for confirmation
        #[clap(short, long)]
        yes: bool,
        #[clap(flatten)]
        source: Source,
    },
    /// List packages with updates available
    Updates {
        #[clap(flatten)]
        source: Source,
    },
    /// Show package information
    Info {
        /// Package name
        package: String,
        #[clap(flatten)]
        source: Source,
    },
    /// Show which theme the GUI would use
    Theme,
    /// Show the detected OpenMandriva edition
    Edition,
    /// Open the OpenMandriva repository selector
    Repos,
}

impl Cli {
    pub fn run(self, config: &Config) -> Result<()> {
        if let Commands::Theme = self.command {
            let variant = theme_detect::resolve(config.theme);
            print_info(&format!("Theme preference: {:?}", config.theme));
            println!("{}", variant.as_str().bold());
            return Ok(());
        }

        if let Commands::Repos = self.command {
            let tool = edition::launch_repo_selector()?;
            print_success(&format!("Opened {tool}"));
            return Ok(());
        }

        let executor: Arc<dyn Executor> = Arc::new(TokioExecutor);
        let backends = Backends::from_config(config, executor.clone());
        let runtime = tokio::runtime::Runtime::new()?;

        match self.command {
            Commands::List { source } => {
                let records = runtime.block_on(query(&backends, OperationRequest::list(source.ecosystem())))?;
                print_records(&records, source.ecosystem());
            }
            Commands::Search {
                query: text,
                installed,
                available,
                source,
            } => {
                let filter = match (installed, available) {
                    (true, _) => SearchFilter::Installed,
                    (_, true) => SearchFilter::Available,
                    _ => SearchFilter::All,
                };
                let request = OperationRequest::search(source.ecosystem(), text, filter);
                let records = runtime.block_on(query(&backends, request))?;
                print_records(&records, source.ecosystem());
            }
            Commands::Updates { source } => {
                let ecosystem = source.ecosystem();
                let records = runtime.block_on(query(&backends, OperationRequest::list_updates(ecosystem)))?;
                if records.is_empty() {
                    print_success(&format!("{} are up to date", ecosystem.label()));
                } else {
                    print_info(&format!("{} updates available", records.len()));
                    print_records(&records, ecosystem);
                }
            }
            Commands::Info { package, source } => {
                let request = OperationRequest::new(source.ecosystem(), Action::Info, package);
                match runtime.block_on(backends.perform(request)) {
                    Ok(Outcome::Details(details)) => println!("{}", details.trim_end()),
                    Ok(other) => tracing::warn!(?other, "unexpected info outcome"),
                    Err(e) => bail!(e),
                }
            }
            Commands::Install { packages, yes, source } => {
                mutate(&runtime, &backends, source.ecosystem(), Action::Install, &packages, yes)?;
            }
            Commands::Remove { packages, yes, source } => {
                mutate(&runtime, &backends, source.ecosystem(), Action::Remove, &packages, yes)?;
            }
            Commands::Update { packages, yes, source } => {
                let targets = if packages.is_empty() { vec![String::new()] } else { packages };
                mutate(&runtime, &backends, source.ecosystem(), Action::Update, &targets, yes)?;
            }
            Commands::Edition => {
                let detected = runtime.block_on(edition::detect(
                    executor.as_ref(),
                    config.query_timeout(),
                    Path::new(edition::OS_RELEASE),
                ));
                match detected {
                    Some(edition) => println!("{}", edition.to_string().bold()),
                    None => print_warning("OpenMandriva edition could not be detected"),
                }
            }
            Commands::Theme | Commands::Repos => {}
        }
        Ok(())
    }
}

async fn query(backends: &Backends, request: OperationRequest) -> Result<Vec<PackageRecord>> {
    match backends.perform(request).await? {
        Outcome::Records(records) => Ok(records),
        other => bail!("unexpected outcome: {:?}", other),
    }
}

/// Runs one request per target and keeps going past failures.
fn mutate(
    runtime: &tokio::runtime::Runtime,
    backends: &Backends,
    ecosystem: Ecosystem,
    action: Action,
    targets: &[String],
    yes: bool,
) -> Result<()> {
    let described = if targets.iter().all(|t| t.is_empty()) {
        String::from("all packages")
    } else {
        targets.join(", ")
    };
    if !yes && !confirm(&format!("{} {} ({})?", capitalize(action.as_str()), described, ecosystem.label()))? {
        print_info("Aborted");
        return Ok(());
    }

    let mut failures = 0;
    for target in targets {
        let request = OperationRequest::new(ecosystem, action, target.as_str());
        print_info(&format!("Running {} {}", action, if target.is_empty() { "(all)" } else { target }));
        match runtime.block_on(backends.perform(request)) {
            Ok(Outcome::Completed(message)) => print_success(&message),
            Ok(other) => tracing::warn!(?other, "unexpected outcome"),
            Err(OpError::PrivilegeCancelled) => {
                print_warning("Operation cancelled");
                failures += 1;
            }
            Err(e) => {
                print_error(&e.to_string());
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} {} operations failed", targets.len(), action);
    }
    Ok(())
}

fn print_records(records: &[PackageRecord], ecosystem: Ecosystem) {
    if records.is_empty() {
        print_info(&format!("No {} found", ecosystem.label()));
        return;
    }
    for record in records {
        let status = if record.installed {
            "[installed]".green()
        } else {
            "".normal()
        };
        let version = record.version.as_deref().unwrap_or("");
        println!("{} {} {}", record.name.bold(), version.dimmed(), status);
        if let Some(title) = record.display_name.as_deref().filter(|t| *t != record.name) {
            println!("    {}", title);
        }
        if let Some(description) = &record.description {
            println!("    {}", description.dimmed());
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("findy").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn source_flags_pick_ecosystem() {
        match parse(&["list"]).command {
            Commands::List { source } => assert_eq!(source.ecosystem(), Ecosystem::System),
            _ => panic!("expected list"),
        }
        match parse(&["install", "--flatpak", "-y", "org.gimp.GIMP"]).command {
            Commands::Install { packages, yes, source } => {
                assert_eq!(packages, ["org.gimp.GIMP"]);
                assert!(yes);
                assert_eq!(source.ecosystem(), Ecosystem::Sandboxed);
            }
            _ => panic!("expected install"),
        }
        match parse(&["remove", "--appimage", "Tool.AppImage"]).command {
            Commands::Remove { source, yes, .. } => {
                assert_eq!(source.ecosystem(), Ecosystem::Portable);
                assert!(!yes);
            }
            _ => panic!("expected remove"),
        }
    }

    #[test]
    fn conflicting_flags_are_rejected() {
        let both = ["findy", "list", "--flatpak", "--appimage"];
        assert!(Cli::try_parse_from(both).is_err());
        let filters = ["findy", "search", "vim", "--installed", "--available"];
        assert!(Cli::try_parse_from(filters).is_err());
        assert!(Cli::try_parse_from(["findy", "install"]).is_err());
    }

    #[test]
    fn update_without_packages_means_everything() {
        match parse(&["update", "-y"]).command {
            Commands::Update { packages, .. } => assert!(packages.is_empty()),
            _ => panic!("expected update"),
        }
    }

    #[test]
    fn edition_and_repos_take_no_arguments() {
        assert!(matches!(parse(&["edition"]).command, Commands::Edition));
        assert!(matches!(parse(&["repos"]).command, Commands::Repos));
        assert!(Cli::try_parse_from(["findy", "repos", "--flatpak"]).is_err());
    }

    #[test]
    fn capitalize_first_letter() {
        assert_eq!(capitalize("install"), "Install");
        assert_eq!(capitalize(""), "");
    }
}
