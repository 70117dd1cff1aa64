use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod appimage;
mod backend;
mod cli;
mod config;
mod edition;
mod error;
mod flatpak;
mod gui;
mod model;
mod package_manager;
mod panel;
mod parser;
mod runner;
mod theme_detect;
mod update_checker;
mod utils;

use backend::Backends;
use cli::Cli;
use config::Config;
use runner::{Executor, TokioExecutor};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    tracing::debug!(args = ?std::env::args().collect::<Vec<_>>(), "FiNDy starting");

    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "could not load config, using defaults");
        Config::default()
    });

    // No arguments launches the GUI.
    if std::env::args().len() == 1 {
        let theme = theme_detect::resolve(config.theme);
        let executor: Arc<dyn Executor> = Arc::new(TokioExecutor);
        let flags = gui::Flags {
            backends: Backends::from_config(&config, executor.clone()),
            executor,
            theme,
            config,
        };
        gui::run(flags).map_err(|e| {
            tracing::error!(error = %e, "GUI failed");
            anyhow::Error::from(e)
        })
    } else {
        let cli = Cli::parse();
        cli.run(&config)
    }
}
