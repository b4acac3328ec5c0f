#![deny(warnings)]

//! Headless CLI for the Postscript planning tools.

mod args;
mod commands;

use anyhow::Result;
use args::Cli;
use clap::Parser;
use settings::{default_settings_path, Settings};
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn load_settings(path: &Path) -> Settings {
    match Settings::load(path) {
        Ok(s) => s,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable settings, using defaults");
            Settings::default()
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let path = cli.settings.clone().unwrap_or_else(default_settings_path);
    let mut settings = load_settings(&path);
    info!(command = ?cli.command, settings = %path.display(), "starting CLI");

    let output = commands::execute(&cli.command, cli.run_options(), &mut settings)?;
    println!("{output}");

    if cli.command.stores_settings() && !cli.no_save {
        settings.save(&path)?;
    }
    Ok(())
}
