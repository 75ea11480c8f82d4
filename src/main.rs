//! quill - a static site templating engine.
//!
//! Renders `{{ directive }}` templates under `processed/`, copies `static/`
//! and writes the result to `public/`.

mod build;
mod cli;
mod config;
mod engine;
mod logger;
mod utils;
mod watch;

use anyhow::Result;
use build::build_site;
use clap::Parser;
use cli::{Cli, Commands};
use config::SiteConfig;
use watch::watch_for_changes_blocking;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = SiteConfig::load(&cli)?;

    match &cli.command {
        Commands::Build { .. } => build_site(&config).map(|_| ()),
        Commands::Watch { .. } => {
            if let Err(e) = build_site(&config) {
                // keep watching so the next save can fix it
                crate::log!("error"; "initial build failed: {e:#}");
            }
            watch_for_changes_blocking(&cli, config)
        }
    }
}
