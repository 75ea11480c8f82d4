//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// quill static site templating engine
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project root directory
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Output directory path (relative to project root)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Templated source directory path (relative to project root)
    #[arg(short, long)]
    pub source: Option<PathBuf>,

    /// Config file name (default: quill.toml)
    #[arg(short = 'C', long, default_value = "quill.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Render every page and copy static files into the output directory
    Build {
        /// Clean output directory completely before building
        #[arg(long)]
        clean: bool,

        /// Minify the html output
        #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        minify: Option<bool>,
    },

    /// Build, then rebuild whenever sources or the config change
    Watch {
        /// Clean output directory completely before the first build
        #[arg(long)]
        clean: bool,
    },
}

impl Cli {
    pub const fn clean(&self) -> bool {
        match self.command {
            Commands::Build { clean, .. } | Commands::Watch { clean } => clean,
        }
    }
}
