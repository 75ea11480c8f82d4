//! Site configuration management for `quill.toml`.
//!
//! # Sections
//!
//! | Section      | Purpose                                         |
//! |--------------|-------------------------------------------------|
//! | `[build]`    | Source, static and output paths, clean, minify  |
//! | `[markdown]` | Markdown extensions and code highlighting       |
//! | `[watch]`    | Rebuild debounce                                |
//! | `[extra]`    | Values bound in every template                  |
//!
//! # Example
//!
//! ```toml
//! [build]
//! source = "processed"
//! output = "public"
//! global = "_global.html"
//!
//! [markdown]
//! highlight = "base16-ocean.dark"
//!
//! [extra]
//! title = "My Site"
//! published = 2024-03-01
//! ```

mod build;
pub mod defaults;
mod error;

pub use build::{BuildConfig, MarkdownConfig, WatchConfig};
pub use error::ConfigError;

use crate::{
    cli::{Cli, Commands},
    engine::{MarkdownOptions, SiteOptions},
    utils::markdown,
};
use anyhow::{Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

/// Root configuration structure representing quill.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub markdown: MarkdownConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    /// Global template bindings
    #[serde(default)]
    pub extra: HashMap<String, toml::Value>,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Load, apply CLI overrides and validate.
    pub fn load(cli: &Cli) -> Result<Self> {
        let root = cli.root.as_deref().unwrap_or(Path::new("./"));
        let config_path = root.join(&cli.config);

        if !config_path.exists() {
            bail!("Config file not found: {}", config_path.display());
        }

        let mut config = Self::from_path(&config_path)?;
        config.update_with_cli(cli);
        config.validate()?;
        Ok(config)
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        self.build.root.as_deref().unwrap_or(Path::new("./"))
    }

    /// Set the root directory path
    pub fn set_root(&mut self, path: &Path) {
        self.build.root = Some(path.to_path_buf())
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli) {
        let root = cli
            .root
            .clone()
            .unwrap_or_else(|| self.get_root().to_owned());

        Self::update_option(&mut self.build.source, cli.source.as_ref());
        Self::update_option(&mut self.build.output, cli.output.as_ref());

        if cli.clean() {
            self.build.clean = true;
        }
        if let Commands::Build { minify, .. } = &cli.command {
            Self::update_option(&mut self.build.minify, minify.as_ref());
        }

        self.update_path_with_root(&root, &cli.config);
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Make every configured path absolute, relative to `root`.
    fn update_path_with_root(&mut self, root: &Path, config: &Path) {
        let root = Self::normalize_path(root);
        self.set_root(&root);

        self.config_path = Self::normalize_path(&root.join(config));
        self.build.source = Self::normalize_path(&root.join(&self.build.source));
        self.build.assets = Self::normalize_path(&root.join(&self.build.assets));
        self.build.output = Self::normalize_path(&root.join(&self.build.output));

        if let Some(global) = self.build.global.take() {
            self.build.global = Some(Self::normalize_path(&self.build.source.join(global)));
        }
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.build.source.is_dir() {
            bail!(ConfigError::Validation(format!(
                "[build.source] `{}` is not a directory",
                self.build.source.display()
            )));
        }

        if !markdown::is_known_theme(&self.markdown.highlight) {
            bail!(ConfigError::Validation(format!(
                "[markdown.highlight] unknown theme `{}`",
                self.markdown.highlight
            )));
        }

        if self.markdown.output_extension.is_empty() {
            bail!(ConfigError::Validation(
                "[markdown.output_extension] must not be empty".into()
            ));
        }

        if let Some(global) = &self.build.global
            && !global.is_file()
        {
            bail!(ConfigError::Validation(format!(
                "[build.global] `{}` not found",
                global.display()
            )));
        }

        if self.build.output == self.build.source || self.build.output == self.build.assets {
            bail!(ConfigError::Validation(
                "[build.output] must differ from the source and static directories".into()
            ));
        }

        Ok(())
    }

    /// Engine view of the site layout.
    pub fn site_options(&self) -> SiteOptions {
        SiteOptions {
            source: self.build.source.clone(),
            assets: self.build.assets.clone(),
            markdown: MarkdownOptions {
                extensions: self.markdown.extensions.clone(),
                highlight: self.markdown.highlight.clone(),
                output_extension: self.markdown.output_extension.clone(),
            },
        }
    }
}
