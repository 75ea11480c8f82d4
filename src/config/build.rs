//! `[build]`, `[markdown]` and `[watch]` sections.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[build]` section: where sources live and where output goes.
///
/// ```toml
/// [build]
/// source = "processed"
/// static = "static"
/// output = "public"
/// global = "_global.html"
/// minify = true
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Project root (usually set via CLI `--root`).
    #[serde(default = "defaults::build::root")]
    #[educe(Default = defaults::build::root())]
    pub root: Option<PathBuf>,

    /// Templated sources.
    #[serde(default = "defaults::build::source")]
    #[educe(Default = defaults::build::source())]
    pub source: PathBuf,

    /// Files copied verbatim.
    #[serde(rename = "static", default = "defaults::build::assets")]
    #[educe(Default = defaults::build::assets())]
    pub assets: PathBuf,

    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// File whose top-level defines are visible to every page, relative to
    /// `source`.
    #[serde(default = "defaults::build::global")]
    #[educe(Default = defaults::build::global())]
    pub global: Option<PathBuf>,

    /// Remove the output directory before building.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub clean: bool,

    /// Minify rendered `.html` files.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub minify: bool,
}

/// `[markdown]` section.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct MarkdownConfig {
    /// Source extensions treated as Markdown, without the dot.
    #[serde(default = "defaults::markdown::extensions")]
    #[educe(Default = defaults::markdown::extensions())]
    pub extensions: Vec<String>,

    /// syntect theme for fenced code blocks.
    #[serde(default = "defaults::markdown::highlight")]
    #[educe(Default = defaults::markdown::highlight())]
    pub highlight: String,

    #[serde(default = "defaults::markdown::output_extension")]
    #[educe(Default = defaults::markdown::output_extension())]
    pub output_extension: String,
}

/// `[watch]` section.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    /// Quiet period after the last change before rebuilding.
    #[serde(default = "defaults::watch::debounce_ms")]
    #[educe(Default = defaults::watch::debounce_ms())]
    pub debounce_ms: u64,
}
