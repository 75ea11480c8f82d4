//! Site building orchestration.
//!
//! ```text
//! build_site()
//!     │
//!     ├── prepare_output()      remove output dir when `clean`
//!     │
//!     ├── global_context()      [extra] values + defines of [build.global]
//!     │
//!     ├── collect_files()       processed/ and static/, private files skipped
//!     │
//!     └── rayon::join
//!             ├── pages   ──► Renderer::render_file ──► minify ──► output/<rel>
//!             └── static  ──► copy (skipped when up to date)
//! ```
//!
//! Every page renders on its own stack and chain; only the parsed-file cache
//! in [`Site`] is shared between workers.

use crate::{
    config::SiteConfig,
    engine::{
        Context, Renderer, Site, Stack, file_scope,
        expr::{DateValue, Value},
        file::ProcessedFile,
    },
    log,
    logger::ProgressBars,
    utils::minify::minify,
};
use anyhow::{Context as _, Result, anyhow};
use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};
use walkdir::WalkDir;

/// Editor and OS droppings never treated as site files.
const IGNORED_FILES: &[&str] = &[".DS_Store", "Thumbs.db"];

/// What one build produced.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    pub pages: usize,
    pub copied: usize,
    pub skipped: usize,
}

/// Build the entire site.
///
/// The first failing file stops the remaining work; its error is returned.
pub fn build_site(config: &SiteConfig) -> Result<BuildSummary> {
    let output = &config.build.output;
    prepare_output(output, config.build.clean)?;

    let site = Site::new(config.site_options());
    let global = global_context(config, &site)?;
    let site = site.with_global(global);

    let pages = collect_files(&config.build.source, &site);
    let assets = collect_files(&config.build.assets, &site);
    log!("build"; "{} pages, {} static files", pages.len(), assets.len());

    let progress = ProgressBars::new(&[("pages", pages.len()), ("static", assets.len())]);
    let tick = |name: &str| {
        if let Some(progress) = &progress {
            progress.inc(name);
        }
    };

    let has_error = AtomicBool::new(false);
    let copied = AtomicUsize::new(0);
    let skipped = AtomicUsize::new(0);

    let fail = |path: &Path, err: anyhow::Error| {
        if !has_error.swap(true, Ordering::Relaxed) {
            log!("error"; "{}: {:#}", path.display(), err);
        }
        anyhow!("Build failed: {:#}", err)
    };

    let (pages_result, assets_result) = rayon::join(
        || {
            pages.par_iter().try_for_each(|path| {
                if has_error.load(Ordering::Relaxed) {
                    return Err(anyhow!("Aborted"));
                }
                write_page(&site, config, path).map_err(|e| fail(path.as_path(), e))?;
                tick("pages");
                Ok(())
            })
        },
        || {
            assets.par_iter().try_for_each(|path| {
                if has_error.load(Ordering::Relaxed) {
                    return Err(anyhow!("Aborted"));
                }
                match copy_asset(&site, config, path) {
                    Ok(true) => copied.fetch_add(1, Ordering::Relaxed),
                    Ok(false) => skipped.fetch_add(1, Ordering::Relaxed),
                    Err(e) => return Err(fail(path.as_path(), e)),
                };
                tick("static");
                Ok(())
            })
        },
    );

    if let Some(progress) = &progress {
        progress.finish();
    }

    pages_result?;
    assets_result?;

    let summary = BuildSummary {
        pages: pages.len(),
        copied: copied.into_inner(),
        skipped: skipped.into_inner(),
    };
    log_build_result(&summary);
    Ok(summary)
}

/// Create the output directory, emptying it first when `clean`.
fn prepare_output(output: &Path, clean: bool) -> Result<()> {
    if clean && output.exists() {
        fs::remove_dir_all(output)
            .with_context(|| format!("Failed to clear output directory: {}", output.display()))?;
    }
    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory: {}", output.display()))
}

/// Non-private files under `dir`, in a stable order.
fn collect_files(dir: &Path, site: &Site) -> Vec<PathBuf> {
    let mut files: Vec<_> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_str().unwrap_or_default();
            !IGNORED_FILES.contains(&name)
        })
        .map(|e| e.into_path())
        .filter(|path| !site.is_private(path))
        .collect();
    files.sort();
    files
}

// ============================================================================
// Per-file work
// ============================================================================

fn output_path(site: &Site, config: &SiteConfig, file: &ProcessedFile) -> Result<PathBuf> {
    let rel = site
        .output_of(file)
        .ok_or_else(|| anyhow!("not inside the source or static directory"))?;
    Ok(config.build.output.join(rel))
}

/// Render one page fully in memory, then write it.
fn write_page(site: &Site, config: &SiteConfig, path: &Path) -> Result<()> {
    let file = site.load(path)?;
    let rendered = Renderer::render_file(site, &file)?;

    let dest = output_path(site, config, &file)?;
    let bytes = minify(&dest, &rendered, config.build.minify);
    write_file(&dest, &bytes)
}

/// Copy one static file. Returns `false` when the output was already newer.
fn copy_asset(site: &Site, config: &SiteConfig, path: &Path) -> Result<bool> {
    let file = site.load(path)?;
    let dest = output_path(site, config, &file)?;
    if !config.build.clean && is_up_to_date(path, &dest) {
        return Ok(false);
    }

    let bytes = Renderer::render_file(site, &file)?;
    write_file(&dest, &bytes)?;
    Ok(true)
}

fn write_file(dest: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(dest, bytes).with_context(|| format!("Failed to write {}", dest.display()))
}

/// Whether `dst` exists and was modified no earlier than `src`.
fn is_up_to_date(src: &Path, dst: &Path) -> bool {
    let modified = |p: &Path| p.metadata().and_then(|m| m.modified()).ok();
    match (modified(src), modified(dst)) {
        (Some(src), Some(dst)) => dst >= src,
        _ => false,
    }
}

fn log_build_result(summary: &BuildSummary) {
    if summary.pages == 0 && summary.copied == 0 && summary.skipped == 0 {
        log!("warn"; "output is empty, check the source and static directories");
    } else if summary.skipped > 0 {
        log!(
            "build";
            "done: {} pages, {} static ({} unchanged)",
            summary.pages,
            summary.copied,
            summary.skipped
        );
    } else {
        log!("build"; "done: {} pages, {} static", summary.pages, summary.copied);
    }
}

// ============================================================================
// Global bindings
// ============================================================================

/// Bindings visible to every page: `[extra]`, then the global file's
/// top-level defines on top.
pub fn global_context(config: &SiteConfig, site: &Site) -> Result<Context> {
    let mut context = Context::new();
    let mut keys: Vec<_> = config.extra.keys().collect();
    keys.sort();
    for key in keys {
        match toml_to_value(&config.extra[key]) {
            Some(value) => context.set(key.as_str(), value),
            None => log!("warn"; "[extra.{key}] has no template equivalent, ignored"),
        }
    }

    let Some(global) = &config.build.global else {
        return Ok(context);
    };

    let file = site.load(global)?;
    let mut stack = Stack::new(Some(Arc::new(context.clone())));
    let defines = file_scope(site, &file, &mut stack)
        .with_context(|| format!("Failed to evaluate {}", global.display()))?;
    context.extend(defines);
    Ok(context)
}

/// Template value of a TOML value. Tables have none.
fn toml_to_value(value: &toml::Value) -> Option<Value> {
    Some(match value {
        toml::Value::String(s) => Value::String(s.clone()),
        #[allow(clippy::cast_precision_loss)]
        toml::Value::Integer(n) => Value::Number(*n as f64),
        toml::Value::Float(n) => Value::Number(*n),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => Value::Date(toml_date(dt)?),
        toml::Value::Array(items) => {
            Value::Array(items.iter().map(toml_to_value).collect::<Option<_>>()?)
        }
        toml::Value::Table(_) => return None,
    })
}

/// Offsets and fractional seconds are dropped; a bare time has no date value.
fn toml_date(dt: &toml::value::Datetime) -> Option<DateValue> {
    let date = dt.date?;
    let text = match dt.time {
        Some(time) => format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
            date.year, date.month, date.day, time.hour, time.minute, time.second
        ),
        None => format!("{:04}-{:02}-{:02}", date.year, date.month, date.day),
    };
    DateValue::parse(&text).ok()
}
