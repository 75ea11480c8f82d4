//! File system watcher with full rebuilds.
//!
//! ```text
//! ┌────────────┐    ┌────────────┐    ┌──────────────────────────┐
//! │  notify    │───▶│ Debouncer  │───▶│ handle_changes()         │
//! │  events    │    │ (quiet ms) │    │  quill.toml? ─► reload   │
//! └────────────┘    └────────────┘    │  always      ─► rebuild  │
//!                                     └──────────────────────────┘
//! ```
//!
//! Any change rebuilds the whole site: a page's output depends on every file
//! it includes, and those edges are only known while rendering.

use crate::{
    build::build_site,
    cli::Cli,
    config::SiteConfig,
    log,
    logger::WatchStatus,
};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use std::{
    path::{Path, PathBuf},
    sync::mpsc::{RecvTimeoutError, channel},
    time::{Duration, Instant},
};

/// Events arriving this soon after a rebuild are the rebuild's own writes.
const REBUILD_COOLDOWN_MS: u64 = 800;

/// Editor swap and backup files.
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

// =============================================================================
// Debounce State
// =============================================================================

struct Debouncer {
    quiet: Duration,
    pending: FxHashSet<PathBuf>,
    last_event: Option<Instant>,
    last_rebuild: Option<Instant>,
}

impl Debouncer {
    fn new(debounce_ms: u64) -> Self {
        Self {
            quiet: Duration::from_millis(debounce_ms),
            pending: FxHashSet::default(),
            last_event: None,
            last_rebuild: None,
        }
    }

    fn in_cooldown(&self) -> bool {
        self.last_rebuild
            .is_some_and(|t| t.elapsed() < Duration::from_millis(REBUILD_COOLDOWN_MS))
    }

    fn add(&mut self, event: Event) {
        let before = self.pending.len();
        self.pending
            .extend(event.paths.into_iter().filter(|p| !is_temp_file(p)));
        if self.pending.len() > before {
            self.last_event = Some(Instant::now());
        }
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty() && self.last_event.is_some_and(|t| t.elapsed() >= self.quiet)
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        let mut paths: Vec<_> = self.pending.drain().collect();
        paths.sort();
        paths
    }

    fn mark_rebuild(&mut self) {
        self.last_rebuild = Some(Instant::now());
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            Duration::from_secs(60)
        } else {
            self.quiet
        }
    }
}

// =============================================================================
// Event Handler
// =============================================================================

/// Path relative to the project root, for display.
fn rel_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

/// Whether any changed path is the config file itself.
fn touches_config(paths: &[PathBuf], config: &SiteConfig) -> bool {
    paths.iter().any(|p| p == &config.config_path)
}

/// Rebuild after `paths` changed, reloading the config first if needed.
/// Returns whether a build ran.
fn handle_changes(
    paths: &[PathBuf],
    cli: &Cli,
    config: &mut SiteConfig,
    watcher: &mut impl Watcher,
    status: &mut WatchStatus,
) -> bool {
    if paths.is_empty() {
        return false;
    }

    let trigger = paths
        .iter()
        .map(|p| rel_path(p, config.get_root()))
        .collect::<Vec<_>>()
        .join(", ");

    if touches_config(paths, config) {
        match SiteConfig::load(cli) {
            Ok(mut reloaded) => {
                // `--clean` only applies to the first build
                reloaded.build.clean = false;
                if let Err(e) = rewatch(watcher, config, &reloaded) {
                    log!("watch"; "{e:#}");
                }
                *config = reloaded;
                log!("watch"; "config reloaded");
            }
            Err(e) => {
                status.error("config reload failed, keeping previous config", &format!("{e:#}"));
                status.keep();
            }
        }
    }

    match build_site(config) {
        Ok(summary) => {
            status.success(&format!(
                "rebuilt {} pages, {} static ({trigger})",
                summary.pages, summary.copied
            ));
        }
        Err(e) => status.error(&format!("build failed ({trigger})"), &format!("{e:#}")),
    }
    true
}

// =============================================================================
// Watcher Setup
// =============================================================================

fn watch_targets(config: &SiteConfig) -> [(&Path, RecursiveMode); 3] {
    [
        (config.build.source.as_path(), RecursiveMode::Recursive),
        (config.build.assets.as_path(), RecursiveMode::Recursive),
        (config.config_path.as_path(), RecursiveMode::NonRecursive),
    ]
}

fn setup_watchers(watcher: &mut impl Watcher, config: &SiteConfig) -> Result<()> {
    let mut watched = Vec::new();
    for (path, mode) in watch_targets(config) {
        if !path.exists() {
            continue;
        }
        watcher
            .watch(path, mode)
            .with_context(|| format!("Failed to watch {}", path.display()))?;
        watched.push(rel_path(path, config.get_root()));
    }

    log!("watch"; "watching: {}", watched.join(", "));
    Ok(())
}

/// Move the watches over when a reloaded config points elsewhere.
fn rewatch(watcher: &mut impl Watcher, old: &SiteConfig, new: &SiteConfig) -> Result<()> {
    if watch_targets(old) == watch_targets(new) {
        return Ok(());
    }
    for (path, _) in watch_targets(old) {
        // paths that did not exist were never watched
        let _ = watcher.unwatch(path);
    }
    setup_watchers(watcher, new)
}

const fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

// =============================================================================
// Public API
// =============================================================================

/// Watch sources and config, rebuilding until the channel closes.
///
/// Expects the initial build to have run already.
pub fn watch_for_changes_blocking(cli: &Cli, mut config: SiteConfig) -> Result<()> {
    let (tx, rx) = channel();
    let mut watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;
    setup_watchers(&mut watcher, &config)?;

    // later rebuilds never wipe the output
    config.build.clean = false;

    let mut debouncer = Debouncer::new(config.watch.debounce_ms);
    let mut status = WatchStatus::new();

    loop {
        match rx.recv_timeout(debouncer.timeout()) {
            Ok(Ok(event)) if is_relevant(&event) && !debouncer.in_cooldown() => {
                debouncer.add(event);
            }
            Ok(Err(e)) => log!("watch"; "error: {e}"),
            Err(RecvTimeoutError::Timeout) if debouncer.ready() => {
                let paths = debouncer.take();
                if handle_changes(&paths, cli, &mut config, &mut watcher, &mut status) {
                    debouncer.mark_rebuild();
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
            _ => {}
        }
    }

    Ok(())
}
