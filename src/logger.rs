//! Terminal output: prefixed log lines, build progress and the watch status.
//!
//! ```text
//! [warn] processed/index.html:3:5: unknown directive `evl`, kept as text
//! [pages]  [████████████░░░░░░░░░░░░] 12/24
//! [static] [████████████████████████] 8/8
//! [10:42:07] ✓ rebuilt 32 files
//! ```
//!
//! Log lines printed while progress bars are visible are inserted above the
//! bars, which are then redrawn in place.

use colored::{ColoredString, Colorize};
use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType, size},
};
use std::{
    io::{Write, stdout},
    sync::{
        Mutex, OnceLock,
        atomic::{AtomicUsize, Ordering},
    },
};

static TERMINAL_WIDTH: OnceLock<u16> = OnceLock::new();

/// Rows currently occupied by progress bars below the cursor.
static BAR_ROWS: AtomicUsize = AtomicUsize::new(0);

const MIN_BAR_WIDTH: usize = 10;
const MAX_BAR_WIDTH: usize = 40;

/// Display width of `[module] `.
#[inline]
const fn prefix_width(module_len: usize) -> usize {
    module_len + 3
}

fn terminal_width() -> u16 {
    *TERMINAL_WIDTH.get_or_init(|| size().map(|(w, _)| w).unwrap_or(120))
}

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix.
///
/// ```ignore
/// log!("build"; "{} pages written", count);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Print one log line. Single-line messages are cut to the terminal width.
#[allow(clippy::cast_possible_truncation)]
pub fn log(module: &str, message: &str) {
    let prefix = colorize_prefix(module);
    let mut stdout = stdout().lock();

    let rows = BAR_ROWS.load(Ordering::SeqCst);
    if rows > 0 {
        execute!(stdout, cursor::MoveUp(rows as u16)).ok();
        execute!(stdout, Clear(ClearType::FromCursorDown)).ok();
    } else {
        execute!(stdout, Clear(ClearType::UntilNewLine)).ok();
    }

    let message = if message.contains('\n') {
        message
    } else {
        let room = (terminal_width() as usize).saturating_sub(prefix_width(module.len()));
        truncate_str(message, room)
    };
    writeln!(stdout, "{prefix} {message}").ok();

    // leave room for the bars to redraw into
    for _ in 0..rows {
        writeln!(stdout).ok();
    }
    stdout.flush().ok();
}

fn colorize_prefix(module: &str) -> ColoredString {
    let prefix = format!("[{module}]");
    match module.to_ascii_lowercase().as_str() {
        "error" => prefix.bright_red().bold(),
        "warn" => prefix.bright_magenta().bold(),
        "watch" => prefix.bright_green().bold(),
        _ => prefix.bright_yellow().bold(),
    }
}

/// Cut `s` to at most `max_len` bytes on a char boundary.
fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ============================================================================
// Progress Bars
// ============================================================================

struct Bar {
    name: &'static str,
    prefix: ColoredString,
    total: usize,
    done: AtomicUsize,
}

/// One progress bar per category, each on its own terminal row.
///
/// Safe to advance from rayon workers; drawing is serialized by a mutex.
pub struct ProgressBars {
    bars: Vec<Bar>,
    draw: Mutex<()>,
}

impl ProgressBars {
    /// Bars for every category with work to do, or `None` when there is at
    /// most one item overall.
    pub fn new(categories: &[(&'static str, usize)]) -> Option<Self> {
        let bars: Vec<Bar> = categories
            .iter()
            .filter(|(_, total)| *total > 0)
            .map(|&(name, total)| Bar {
                name,
                prefix: colorize_prefix(name),
                total,
                done: AtomicUsize::new(0),
            })
            .collect();

        if bars.iter().map(|b| b.total).sum::<usize>() <= 1 {
            return None;
        }

        let mut stdout = stdout().lock();
        for _ in &bars {
            writeln!(stdout).ok();
        }
        stdout.flush().ok();
        BAR_ROWS.store(bars.len(), Ordering::SeqCst);

        Some(Self {
            bars,
            draw: Mutex::new(()),
        })
    }

    /// Advance the bar named `name` by one.
    pub fn inc(&self, name: &str) {
        if let Some((row, bar)) = self.bars.iter().enumerate().find(|(_, b)| b.name == name) {
            let done = bar.done.fetch_add(1, Ordering::Relaxed) + 1;
            self.redraw(row, bar, done);
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn redraw(&self, row: usize, bar: &Bar, done: usize) {
        let _guard = self.draw.lock().ok();

        // names are padded so the bars line up
        let pad = self.bars.iter().map(|b| b.name.len()).max().unwrap_or(0);
        let count = format!("{done}/{}", bar.total);
        let overhead = prefix_width(pad) + 3 + count.len();
        let width = (terminal_width() as usize)
            .saturating_sub(overhead)
            .clamp(MIN_BAR_WIDTH, MAX_BAR_WIDTH);
        let filled = (done * width).checked_div(bar.total).unwrap_or(0).min(width);

        let mut stdout = stdout().lock();
        let up = (self.bars.len() - row) as u16;
        execute!(stdout, cursor::MoveUp(up), Clear(ClearType::CurrentLine)).ok();
        write!(
            stdout,
            "{}{} [{}{}] {count}",
            bar.prefix,
            " ".repeat(pad - bar.name.len()),
            "█".repeat(filled),
            "░".repeat(width - filled),
        )
        .ok();
        execute!(stdout, cursor::MoveDown(up)).ok();
        write!(stdout, "\r").ok();
        stdout.flush().ok();
    }

    /// Erase the bars and put the cursor back where they started.
    #[allow(clippy::cast_possible_truncation)]
    pub fn finish(&self) {
        if BAR_ROWS.swap(0, Ordering::SeqCst) == 0 {
            return;
        }
        let _guard = self.draw.lock().ok();
        let rows = self.bars.len() as u16;
        let mut stdout = stdout().lock();
        execute!(stdout, cursor::MoveUp(rows), Clear(ClearType::FromCursorDown)).ok();
        stdout.flush().ok();
    }
}

impl Drop for ProgressBars {
    fn drop(&mut self) {
        self.finish();
    }
}

// ============================================================================
// Watch Status
// ============================================================================

fn now() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

/// Status block for watch mode; each message replaces the previous one.
pub struct WatchStatus {
    last_lines: usize,
}

impl WatchStatus {
    pub const fn new() -> Self {
        Self { last_lines: 0 }
    }

    pub fn success(&mut self, message: &str) {
        self.display(&"✓".green().to_string(), message);
    }

    pub fn error(&mut self, summary: &str, detail: &str) {
        let message = if detail.is_empty() {
            summary.to_owned()
        } else {
            format!("{summary}\n{detail}")
        };
        self.display(&"✗".red().to_string(), &message);
    }

    #[allow(clippy::cast_possible_truncation)]
    fn display(&mut self, symbol: &str, message: &str) {
        let mut stdout = stdout().lock();
        if self.last_lines > 0 {
            execute!(
                stdout,
                cursor::MoveUp(self.last_lines as u16),
                Clear(ClearType::FromCursorDown)
            )
            .ok();
        }

        let timestamp = format!("[{}]", now()).dimmed();
        writeln!(stdout, "{timestamp} {symbol} {message}").ok();
        stdout.flush().ok();

        self.last_lines = line_count(message);
    }

    /// Keep the current block on screen; the next message starts below it.
    pub fn keep(&mut self) {
        self.last_lines = 0;
    }
}

fn line_count(message: &str) -> usize {
    message.matches('\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_width() {
        // "[pages] "
        assert_eq!(prefix_width(5), 8);
        assert_eq!(prefix_width(0), 3);
    }

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello", 5), "hello");
        assert_eq!(truncate_str("hello world", 5), "hello");
        assert_eq!(truncate_str("hello", 0), "");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        // '€' is 3 bytes
        assert_eq!(truncate_str("€€", 4), "€");
        assert_eq!(truncate_str("a€b", 3), "a");
        assert_eq!(truncate_str("a€b", 4), "a€");
    }

    #[test]
    fn test_progress_skipped_for_single_item() {
        assert!(ProgressBars::new(&[("pages", 1), ("static", 0)]).is_none());
        assert!(ProgressBars::new(&[("pages", 0), ("static", 0)]).is_none());
    }

    #[test]
    fn test_line_count() {
        assert_eq!(line_count("rebuilt 3 files"), 1);
        assert_eq!(line_count("build failed\nprocessed/a.html:1:1: unterminated"), 2);
    }

    #[test]
    fn test_now_format() {
        let stamp = now();
        assert_eq!(stamp.len(), 8);
        assert_eq!(stamp.as_bytes()[2], b':');
        assert_eq!(stamp.as_bytes()[5], b':');
    }
}
