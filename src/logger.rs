//! Logging utilities with colored prefixes.
//!
//! This module provides:
//! - `log!` macro for formatted terminal output with a colored `[module]` prefix
//! - `debug!` macro that only prints with `--verbose`
//! - `child_line` for relaying a streamed line from a child process
//!
//! # Example
//!
//! ```ignore
//! log!("page"; "home/v2 built.");
//! debug!("dispatch"; "queued #{} ({} waiting)", id, waiting);
//! ```

use owo_colors::OwoColorize;
use std::{
    io::{Write, stdout},
    sync::atomic::{AtomicBool, Ordering},
};

/// Global verbose flag (set by --verbose CLI argument)
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Set verbose mode globally
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

/// Check if verbose mode is enabled
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Log a debug message (only shown when --verbose is enabled)
///
/// # Usage
/// ```ignore
/// debug!("module"; "debug info: {}", value);
/// ```
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a colored module prefix
#[inline]
pub fn log(module: &str, message: &str) {
    let module_lower = module.to_ascii_lowercase();
    let prefix = colorize_prefix(module, &module_lower);

    let mut stdout = stdout().lock();
    writeln!(stdout, "{prefix} {message}").ok();
    stdout.flush().ok();
}

/// Write an empty separator line.
pub fn blank() {
    let mut stdout = stdout().lock();
    writeln!(stdout).ok();
    stdout.flush().ok();
}

/// Relay one line of a streamed child process, dimmed label first.
pub fn child_line(label: &str, line: &str) {
    let mut stdout = stdout().lock();
    writeln!(stdout, "{} {}", format!("{label} |").dimmed(), line).ok();
    stdout.flush().ok();
}

/// Apply color to a module prefix based on module type
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> String {
    let prefix = format!("[{module}]");
    match module_lower {
        "page" | "widget" => prefix.bright_green().bold().to_string(),
        "common" => prefix.bright_cyan().bold().to_string(),
        "watch" => prefix.bright_blue().bold().to_string(),
        "error" => prefix.bright_red().bold().to_string(),
        _ => prefix.bright_yellow().bold().to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
