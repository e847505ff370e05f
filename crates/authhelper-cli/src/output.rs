//! Diagnostic output and logging initialization
//!
//! stdout is reserved for the response dictionary, so everything meant for a
//! human goes to stderr, colored when stderr is a terminal.

use owo_colors::OwoColorize;
use std::env;
use tracing_subscriber::EnvFilter;

/// Output level for controlling what gets displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLevel {
    /// Warnings and errors
    Normal,
    /// Only errors
    Quiet,
    /// Warnings, errors and debug logging
    Verbose,
}

impl OutputLevel {
    /// Check if warnings should be shown (errors and hints always show)
    pub fn show_user(&self) -> bool {
        matches!(self, Self::Normal | Self::Verbose)
    }

    fn default_filter(&self) -> &'static str {
        match self {
            Self::Verbose => "debug",
            Self::Normal | Self::Quiet => "warn",
        }
    }
}

/// Install the stderr `tracing` subscriber. `RUST_LOG` wins over the level's
/// default filter; `log` records from the library are forwarded as well.
pub fn init_tracing(output_level: OutputLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(output_level.default_filter()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Check if colored output should be disabled
fn colors_disabled() -> bool {
    env::var("NO_COLOR").is_ok()
        || env::var("TERM").is_ok_and(|t| t == "dumb")
        || !atty::is(atty::Stream::Stderr)
}

/// Print a warning message with "Warning:" prefix in yellow
pub fn warning(msg: &str, output_level: OutputLevel) {
    if output_level.show_user() {
        if !colors_disabled() {
            eprintln!("{} {}", "Warning:".yellow().bold(), msg.yellow());
        } else {
            eprintln!("Warning: {msg}");
        }
    }
}

/// Print an error message with "Error:" prefix in red (always shown)
pub fn error(msg: &str, _output_level: OutputLevel) {
    if !colors_disabled() {
        eprintln!("{} {}", "Error:".red().bold(), msg.red());
    } else {
        eprintln!("Error: {msg}");
    }
}

/// Print a hint message with "Hint:" prefix in blue (always shown)
pub fn hint(msg: &str, _output_level: OutputLevel) {
    if !colors_disabled() {
        eprintln!("{} {}", "Hint:".blue().bold(), msg.blue());
    } else {
        eprintln!("Hint: {msg}");
    }
}

/// Print an error with suggested action
pub fn error_with_suggestion(msg: &str, suggestion: &str, output_level: OutputLevel) {
    error(msg, output_level);
    hint(suggestion, output_level);
}

/// Format a command or option with colors
pub fn format_command(cmd: &str) -> String {
    if colors_disabled() {
        format!("`{cmd}`")
    } else {
        format!("`{}`", cmd.yellow().bold())
    }
}
