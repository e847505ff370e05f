//! Trace logger with pluggable sinks and secret redaction.
//!
//! Every call formats one git-style trace line
//! (`{time} {file:line} trace: {message}`) and hands it synchronously to each
//! registered [`LogWriter`] in registration order. Writer failures are
//! swallowed: tracing is a best-effort side channel.
//!
//! ```
//! use authhelper_core::{Logger, MemoryWriter};
//!
//! let sink = MemoryWriter::new();
//! let mut logger = Logger::new();
//! logger.add_writer(sink.clone());
//!
//! logger.log_secret("Access token acquired", "eyJ0eXAi...");
//! assert!(!sink.contents().contains("eyJ0eXAi"));
//! ```

use std::collections::HashMap;
use std::panic::Location;
use std::path::Path;

use chrono::Local;

use crate::writer::LogWriter;

/// Replacement text for secrets when secret tracing is disabled.
pub const SECRET_MASK: &str = "********";

/// Marker placed between a message and its secret payload.
pub const SECRET_SEPARATOR: &str = " [secret] ";

const SOURCE_COLUMN_WIDTH: usize = 23;
const TIMESTAMP_FORMAT: &str = "%H:%M:%S%.6f";

/// Fans trace lines out to an ordered list of writers.
#[derive(Default)]
pub struct Logger {
    writers: Vec<Box<dyn LogWriter>>,
    secret_tracing: bool,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("writers", &self.writers.len())
            .field("secret_tracing", &self.secret_tracing)
            .finish()
    }
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a writer. Writers are never de-duplicated.
    pub fn add_writer(&mut self, writer: impl LogWriter + 'static) {
        self.writers.push(Box::new(writer));
    }

    pub fn has_writers(&self) -> bool {
        !self.writers.is_empty()
    }

    pub fn set_secret_tracing(&mut self, enabled: bool) {
        self.secret_tracing = enabled;
    }

    pub fn is_secret_tracing_enabled(&self) -> bool {
        self.secret_tracing
    }

    /// Trace a message, tagged with the caller's source location.
    #[track_caller]
    pub fn log(&self, message: &str) {
        let caller = Location::caller();
        self.log_at(message, caller.file(), caller.line());
    }

    /// Trace a message with an explicit source location.
    pub fn log_at(&self, message: &str, file: &str, line: u32) {
        if self.writers.is_empty() {
            return;
        }

        let text = format_line(message, file, line);
        for writer in &self.writers {
            if let Err(e) = writer.write_message(&text) {
                log::debug!("trace writer failed: {e}");
            }
        }
    }

    /// Trace a message, appending `secret` only when secret tracing is enabled.
    ///
    /// With secret tracing disabled the emitted line is identical to
    /// [`Logger::log`] with the same message.
    #[track_caller]
    pub fn log_secret(&self, message: &str, secret: &str) {
        let caller = Location::caller();
        self.log_secret_at(message, secret, caller.file(), caller.line());
    }

    pub fn log_secret_at(&self, message: &str, secret: &str, file: &str, line: u32) {
        if self.secret_tracing {
            let message = format!("{message}{SECRET_SEPARATOR}{secret}");
            self.log_at(&message, file, line);
        } else {
            self.log_at(message, file, line);
        }
    }

    /// Trace a format string whose `{}` placeholders are filled with `secrets`,
    /// or with [`SECRET_MASK`] when secret tracing is disabled.
    #[track_caller]
    pub fn log_secrets(&self, format: &str, secrets: &[&str]) {
        let caller = Location::caller();
        let message = if self.secret_tracing {
            fill_placeholders(format, secrets.iter().copied())
        } else {
            fill_placeholders(format, secrets.iter().map(|_| SECRET_MASK))
        };
        self.log_at(&message, caller.file(), caller.line());
    }

    /// Trace every entry of a dictionary, one `\tkey=value` line each, sorted by key.
    #[track_caller]
    pub fn log_dictionary(&self, dict: &HashMap<String, String>) {
        let caller = Location::caller();
        for (key, value) in sorted_entries(dict) {
            self.log_at(&format!("\t{key}={value}"), caller.file(), caller.line());
        }
    }

    /// Like [`Logger::log_dictionary`], masking the values of `secret_keys`
    /// unless secret tracing is enabled.
    #[track_caller]
    pub fn log_dictionary_secrets(&self, dict: &HashMap<String, String>, secret_keys: &[&str]) {
        let caller = Location::caller();
        for (key, value) in sorted_entries(dict) {
            let masked = !self.secret_tracing && secret_keys.contains(&key.as_str());
            let value = if masked { SECRET_MASK } else { value.as_str() };
            self.log_at(&format!("\t{key}={value}"), caller.file(), caller.line());
        }
    }

    /// Trace an error followed by each error in its `source()` chain.
    #[track_caller]
    pub fn log_error(&self, error: &(dyn std::error::Error + 'static)) {
        let caller = Location::caller();
        self.log_at(
            &format!("! error: '{error}'."),
            caller.file(),
            caller.line(),
        );

        let mut source = error.source();
        while let Some(inner) = source {
            self.log_at(
                &format!("       > '{inner}'."),
                caller.file(),
                caller.line(),
            );
            source = inner.source();
        }
    }
}

fn format_line(message: &str, file: &str, line: u32) -> String {
    let timestamp = Local::now().format(TIMESTAMP_FORMAT);
    let source = format_source(file, line);
    format!("{timestamp} {source:<width$} trace: {message}", width = SOURCE_COLUMN_WIDTH)
}

/// `file:line` using only the file name, shortened from the left to fit the column.
fn format_source(file: &str, line: u32) -> String {
    let file_name = Path::new(file)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(file);
    let source = format!("{file_name}:{line}");

    let len = source.chars().count();
    if len <= SOURCE_COLUMN_WIDTH {
        return source;
    }

    let keep = SOURCE_COLUMN_WIDTH - 3;
    let tail: String = source.chars().skip(len - keep).collect();
    format!("...{tail}")
}

fn fill_placeholders<'a>(format: &str, mut values: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::with_capacity(format.len());
    let mut rest = format;

    while let Some(pos) = rest.find("{}") {
        let Some(value) = values.next() else {
            break;
        };
        out.push_str(&rest[..pos]);
        out.push_str(value);
        rest = &rest[pos + 2..];
    }

    out.push_str(rest);
    out
}

fn sorted_entries(dict: &HashMap<String, String>) -> Vec<(&String, &String)> {
    let mut entries: Vec<_> = dict.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}
