//! Trace sinks.
//!
//! A [`LogWriter`] persists or displays one already-formatted trace line. The
//! [`Logger`](crate::trace::Logger) owns an ordered list of writers and hands
//! each of them every line it formats.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// A sink for formatted trace lines.
pub trait LogWriter: Send + Sync {
    /// Write a single line. The writer appends its own line terminator.
    fn write_message(&self, text: &str) -> io::Result<()>;
}

/// Writes trace lines to the process standard error stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardErrorWriter;

impl StandardErrorWriter {
    pub fn new() -> Self {
        Self
    }
}

impl LogWriter for StandardErrorWriter {
    fn write_message(&self, text: &str) -> io::Result<()> {
        let mut stderr = io::stderr().lock();
        stderr.write_all(text.as_bytes())?;
        stderr.write_all(b"\n")?;
        stderr.flush()
    }
}

/// Appends trace lines to a file.
///
/// The file is opened in append mode for every line and closed again, so a
/// log that is rotated or removed between writes is simply re-created.
#[derive(Debug, Clone)]
pub struct FileWriter {
    path: PathBuf,
}

impl FileWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogWriter for FileWriter {
    fn write_message(&self, text: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        // Single write so concurrent appenders cannot split a line
        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');
        file.write_all(line.as_bytes())?;
        file.flush()
    }
}

/// Collects trace lines in memory.
///
/// Clones share the same buffer, so a clone can be registered with a logger
/// while the original is kept to inspect what was written.
#[derive(Debug, Default, Clone)]
pub struct MemoryWriter {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every line written so far, in order.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// All lines joined with `\n`.
    pub fn contents(&self) -> String {
        self.lines().join("\n")
    }
}

impl LogWriter for MemoryWriter {
    fn write_message(&self, text: &str) -> io::Result<()> {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.to_string());
        Ok(())
    }
}
