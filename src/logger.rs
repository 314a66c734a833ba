#![forbid(unsafe_code)]

//! Error log shared by the pipeline components. Each component owns one
//! `ErrorLog` pointing at its own file; only error-level lines are ever
//! written, in the form `YYYY-MM-DD HH:MM:SS - ERROR - message`.

use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Append-only error log bound to a single file. The file and its containing
/// directory are created lazily on the first write, so constructing a logger
/// for a component that never fails leaves no trace on disk.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one timestamped line. Logging must never take the pipeline
    /// down, so write failures degrade to stderr instead of propagating.
    pub fn error(&self, message: &str) {
        let line = format!(
            "{} - ERROR - {}\n",
            Utc::now().format(TIMESTAMP_FORMAT),
            message
        );
        if let Err(err) = self.append(&line) {
            eprintln!(
                "Warning: could not write to {}: {err} (message was: {message})",
                self.path.display()
            );
        }
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}
