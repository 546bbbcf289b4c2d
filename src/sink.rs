//! Destinations a [`StatusPublisher`](crate::publisher::StatusPublisher) persists to.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use status_model::Status;

use crate::error::{Error, Result};

/// Something that can durably record the current status.
///
/// Called only from the publisher's worker thread. A failed call is retried
/// by the worker with whatever status is current at that point.
pub trait StatusSink: Send + 'static {
    fn publish(&mut self, status: &Status) -> Result<()>;

    /// Human readable location, used in log fields.
    fn describe(&self) -> String;
}

/// Replaces the whole content of a file with the serialized status.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatusSink for FileSink {
    fn publish(&mut self, status: &Status) -> Result<()> {
        write_replacing(&self.path, status.value().as_bytes()).map_err(|source| Error::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn describe(&self) -> String {
        self.path().display().to_string()
    }
}

fn write_replacing(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(contents)?;
    file.sync_data()
}
