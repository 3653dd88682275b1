//! Destination-file management under the downlink root.
//!
//! Remote-supplied destination paths are untrusted: leading path separators
//! are stripped so the file always lands under the configured root, and
//! intermediate directories are created on demand.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Factory for destination files, rooted at the downlink directory.
#[derive(Debug, Clone)]
pub struct DownlinkStorage {
    root: PathBuf,
}

impl DownlinkStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create (or truncate) the destination file for a new transfer.
    ///
    /// The remote path is decoded lossily, stripped of leading separators,
    /// and resolved under the root. Parent directories are created as
    /// needed.
    pub fn create_dest_file(&self, dest_path: &[u8]) -> io::Result<DestFile> {
        let relative = String::from_utf8_lossy(dest_path);
        let relative = relative.trim_start_matches(['/', '\\']);
        let path = self.root.join(relative);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        Ok(DestFile { file, path })
    }
}

/// An open destination file. Dropping it closes the handle.
#[derive(Debug)]
pub struct DestFile {
    file: File,
    path: PathBuf,
}

impl DestFile {
    /// Write `payload` starting at `offset`, growing the file if needed,
    /// and flush before returning.
    pub fn write_at(&mut self, offset: u32, payload: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(u64::from(offset)))?;
        self.file.write_all(payload)?;
        self.file.flush()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
