//! Per-transfer audit log.
//!
//! Each accepted START appends an entry recording the remote source path and
//! the destination-path length, under a folder named for the local wall
//! clock. Recording is best-effort: a failed write must never abort the
//! decode.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use chrono::{Datelike, Local, Timelike};
use tracing::warn;

pub struct TransferLog {
    root: PathBuf,
}

impl TransferLog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Record the start of a transfer. Failures are logged and swallowed.
    pub fn record(&self, source_path: &[u8], dest_path_len: u8) {
        if let Err(err) = self.try_record(source_path, dest_path_len) {
            warn!(error = %err, "Failed to write transfer log entry");
        }
    }

    fn try_record(&self, source_path: &[u8], dest_path_len: u8) -> io::Result<()> {
        let now = Local::now();
        let dir = self.root.join(format!(
            "{}_{}_{}_{}_{}",
            now.year(),
            now.month(),
            now.day(),
            now.hour(),
            now.minute()
        ));
        fs::create_dir_all(&dir)?;

        // Transfers starting within the same minute share a log file.
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(dir.join("log_file"))?;
        writeln!(
            file,
            "Source Path: {}",
            String::from_utf8_lossy(source_path)
        )?;
        writeln!(file, "Destination Size: {}", dest_path_len)?;
        file.flush()
    }
}
