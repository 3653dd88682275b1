//! Decoder configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::protocol::constants::{DEFAULT_DOWNLINK_DIR, DEFAULT_LOG_DIR, DEFAULT_TIMEOUT_SECS};

/// Configuration for a [`FileDecoder`](crate::decoder::FileDecoder).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Seconds without a packet before the active transfer is reset.
    pub timeout_secs: f64,
    /// Root directory for reconstructed files.
    pub downlink_dir: PathBuf,
    /// Root directory for per-transfer audit logs.
    pub log_dir: PathBuf,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            downlink_dir: PathBuf::from(DEFAULT_DOWNLINK_DIR),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl DecoderConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DecoderConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }
}
