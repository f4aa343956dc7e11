//! Persistent state locations

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the frontier and the corpus live on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root data directory
    pub data_dir: PathBuf,
}

impl StorageConfig {
    /// Directory holding the pending queue, crawled set and domain timings
    pub fn frontier_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    /// Directory holding one JSON record per accepted page
    pub fn corpus_dir(&self) -> PathBuf {
        self.data_dir.join("processed")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}
