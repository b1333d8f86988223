//! Worker pool, store and link-list configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Worker pool configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Worker threads; 0 means one per available CPU
    #[serde(default)]
    pub workers: usize,
    /// How many times a task whose worker crashed is requeued (0 = never)
    #[serde(default)]
    pub crash_retries: u32,
}

impl PoolConfig {
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// Entity store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the store and run reports
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Records per write batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Clear the store before a run
    #[serde(default)]
    pub drop_existing: bool,
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "egrul-ingest")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".egrul-ingest"))
}

fn default_batch_size() -> usize {
    1000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            batch_size: default_batch_size(),
            drop_existing: false,
        }
    }
}

/// Link-list writer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksConfig {
    /// Base URL every entity link is joined onto
    #[serde(default = "default_hostname")]
    pub hostname: String,
    #[serde(default = "default_links_dir")]
    pub output_dir: PathBuf,
    /// Links per output file
    #[serde(default = "default_file_size")]
    pub file_size: usize,
}

fn default_hostname() -> String {
    "https://example.org/".to_string()
}

fn default_links_dir() -> PathBuf {
    PathBuf::from("links")
}

fn default_file_size() -> usize {
    50_000
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            output_dir: default_links_dir(),
            file_size: default_file_size(),
        }
    }
}
