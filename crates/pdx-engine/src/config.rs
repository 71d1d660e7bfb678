//! Engine configuration.
//!
//! The shape is camelCase JSON so an editor can pass it straight through as
//! initialization options.

use std::path::{Path, PathBuf};

use pdx_index::{ExtractionRule, ScanOptions};
use serde::Deserialize;
use tracing::{debug, info};

use crate::debounce::{DebounceConfig, DebouncePolicy};

/// Binds documents whose uri matches `pattern` to the schema named `schema`.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SchemaBinding {
    pub pattern: String,
    pub schema: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub debounce: DebounceConfig,
    /// Parsed documents kept in the content-hash cache.
    pub cache_capacity: usize,
    /// Concurrent analysis jobs; 0 uses the number of cores.
    pub workers: usize,
    pub scan_batch_size: usize,
    /// File extensions indexed by workspace scans.
    pub extensions: Vec<String>,
    /// Checked in order; the first matching binding wins.
    pub schemas: Vec<SchemaBinding>,
    pub extraction: Vec<ExtractionRule>,
    /// Report reference fields whose target is not indexed.
    pub check_references: bool,
    /// Report definitions that lose to an earlier definition of the same symbol.
    pub check_duplicates: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce: DebounceConfig::default(),
            cache_capacity: 256,
            workers: 0,
            scan_batch_size: 64,
            extensions: vec!["txt".to_string()],
            schemas: Vec::new(),
            extraction: Vec::new(),
            check_references: true,
            check_duplicates: true,
        }
    }
}

/// Error loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid engine configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "loading engine config");
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&json)?;
        info!(
            path = %path.display(),
            schemas = config.schemas.len(),
            extraction_rules = config.extraction.len(),
            "loaded engine config"
        );
        Ok(config)
    }

    pub fn debounce_policy(&self) -> DebouncePolicy {
        DebouncePolicy::new(&self.debounce)
    }

    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        }
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            extensions: self.extensions.clone(),
            batch_size: self.scan_batch_size,
            workers: self.workers,
            ..ScanOptions::default()
        }
    }
}
