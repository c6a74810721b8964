//! Index configuration.
//!
//! ```
//! use quiver::index::config::Config;
//!
//! let config = Config::in_memory()
//!     .with_auto_commit(false)
//!     .with_max_buffered_docs(500);
//! assert!(config.validate().is_ok());
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::analysis::analyzer::Analyzer;
use crate::analysis::analyzer::standard::StandardAnalyzer;
use crate::error::{QuiverError, Result};
use crate::storage::StorageConfig;

/// Writer behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Commit after every update, delete or batch.
    pub auto_commit: bool,

    /// Commit once this many documents are buffered.
    pub max_buffered_docs: usize,

    /// Merge all segments into one once a commit leaves more than this many.
    /// Zero disables merging.
    pub merge_threshold: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            auto_commit: true,
            max_buffered_docs: 10_000,
            merge_threshold: 10,
        }
    }
}

fn default_analyzer() -> Arc<dyn Analyzer> {
    Arc::new(StandardAnalyzer::new())
}

/// Everything needed to open an index.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where segments and manifests live.
    pub storage: StorageConfig,

    /// Writer behaviour.
    #[serde(default)]
    pub writer: WriterConfig,

    /// Analyzer applied to text fields and match queries.
    #[serde(skip, default = "default_analyzer")]
    pub analyzer: Arc<dyn Analyzer>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("storage", &self.storage)
            .field("writer", &self.writer)
            .field("analyzer", &self.analyzer.name())
            .finish()
    }
}

impl Config {
    /// File-backed index in `path`, with default options.
    pub fn default_config<P: Into<PathBuf>>(path: P) -> Self {
        Self::with_storage(StorageConfig::File { path: path.into() })
    }

    /// Non-durable index held in memory.
    pub fn in_memory() -> Self {
        Self::with_storage(StorageConfig::Memory)
    }

    fn with_storage(storage: StorageConfig) -> Self {
        Config {
            storage,
            writer: WriterConfig::default(),
            analyzer: default_analyzer(),
        }
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            QuiverError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Config = serde_json::from_slice(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Set auto-commit.
    pub fn with_auto_commit(mut self, auto_commit: bool) -> Self {
        self.writer.auto_commit = auto_commit;
        self
    }

    /// Set the buffered document limit.
    pub fn with_max_buffered_docs(mut self, max_buffered_docs: usize) -> Self {
        self.writer.max_buffered_docs = max_buffered_docs;
        self
    }

    /// Set the segment count that triggers a merge.
    pub fn with_merge_threshold(mut self, merge_threshold: usize) -> Self {
        self.writer.merge_threshold = merge_threshold;
        self
    }

    /// Replace the text analyzer.
    pub fn with_analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Check the options are usable.
    pub fn validate(&self) -> Result<()> {
        if let StorageConfig::File { path } = &self.storage {
            if path.as_os_str().is_empty() {
                return Err(QuiverError::config("storage path must not be empty"));
            }
            if path.exists() && !path.is_dir() {
                return Err(QuiverError::config(format!(
                    "storage path {} is not a directory",
                    path.display()
                )));
            }
        }
        if self.writer.max_buffered_docs == 0 {
            return Err(QuiverError::config("max_buffered_docs must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default_config("/tmp/quiver-test");
        assert!(config.writer.auto_commit);
        assert_eq!(config.writer.max_buffered_docs, 10_000);
        assert_eq!(config.analyzer.name(), "standard");
    }

    #[test]
    fn test_validate_paths() {
        assert!(matches!(
            Config::default_config("").validate(),
            Err(QuiverError::Config(_))
        ));

        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(
            Config::default_config(&file).validate(),
            Err(QuiverError::Config(_))
        ));
        assert!(Config::default_config(dir.path()).validate().is_ok());
        assert!(Config::in_memory().with_max_buffered_docs(0).validate().is_err());
    }

    #[test]
    fn test_from_json_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quiver.json");
        std::fs::write(
            &path,
            r#"{"storage": {"type": "memory"}, "writer": {"auto_commit": false}}"#,
        )
        .unwrap();

        let config = Config::from_json_file(&path).unwrap();
        assert_eq!(config.storage, StorageConfig::Memory);
        assert!(!config.writer.auto_commit);
        assert_eq!(config.writer.merge_threshold, 10);

        assert!(Config::from_json_file(dir.path().join("missing.json")).is_err());
    }
}
