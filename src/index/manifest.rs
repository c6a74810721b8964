//! The manifest: the authoritative list of live segments.
//!
//! Each commit writes a new `manifest_<generation>.json`. Publication:
//!
//! 1. segment and tombstone files are written and fsynced;
//! 2. the manifest is written to a `.tmp` file and fsynced;
//! 3. the temp file is renamed into place and the directory is synced.
//!
//! The highest generation present on storage is the current manifest.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{QuiverError, Result};
use crate::storage::{Storage, read_all, write_all};

const MANIFEST_PREFIX: &str = "manifest_";
const MANIFEST_SUFFIX: &str = ".json";

/// Manifest entry for a segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentEntry {
    /// Segment name (file stem).
    pub name: String,
    /// Documents in the segment, live or deleted.
    pub doc_count: u32,
    /// Generation of the segment's tombstone file; 0 when nothing is deleted.
    pub tombstone_generation: u64,
}

/// One published version of the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Manifest format version.
    pub version: u32,
    /// Generation number, incremented by every commit.
    pub generation: u64,
    /// Sequence number for the next segment name.
    pub next_segment: u64,
    /// Live segments in publication order.
    pub segments: Vec<SegmentEntry>,
    /// When this generation was committed.
    pub committed_at: DateTime<Utc>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    /// Current manifest format version.
    pub const VERSION: u32 = 1;

    /// Generation 0: no segments, never written.
    pub fn new() -> Self {
        Manifest {
            version: Self::VERSION,
            generation: 0,
            next_segment: 1,
            segments: Vec::new(),
            committed_at: Utc::now(),
        }
    }

    /// Allocate a name for a new segment.
    pub fn allocate_segment_name(&mut self) -> String {
        let name = format!("seg_{:010}", self.next_segment);
        self.next_segment += 1;
        name
    }

    /// Total documents across segments, live or deleted.
    pub fn total_doc_count(&self) -> u64 {
        self.segments.iter().map(|e| e.doc_count as u64).sum()
    }

    /// File name of a generation.
    pub fn file_name(generation: u64) -> String {
        format!("{MANIFEST_PREFIX}{generation:010}{MANIFEST_SUFFIX}")
    }

    /// Generation encoded in a manifest file name.
    pub fn parse_generation(file: &str) -> Option<u64> {
        file.strip_prefix(MANIFEST_PREFIX)?
            .strip_suffix(MANIFEST_SUFFIX)?
            .parse()
            .ok()
    }

    /// Publish this manifest durably. On failure, nothing new is left behind
    /// and the previous generation stays current.
    pub fn save(&self, storage: &dyn Storage) -> Result<()> {
        let name = Self::file_name(self.generation);
        let tmp = format!("{name}.tmp");
        let data = serde_json::to_vec_pretty(self)?;

        let published = write_all(storage, &tmp, &data)
            .and_then(|()| storage.rename_file(&tmp, &name))
            .and_then(|()| storage.sync());
        if let Err(e) = published {
            for file in [&tmp, &name] {
                if let Err(cleanup) = storage.delete_file(file) {
                    warn!("failed to remove {file} after failed publish: {cleanup}");
                }
            }
            return Err(e);
        }

        debug!(
            "published manifest generation {} with {} segments",
            self.generation,
            self.segments.len()
        );
        Ok(())
    }

    /// Load the highest generation on storage, if any.
    pub fn load_latest(storage: &dyn Storage) -> Result<Option<Self>> {
        let latest = storage
            .list_files()?
            .iter()
            .filter_map(|file| Self::parse_generation(file))
            .max();

        let Some(generation) = latest else {
            return Ok(None);
        };

        let name = Self::file_name(generation);
        let manifest: Manifest = serde_json::from_slice(&read_all(storage, &name)?)
            .map_err(|e| QuiverError::corruption(format!("{name}: {e}")))?;
        if manifest.generation != generation {
            return Err(QuiverError::corruption(format!(
                "{name} claims generation {}",
                manifest.generation
            )));
        }
        if manifest.version != Self::VERSION {
            return Err(QuiverError::corruption(format!(
                "{name}: unsupported version {}",
                manifest.version
            )));
        }
        Ok(Some(manifest))
    }

    /// Names of every file this manifest references.
    pub fn referenced_files(&self) -> Vec<String> {
        let mut files = vec![Self::file_name(self.generation)];
        for entry in &self.segments {
            files.push(crate::segment::index_file_name(&entry.name));
            files.push(crate::segment::stored_file_name(&entry.name));
            if entry.tombstone_generation > 0 {
                files.push(crate::segment::Tombstones::file_name(
                    &entry.name,
                    entry.tombstone_generation,
                ));
            }
        }
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;

    #[test]
    fn test_file_names() {
        assert_eq!(Manifest::file_name(7), "manifest_0000000007.json");
        assert_eq!(Manifest::parse_generation("manifest_0000000007.json"), Some(7));
        assert_eq!(Manifest::parse_generation("manifest_0000000007.json.tmp"), None);
        assert_eq!(Manifest::parse_generation("seg_0000000001.idx"), None);
    }

    #[test]
    fn test_save_and_load_latest() {
        let storage = MemoryStorage::new();
        assert!(Manifest::load_latest(&storage).unwrap().is_none());

        let mut manifest = Manifest::new();
        manifest.generation = 1;
        let name = manifest.allocate_segment_name();
        assert_eq!(name, "seg_0000000001");
        manifest.segments.push(SegmentEntry {
            name,
            doc_count: 3,
            tombstone_generation: 2,
        });
        manifest.save(&storage).unwrap();

        let mut next = manifest.clone();
        next.generation = 2;
        next.save(&storage).unwrap();

        let loaded = Manifest::load_latest(&storage).unwrap().unwrap();
        assert_eq!(loaded, next);
        assert!(!storage.file_exists("manifest_0000000002.json.tmp"));
        assert!(
            loaded
                .referenced_files()
                .contains(&"seg_0000000001_2.del".to_string())
        );
    }

    #[test]
    fn test_corrupt_manifest() {
        let storage = MemoryStorage::new();
        write_all(&storage, &Manifest::file_name(3), b"{not json").unwrap();
        assert!(matches!(
            Manifest::load_latest(&storage),
            Err(QuiverError::Corruption(_))
        ));
    }
}
