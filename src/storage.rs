//! Storage abstraction layer for Quiver.
//!
//! Segments, tombstones and manifests are written through the [`Storage`]
//! trait so the index code never touches `std::fs` directly. Two backends are
//! provided:
//!
//! - [`file::FileStorage`]: a directory on disk, with fsync barriers and a
//!   lock file guarding the single writer.
//! - [`memory::MemoryStorage`]: a map of byte buffers; durability calls are
//!   no-ops.
//!
//! # Example
//!
//! ```
//! use std::io::Write;
//!
//! use quiver::storage::{StorageConfig, StorageFactory};
//!
//! # fn main() -> quiver::error::Result<()> {
//! let storage = StorageFactory::create(&StorageConfig::Memory)?;
//! let mut out = storage.create_output("hello.bin")?;
//! out.write_all(b"hi")?;
//! out.flush_and_sync()?;
//! drop(out);
//! assert_eq!(storage.file_size("hello.bin")?, 2);
//! # Ok(())
//! # }
//! ```

use std::io::{Read, Seek, Write};
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{QuiverError, Result};

pub mod file;
pub mod memory;
pub mod structured;

/// A trait for storage backends that can store and retrieve named files.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Open a file for reading.
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>>;

    /// Create (or truncate) a file for writing.
    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>>;

    /// Check if a file exists.
    fn file_exists(&self, name: &str) -> bool;

    /// Delete a file. Deleting a missing file is not an error.
    fn delete_file(&self, name: &str) -> Result<()>;

    /// List all files in the storage, sorted by name.
    fn list_files(&self) -> Result<Vec<String>>;

    /// Get the size of a file in bytes.
    fn file_size(&self, name: &str) -> Result<u64>;

    /// Atomically rename a file, replacing any existing target.
    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()>;

    /// Make completed renames and deletions durable.
    fn sync(&self) -> Result<()>;

    /// Acquire an exclusive named lock. Fails if the lock is already held.
    fn acquire_lock(&self, name: &str) -> Result<Box<dyn StorageLock>>;

    /// Check whether the named lock is currently held.
    fn lock_exists(&self, name: &str) -> bool;

    /// Forcibly remove the named lock, e.g. one left behind by a crashed
    /// process. Removing a lock that is not held is not an error.
    fn break_lock(&self, name: &str) -> Result<()>;

    /// Whether writes through this storage survive the process.
    fn is_durable(&self) -> bool;
}

/// A trait for reading data from storage.
pub trait StorageInput: Read + Seek + Send + std::fmt::Debug {
    /// Get the size of the input stream.
    fn size(&self) -> Result<u64>;
}

/// A trait for writing data to storage.
pub trait StorageOutput: Write + Send + std::fmt::Debug {
    /// Flush buffered bytes and sync the output to stable storage.
    fn flush_and_sync(&mut self) -> Result<()>;

    /// Get the number of bytes written so far.
    fn position(&self) -> u64;
}

impl StorageOutput for Box<dyn StorageOutput> {
    fn flush_and_sync(&mut self) -> Result<()> {
        self.as_mut().flush_and_sync()
    }

    fn position(&self) -> u64 {
        self.as_ref().position()
    }
}

impl StorageInput for Box<dyn StorageInput> {
    fn size(&self) -> Result<u64> {
        self.as_ref().size()
    }
}

/// An exclusive lock on a resource in storage, released on drop.
pub trait StorageLock: Send + Sync + std::fmt::Debug {
    /// Get the name of the lock.
    fn name(&self) -> &str;

    /// Release the lock. Releasing twice is a no-op.
    fn release(&mut self) -> Result<()>;
}

/// Error types specific to storage operations.
#[derive(Debug, Clone)]
pub enum StorageError {
    /// File not found.
    FileNotFound(String),

    /// I/O error.
    IoError(String),

    /// Lock acquisition failed.
    LockFailed(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::FileNotFound(name) => write!(f, "File not found: {name}"),
            StorageError::IoError(msg) => write!(f, "I/O error: {msg}"),
            StorageError::LockFailed(name) => write!(f, "Failed to acquire lock: {name}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for QuiverError {
    fn from(err: StorageError) -> Self {
        QuiverError::storage(err.to_string())
    }
}

/// Where the index keeps its files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    /// A directory on the local filesystem.
    File {
        /// Directory holding segments, tombstones and manifests.
        path: PathBuf,
    },
    /// Process-local memory; nothing is persisted.
    Memory,
}

/// Builds storage backends from a [`StorageConfig`].
#[derive(Debug)]
pub struct StorageFactory;

impl StorageFactory {
    /// Create the storage described by `config`.
    pub fn create(config: &StorageConfig) -> Result<Arc<dyn Storage>> {
        match config {
            StorageConfig::File { path } => Ok(Arc::new(file::FileStorage::new(path)?)),
            StorageConfig::Memory => Ok(Arc::new(memory::MemoryStorage::new())),
        }
    }
}

/// Read a whole file into memory.
pub fn read_all(storage: &dyn Storage, name: &str) -> Result<Vec<u8>> {
    let mut input = storage.open_input(name)?;
    let mut buffer = Vec::with_capacity(input.size()? as usize);
    input.read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// Write `data` to `name` and sync it.
pub fn write_all(storage: &dyn Storage, name: &str, data: &[u8]) -> Result<()> {
    let mut output = storage.create_output(name)?;
    output.write_all(data)?;
    output.flush_and_sync()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::FileNotFound("test.txt".to_string());
        assert_eq!(err.to_string(), "File not found: test.txt");

        let err: QuiverError = StorageError::LockFailed("writer".to_string()).into();
        assert!(matches!(err, QuiverError::Storage(_)));
    }

    #[test]
    fn test_read_write_helpers() {
        let storage = StorageFactory::create(&StorageConfig::Memory).unwrap();
        write_all(storage.as_ref(), "a.bin", b"abc").unwrap();
        assert_eq!(read_all(storage.as_ref(), "a.bin").unwrap(), b"abc");
        assert!(!storage.is_durable());
    }

    #[test]
    fn test_storage_config_serde() {
        let config = StorageConfig::File {
            path: PathBuf::from("/tmp/idx"),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"type\":\"file\""));
        let back: StorageConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
