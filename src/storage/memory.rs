//! In-memory storage implementation for tests and non-durable indexes.

use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::storage::{Storage, StorageError, StorageInput, StorageLock, StorageOutput};

type FileMap = Arc<Mutex<HashMap<String, Arc<[u8]>>>>;

/// An in-memory storage implementation.
///
/// Files become visible when their output is synced or dropped. Inputs hold a
/// reference-counted copy of the bytes, so deleting or replacing a file never
/// disturbs an open reader.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: FileMap,
    locks: Arc<Mutex<HashSet<String>>>,
}

impl MemoryStorage {
    /// Create a new, empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of files stored.
    pub fn file_count(&self) -> usize {
        self.files.lock().len()
    }

    /// Get the total size of all files.
    pub fn total_size(&self) -> u64 {
        self.files.lock().values().map(|data| data.len() as u64).sum()
    }
}

impl Storage for MemoryStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let files = self.files.lock();
        let data = files
            .get(name)
            .ok_or_else(|| StorageError::FileNotFound(name.to_string()))?;

        Ok(Box::new(MemoryInput {
            cursor: Cursor::new(Arc::clone(data)),
        }))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        Ok(Box::new(MemoryOutput {
            name: name.to_string(),
            buffer: Vec::new(),
            files: Arc::clone(&self.files),
        }))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.files.lock().contains_key(name)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.files.lock().remove(name);
        Ok(())
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.files.lock().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn file_size(&self, name: &str) -> Result<u64> {
        let files = self.files.lock();
        let data = files
            .get(name)
            .ok_or_else(|| StorageError::FileNotFound(name.to_string()))?;
        Ok(data.len() as u64)
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        let mut files = self.files.lock();
        let data = files
            .remove(old_name)
            .ok_or_else(|| StorageError::FileNotFound(old_name.to_string()))?;
        files.insert(new_name.to_string(), data);
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }

    fn acquire_lock(&self, name: &str) -> Result<Box<dyn StorageLock>> {
        let mut locks = self.locks.lock();
        if !locks.insert(name.to_string()) {
            return Err(StorageError::LockFailed(name.to_string()).into());
        }

        Ok(Box::new(MemoryLock {
            name: name.to_string(),
            locks: Arc::clone(&self.locks),
            released: false,
        }))
    }

    fn lock_exists(&self, name: &str) -> bool {
        self.locks.lock().contains(name)
    }

    fn break_lock(&self, name: &str) -> Result<()> {
        self.locks.lock().remove(name);
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }
}

/// A memory-based input implementation.
#[derive(Debug)]
pub struct MemoryInput {
    cursor: Cursor<Arc<[u8]>>,
}

impl Read for MemoryInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for MemoryInput {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl StorageInput for MemoryInput {
    fn size(&self) -> Result<u64> {
        Ok(self.cursor.get_ref().len() as u64)
    }
}

/// A memory-based output implementation.
#[derive(Debug)]
pub struct MemoryOutput {
    name: String,
    buffer: Vec<u8>,
    files: FileMap,
}

impl MemoryOutput {
    fn publish(&mut self) {
        let data: Arc<[u8]> = Arc::from(self.buffer.as_slice());
        self.files.lock().insert(self.name.clone(), data);
    }
}

impl Write for MemoryOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl StorageOutput for MemoryOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        self.publish();
        Ok(())
    }

    fn position(&self) -> u64 {
        self.buffer.len() as u64
    }
}

impl Drop for MemoryOutput {
    fn drop(&mut self) {
        self.publish();
    }
}

#[derive(Debug)]
struct MemoryLock {
    name: String,
    locks: Arc<Mutex<HashSet<String>>>,
    released: bool,
}

impl StorageLock for MemoryLock {
    fn name(&self) -> &str {
        &self.name
    }

    fn release(&mut self) -> Result<()> {
        if !self.released {
            self.locks.lock().remove(&self.name);
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for MemoryLock {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();

        let mut output = storage.create_output("test.bin").unwrap();
        output.write_all(b"Hello").unwrap();
        output.flush_and_sync().unwrap();
        drop(output);

        assert!(storage.file_exists("test.bin"));
        assert_eq!(storage.file_count(), 1);
        assert_eq!(storage.total_size(), 5);

        let mut input = storage.open_input("test.bin").unwrap();
        let mut buffer = Vec::new();
        input.read_to_end(&mut buffer).unwrap();
        assert_eq!(buffer, b"Hello");
    }

    #[test]
    fn test_open_input_survives_delete() {
        let storage = MemoryStorage::new();
        crate::storage::write_all(&storage, "a", b"abc").unwrap();

        let mut input = storage.open_input("a").unwrap();
        storage.delete_file("a").unwrap();

        let mut buffer = Vec::new();
        input.read_to_end(&mut buffer).unwrap();
        assert_eq!(buffer, b"abc");
        assert!(!storage.file_exists("a"));
    }

    #[test]
    fn test_rename_and_list() {
        let storage = MemoryStorage::new();
        crate::storage::write_all(&storage, "b.tmp", b"1").unwrap();
        crate::storage::write_all(&storage, "a", b"2").unwrap();

        storage.rename_file("b.tmp", "b").unwrap();
        assert_eq!(storage.list_files().unwrap(), vec!["a", "b"]);
        assert!(storage.rename_file("missing", "c").is_err());
    }

    #[test]
    fn test_lock_is_exclusive() {
        let storage = MemoryStorage::new();
        let lock = storage.acquire_lock("writer").unwrap();
        assert!(storage.acquire_lock("writer").is_err());
        drop(lock);
        assert!(storage.acquire_lock("writer").is_ok());
    }

    #[test]
    fn test_break_lock() {
        let storage = MemoryStorage::new();
        let _held = storage.acquire_lock("writer").unwrap();
        assert!(storage.lock_exists("writer"));

        storage.break_lock("writer").unwrap();
        assert!(!storage.lock_exists("writer"));
        assert!(storage.acquire_lock("writer").is_ok());
    }
}
