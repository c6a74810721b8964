//! File-based storage implementation.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::{QuiverError, Result};
use crate::storage::{Storage, StorageError, StorageInput, StorageLock, StorageOutput};

const BUFFER_SIZE: usize = 64 * 1024;

/// A file-based storage implementation rooted at one directory.
#[derive(Debug)]
pub struct FileStorage {
    /// The root directory for storage.
    directory: PathBuf,
}

impl FileStorage {
    /// Open (creating if needed) file storage in the given directory.
    pub fn new<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();

        if directory.as_os_str().is_empty() {
            return Err(QuiverError::config("storage path must not be empty"));
        }

        if directory.exists() && !directory.is_dir() {
            return Err(QuiverError::config(format!(
                "Path is not a directory: {}",
                directory.display()
            )));
        }

        if !directory.exists() {
            std::fs::create_dir_all(&directory).map_err(|e| {
                QuiverError::config(format!(
                    "Failed to create directory {}: {e}",
                    directory.display()
                ))
            })?;
        }

        Ok(FileStorage { directory })
    }

    /// The directory this storage writes into.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }
}

fn map_io(name: &str, e: std::io::Error) -> QuiverError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StorageError::FileNotFound(name.to_string()).into()
    } else {
        StorageError::IoError(format!("{name}: {e}")).into()
    }
}

impl Storage for FileStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let file = File::open(self.file_path(name)).map_err(|e| map_io(name, e))?;
        Ok(Box::new(FileInput::new(file)?))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.file_path(name))
            .map_err(|e| map_io(name, e))?;

        Ok(Box::new(FileOutput::new(file)))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.file_path(name).exists()
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        match std::fs::remove_file(self.file_path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(map_io(name, e)),
        }
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();

        for entry in
            std::fs::read_dir(&self.directory).map_err(|e| StorageError::IoError(e.to_string()))?
        {
            let entry = entry.map_err(|e| StorageError::IoError(e.to_string()))?;
            let path = entry.path();

            if path.is_file() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    files.push(name.to_string());
                }
            }
        }

        files.sort();
        Ok(files)
    }

    fn file_size(&self, name: &str) -> Result<u64> {
        let metadata = self
            .file_path(name)
            .metadata()
            .map_err(|e| map_io(name, e))?;
        Ok(metadata.len())
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        std::fs::rename(self.file_path(old_name), self.file_path(new_name))
            .map_err(|e| StorageError::IoError(format!("Failed to rename {old_name}: {e}")))?;
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        // Directory fsync makes renames and unlinks durable; not supported on Windows.
        #[cfg(unix)]
        {
            File::open(&self.directory)
                .and_then(|dir| dir.sync_all())
                .map_err(|e| StorageError::IoError(format!("Failed to sync directory: {e}")))?;
        }
        Ok(())
    }

    fn acquire_lock(&self, name: &str) -> Result<Box<dyn StorageLock>> {
        let path = self.file_path(&format!("{name}.lock"));

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    StorageError::LockFailed(name.to_string())
                } else {
                    StorageError::IoError(e.to_string())
                }
            })?;

        let token = uuid::Uuid::new_v4();
        file.write_all(token.to_string().as_bytes())
            .map_err(|e| StorageError::IoError(e.to_string()))?;
        debug!("acquired lock {} ({token})", path.display());

        Ok(Box::new(FileLock {
            name: name.to_string(),
            path,
            released: false,
        }))
    }

    fn lock_exists(&self, name: &str) -> bool {
        self.file_path(&format!("{name}.lock")).exists()
    }

    fn break_lock(&self, name: &str) -> Result<()> {
        let file = format!("{name}.lock");
        self.delete_file(&file)?;
        warn!("broke lock {}", self.file_path(&file).display());
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }
}

/// A buffered file input.
#[derive(Debug)]
pub struct FileInput {
    reader: BufReader<File>,
    size: u64,
}

impl FileInput {
    fn new(file: File) -> Result<Self> {
        let size = file
            .metadata()
            .map_err(|e| QuiverError::storage(format!("Failed to get file metadata: {e}")))?
            .len();

        Ok(FileInput {
            reader: BufReader::with_capacity(BUFFER_SIZE, file),
            size,
        })
    }
}

impl Read for FileInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Seek for FileInput {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.reader.seek(pos)
    }
}

impl StorageInput for FileInput {
    fn size(&self) -> Result<u64> {
        Ok(self.size)
    }
}

/// A buffered file output.
#[derive(Debug)]
pub struct FileOutput {
    writer: BufWriter<File>,
    position: u64,
}

impl FileOutput {
    fn new(file: File) -> Self {
        FileOutput {
            writer: BufWriter::with_capacity(BUFFER_SIZE, file),
            position: 0,
        }
    }
}

impl Write for FileOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let bytes_written = self.writer.write(buf)?;
        self.position += bytes_written as u64;
        Ok(bytes_written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl StorageOutput for FileOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| QuiverError::storage(format!("Failed to flush: {e}")))?;

        self.writer
            .get_ref()
            .sync_all()
            .map_err(|e| QuiverError::storage(format!("Failed to sync: {e}")))?;

        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }
}

/// A lock held by the existence of `<name>.lock`.
#[derive(Debug)]
struct FileLock {
    name: String,
    path: PathBuf,
    released: bool,
}

impl StorageLock for FileLock {
    fn name(&self) -> &str {
        &self.name
    }

    fn release(&mut self) -> Result<()> {
        if !self.released {
            std::fs::remove_file(&self.path)
                .map_err(|e| QuiverError::storage(format!("Failed to release lock: {e}")))?;
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("{e}");
        }
    }
}
