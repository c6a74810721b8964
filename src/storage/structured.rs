//! Structured binary I/O for segment and tombstone files.
//!
//! [`StructWriter`] streams little-endian integers, varints and length-prefixed
//! byte strings into a [`StorageOutput`] while maintaining a CRC32 over every
//! byte; [`StructWriter::finish`] appends the checksum and syncs.
//! [`StructReader`] decodes the same primitives from an owned or borrowed buffer and
//! [`StructReader::open_checked`] verifies the trailing checksum first.

use std::borrow::Cow;
use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use crc32fast::Hasher;

use crate::error::{QuiverError, Result};
use crate::storage::{Storage, StorageOutput, read_all};
use crate::util::varint::{decode_u64, encode_u64};

/// A structured file writer for binary data.
pub struct StructWriter<W: StorageOutput> {
    writer: W,
    hasher: Hasher,
    position: u64,
}

impl<W: StorageOutput> StructWriter<W> {
    /// Create a new structured file writer.
    pub fn new(writer: W) -> Self {
        StructWriter {
            writer,
            hasher: Hasher::new(),
            position: 0,
        }
    }

    /// Write a u8 value.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_raw(&[value])
    }

    /// Write a u32 value (little-endian).
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    /// Write a u64 value (little-endian).
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    /// Write a variable-length integer.
    pub fn write_varint(&mut self, value: u64) -> Result<()> {
        self.write_raw(&encode_u64(value))
    }

    /// Write a string with length prefix.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_bytes(value.as_bytes())
    }

    /// Write raw bytes with length prefix.
    pub fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.write_varint(value.len() as u64)?;
        self.write_raw(value)
    }

    /// Write raw bytes without length prefix.
    pub fn write_raw(&mut self, value: &[u8]) -> Result<()> {
        self.writer.write_all(value)?;
        self.hasher.update(value);
        self.position += value.len() as u64;
        Ok(())
    }

    /// Write a sorted integer array using delta encoding.
    pub fn write_delta_compressed_u32s(&mut self, values: &[u32]) -> Result<()> {
        self.write_varint(values.len() as u64)?;

        let mut previous = 0u32;
        for &value in values {
            let delta = value.wrapping_sub(previous);
            self.write_varint(delta as u64)?;
            previous = value;
        }

        Ok(())
    }

    /// Get current file position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Append the checksum, flush and sync. Returns the total bytes written.
    pub fn finish(mut self) -> Result<u64> {
        let checksum = self.hasher.clone().finalize();
        self.writer.write_u32::<LittleEndian>(checksum)?;
        self.writer.flush_and_sync()?;
        Ok(self.position + 4)
    }
}

/// A structured reader over an owned or borrowed byte buffer.
#[derive(Debug)]
pub struct StructReader<'a> {
    data: Cow<'a, [u8]>,
    position: usize,
}

impl<'a> StructReader<'a> {
    /// Wrap bytes that carry no trailing checksum.
    pub fn from_bytes<D: Into<Cow<'a, [u8]>>>(data: D) -> Self {
        StructReader {
            data: data.into(),
            position: 0,
        }
    }

    /// Read `name` fully, verify and strip its trailing CRC32.
    pub fn open_checked(storage: &dyn Storage, name: &str) -> Result<StructReader<'static>> {
        let mut data = read_all(storage, name)?;
        if data.len() < 4 {
            return Err(QuiverError::corruption(format!("{name}: file too short")));
        }

        let body_len = data.len() - 4;
        let stored = u32::from_le_bytes([
            data[body_len],
            data[body_len + 1],
            data[body_len + 2],
            data[body_len + 3],
        ]);
        let actual = crc32fast::hash(&data[..body_len]);
        if stored != actual {
            return Err(QuiverError::corruption(format!(
                "{name}: checksum mismatch (stored {stored:08x}, computed {actual:08x})"
            )));
        }

        data.truncate(body_len);
        Ok(StructReader::from_bytes(data))
    }

    fn take(&mut self, len: usize) -> Result<&[u8]> {
        let end = self
            .position
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| QuiverError::corruption("unexpected end of data"))?;
        let slice = &self.data[self.position..end];
        self.position = end;
        Ok(slice)
    }

    /// Read a u8 value.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a u32 value (little-endian).
    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a u64 value (little-endian).
    pub fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    /// Read a variable-length integer.
    pub fn read_varint(&mut self) -> Result<u64> {
        let (value, used) = decode_u64(&self.data[self.position.min(self.data.len())..])?;
        self.position += used;
        Ok(value)
    }

    /// Read a length or element count. Every element occupies at least one
    /// byte, so a count larger than the remaining input is corruption.
    pub fn read_len(&mut self) -> Result<usize> {
        let len = self.read_varint()?;
        if len > self.remaining() as u64 {
            return Err(QuiverError::corruption(format!("implausible length {len}")));
        }
        Ok(len as usize)
    }

    /// Read length-prefixed bytes.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_len()?;
        Ok(self.take(len)?.to_vec())
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String> {
        String::from_utf8(self.read_bytes()?)
            .map_err(|e| QuiverError::corruption(format!("invalid UTF-8: {e}")))
    }

    /// Read exactly `len` raw bytes.
    pub fn read_raw(&mut self, len: usize) -> Result<&[u8]> {
        self.take(len)
    }

    /// Read a delta-encoded integer array written by
    /// [`StructWriter::write_delta_compressed_u32s`].
    pub fn read_delta_compressed_u32s(&mut self) -> Result<Vec<u32>> {
        let len = self.read_len()?;
        let mut values = Vec::with_capacity(len);
        let mut previous = 0u32;
        for _ in 0..len {
            let delta = u32::try_from(self.read_varint()?)
                .map_err(|_| QuiverError::corruption("posting delta overflow"))?;
            previous = previous.wrapping_add(delta);
            values.push(previous);
        }
        Ok(values)
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Current offset into the buffer.
    pub fn position(&self) -> usize {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;

    #[test]
    fn test_write_then_read_checked() {
        let storage = MemoryStorage::new();
        let output = storage.create_output("data.bin").unwrap();
        let mut writer = StructWriter::new(output);

        writer.write_u8(7).unwrap();
        writer.write_u32(0xDEAD_BEEF).unwrap();
        writer.write_u64(1 << 40).unwrap();
        writer.write_varint(300).unwrap();
        writer.write_string("quiver").unwrap();
        writer.write_delta_compressed_u32s(&[1, 5, 9, 200]).unwrap();
        let written = writer.finish().unwrap();
        assert_eq!(written, storage.file_size("data.bin").unwrap());

        let mut reader = StructReader::open_checked(&storage, "data.bin").unwrap();
        assert_eq!(reader.read_u8().unwrap(), 7);
        assert_eq!(reader.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(reader.read_u64().unwrap(), 1 << 40);
        assert_eq!(reader.read_varint().unwrap(), 300);
        assert_eq!(reader.read_string().unwrap(), "quiver");
        assert_eq!(
            reader.read_delta_compressed_u32s().unwrap(),
            vec![1, 5, 9, 200]
        );
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_checksum_mismatch_is_corruption() {
        let storage = MemoryStorage::new();
        let mut writer = StructWriter::new(storage.create_output("data.bin").unwrap());
        writer.write_string("payload").unwrap();
        writer.finish().unwrap();

        let mut bytes = read_all(&storage, "data.bin").unwrap();
        bytes[2] ^= 0xFF;
        crate::storage::write_all(&storage, "data.bin", &bytes).unwrap();

        let err = StructReader::open_checked(&storage, "data.bin").unwrap_err();
        assert!(matches!(err, QuiverError::Corruption(_)));
    }

    #[test]
    fn test_truncated_read_fails() {
        let mut reader = StructReader::from_bytes(vec![1, 2]);
        assert!(reader.read_u32().is_err());
    }

    #[test]
    fn test_borrowed_buffer() {
        let bytes = [3u8, b'a', b'b', b'c', 9];
        let mut reader = StructReader::from_bytes(&bytes[..]);
        assert_eq!(reader.read_string().unwrap(), "abc");
        assert_eq!(reader.read_raw(1).unwrap(), &[9]);
        assert_eq!(reader.remaining(), 0);
    }
}
