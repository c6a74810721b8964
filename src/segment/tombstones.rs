//! Tombstone bitmaps.
//!
//! A tombstone marks a segment ordinal as logically deleted. The bitmap is
//! never modified in place: [`Tombstones::with_deleted`] returns a new value
//! one generation later, and segments publish it behind an `Arc` so readers
//! holding the previous bitmap are unaffected.

use bit_vec::BitVec;

use crate::error::{QuiverError, Result};
use crate::segment::DocOrdinal;
use crate::storage::Storage;
use crate::storage::structured::{StructReader, StructWriter};

const TOMBSTONE_MAGIC: u32 = 0x5144_454C; // "QDEL"
const TOMBSTONE_VERSION: u32 = 1;

/// Deleted ordinals of one segment at one generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Tombstones {
    bits: BitVec,
    deleted: u32,
    generation: u64,
}

impl Tombstones {
    /// No deletions; generation 0 has no file.
    pub fn new(doc_count: u32) -> Self {
        Tombstones {
            bits: BitVec::from_elem(doc_count as usize, false),
            deleted: 0,
            generation: 0,
        }
    }

    /// Check whether an ordinal is deleted.
    pub fn is_deleted(&self, ordinal: DocOrdinal) -> bool {
        self.bits.get(ordinal as usize).unwrap_or(false)
    }

    /// Number of deleted ordinals.
    pub fn deleted_count(&self) -> u32 {
        self.deleted
    }

    /// Number of ordinals covered.
    pub fn doc_count(&self) -> u32 {
        self.bits.len() as u32
    }

    /// Number of ordinals not deleted.
    pub fn live_count(&self) -> u32 {
        self.doc_count() - self.deleted
    }

    /// Generation of this bitmap; bumped by every change.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Deleted ordinals in ascending order.
    pub fn deleted_ordinals(&self) -> impl Iterator<Item = DocOrdinal> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, deleted)| *deleted)
            .map(|(ordinal, _)| ordinal as DocOrdinal)
    }

    /// A copy with `ordinals` additionally deleted. Returns `None` when none
    /// of them was live, so unchanged segments keep their generation.
    pub fn with_deleted(&self, ordinals: &[DocOrdinal]) -> Option<Self> {
        let mut next = self.clone();
        let mut changed = false;
        for &ordinal in ordinals {
            let index = ordinal as usize;
            if index < next.bits.len() && !next.bits[index] {
                next.bits.set(index, true);
                next.deleted += 1;
                changed = true;
            }
        }
        if !changed {
            return None;
        }
        next.generation += 1;
        Some(next)
    }

    /// File name of a segment's tombstones at a generation.
    pub fn file_name(segment: &str, generation: u64) -> String {
        format!("{segment}_{generation}.del")
    }

    /// Persist the bitmap and return the file name written.
    pub fn write(&self, storage: &dyn Storage, segment: &str) -> Result<String> {
        let name = Self::file_name(segment, self.generation);
        let mut writer = StructWriter::new(storage.create_output(&name)?);
        writer.write_u32(TOMBSTONE_MAGIC)?;
        writer.write_u32(TOMBSTONE_VERSION)?;
        writer.write_u32(self.doc_count())?;
        writer.write_u64(self.generation)?;
        writer.write_bytes(&self.bits.to_bytes())?;
        writer.finish()?;
        Ok(name)
    }

    /// Load a segment's tombstones. Generation 0 means no deletions.
    pub fn read(
        storage: &dyn Storage,
        segment: &str,
        generation: u64,
        doc_count: u32,
    ) -> Result<Self> {
        if generation == 0 {
            return Ok(Self::new(doc_count));
        }

        let name = Self::file_name(segment, generation);
        let mut reader = StructReader::open_checked(storage, &name)?;
        if reader.read_u32()? != TOMBSTONE_MAGIC {
            return Err(QuiverError::corruption(format!("{name}: bad magic")));
        }
        let version = reader.read_u32()?;
        if version != TOMBSTONE_VERSION {
            return Err(QuiverError::corruption(format!(
                "{name}: unsupported version {version}"
            )));
        }
        if reader.read_u32()? != doc_count {
            return Err(QuiverError::corruption(format!("{name}: doc count mismatch")));
        }
        let stored_generation = reader.read_u64()?;
        if stored_generation != generation {
            return Err(QuiverError::corruption(format!(
                "{name}: generation {stored_generation}, expected {generation}"
            )));
        }

        let mut bits = BitVec::from_bytes(&reader.read_bytes()?);
        if bits.len() < doc_count as usize {
            return Err(QuiverError::corruption(format!("{name}: bitmap too short")));
        }
        bits.truncate(doc_count as usize);
        let deleted = bits.iter().filter(|b| *b).count() as u32;

        Ok(Tombstones {
            bits,
            deleted,
            generation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;

    #[test]
    fn test_with_deleted_is_copy_on_write() {
        let base = Tombstones::new(10);
        let next = base.with_deleted(&[2, 5, 5, 42]).unwrap();

        assert!(!base.is_deleted(2));
        assert_eq!(base.generation(), 0);

        assert!(next.is_deleted(2));
        assert!(next.is_deleted(5));
        assert!(!next.is_deleted(42));
        assert_eq!(next.deleted_count(), 2);
        assert_eq!(next.live_count(), 8);
        assert_eq!(next.generation(), 1);
        assert_eq!(next.deleted_ordinals().collect::<Vec<_>>(), vec![2, 5]);

        assert!(next.with_deleted(&[2, 5]).is_none());
    }

    #[test]
    fn test_write_and_read() {
        let storage = MemoryStorage::new();
        let tombstones = Tombstones::new(13).with_deleted(&[0, 12]).unwrap();
        let name = tombstones.write(&storage, "seg_1").unwrap();
        assert_eq!(name, "seg_1_1.del");

        let loaded = Tombstones::read(&storage, "seg_1", 1, 13).unwrap();
        assert_eq!(loaded, tombstones);

        assert!(Tombstones::read(&storage, "seg_1", 1, 14).is_err());
        assert_eq!(Tombstones::read(&storage, "seg_1", 0, 13).unwrap().deleted_count(), 0);
    }
}
