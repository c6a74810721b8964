//! Doc-values columns for numeric and date fields.
//!
//! Each column keeps two views of the same data:
//!
//! - the first value of the field per ordinal, for aggregations and
//!   stored-value lookups;
//! - every `(encoded value, ordinal)` pair sorted by value, so a range query
//!   is two binary searches followed by a contiguous scan.

use std::ops::{Bound, Range};

use crate::document::field::{FieldKind, FieldValue};
use crate::error::{QuiverError, Result};
use crate::segment::DocOrdinal;
use crate::storage::StorageOutput;
use crate::storage::structured::{StructReader, StructWriter};

/// Column of sortable-encoded values for one field.
#[derive(Debug, Clone, PartialEq)]
pub struct DocValues {
    kind: FieldKind,
    first: Vec<Option<u64>>,
    sorted: Vec<(u64, DocOrdinal)>,
}

impl DocValues {
    /// Field kind of the column.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Encoded first value of `ordinal`.
    pub fn get(&self, ordinal: DocOrdinal) -> Option<u64> {
        self.first.get(ordinal as usize).copied().flatten()
    }

    /// Decoded first value of `ordinal`.
    pub fn value(&self, ordinal: DocOrdinal) -> Option<FieldValue> {
        let encoded = self.get(ordinal)?;
        crate::codec::decode(self.kind, &encoded.to_be_bytes()).ok()
    }

    /// All `(encoded, ordinal)` entries in value order.
    pub fn sorted(&self) -> &[(u64, DocOrdinal)] {
        &self.sorted
    }

    /// Number of ordinals covered by the column.
    pub fn len(&self) -> usize {
        self.first.len()
    }

    /// Check if no ordinal has a value.
    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Index range of [`DocValues::sorted`] whose values fall within the bounds.
    pub fn range(&self, lower: Bound<u64>, upper: Bound<u64>) -> Range<usize> {
        let start = match lower {
            Bound::Included(v) => self.sorted.partition_point(|(value, _)| *value < v),
            Bound::Excluded(v) => self.sorted.partition_point(|(value, _)| *value <= v),
            Bound::Unbounded => 0,
        };
        let end = match upper {
            Bound::Included(v) => self.sorted.partition_point(|(value, _)| *value <= v),
            Bound::Excluded(v) => self.sorted.partition_point(|(value, _)| *value < v),
            Bound::Unbounded => self.sorted.len(),
        };
        start..end.max(start)
    }

    /// Encode the column.
    pub fn encode<W: StorageOutput>(&self, writer: &mut StructWriter<W>) -> Result<()> {
        writer.write_u8(self.kind.tag())?;
        writer.write_varint(self.first.len() as u64)?;

        let present: Vec<DocOrdinal> = (0..self.first.len() as DocOrdinal)
            .filter(|ord| self.first[*ord as usize].is_some())
            .collect();
        writer.write_delta_compressed_u32s(&present)?;
        for value in self.first.iter().flatten() {
            writer.write_u64(*value)?;
        }

        writer.write_varint(self.sorted.len() as u64)?;
        for &(value, ordinal) in &self.sorted {
            writer.write_u64(value)?;
            writer.write_varint(ordinal as u64)?;
        }
        Ok(())
    }

    /// Decode a column written by [`DocValues::encode`] for a segment of
    /// `doc_count` documents.
    pub fn decode(reader: &mut StructReader, doc_count: u32) -> Result<Self> {
        let kind = FieldKind::from_tag(reader.read_u8()?)?;
        if reader.read_varint()? != doc_count as u64 {
            return Err(QuiverError::corruption("doc values length mismatch"));
        }
        let doc_count = doc_count as usize;

        let present = reader.read_delta_compressed_u32s()?;
        let mut first = vec![None; doc_count];
        for ordinal in present {
            let slot = first
                .get_mut(ordinal as usize)
                .ok_or_else(|| QuiverError::corruption("doc value ordinal out of range"))?;
            *slot = Some(reader.read_u64()?);
        }

        let count = reader.read_len()?;
        let mut sorted = Vec::with_capacity(count);
        for _ in 0..count {
            let value = reader.read_u64()?;
            let ordinal = reader.read_varint()?;
            if ordinal >= doc_count as u64 {
                return Err(QuiverError::corruption("doc value ordinal out of range"));
            }
            sorted.push((value, ordinal as DocOrdinal));
        }
        if sorted.windows(2).any(|w| w[0] > w[1]) {
            return Err(QuiverError::corruption("doc values not sorted"));
        }

        Ok(DocValues {
            kind,
            first,
            sorted,
        })
    }
}

/// Accumulates the values of one field while a segment is built or merged.
#[derive(Debug, Clone)]
pub struct DocValuesBuilder {
    kind: FieldKind,
    first: Vec<Option<u64>>,
    entries: Vec<(u64, DocOrdinal)>,
}

impl DocValuesBuilder {
    /// Create an empty builder.
    pub fn new(kind: FieldKind) -> Self {
        DocValuesBuilder {
            kind,
            first: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Record a value; the first one added for an ordinal is its first value.
    pub fn add(&mut self, ordinal: DocOrdinal, encoded: u64) {
        let index = ordinal as usize;
        if index >= self.first.len() {
            self.first.resize(index + 1, None);
        }
        if self.first[index].is_none() {
            self.first[index] = Some(encoded);
        }
        self.entries.push((encoded, ordinal));
    }

    /// Sort and freeze the column for `doc_count` ordinals.
    pub fn finish(mut self, doc_count: u32) -> DocValues {
        self.first.resize(doc_count as usize, None);
        self.entries.sort_unstable();
        self.entries.dedup();
        DocValues {
            kind: self.kind,
            first: self.first,
            sorted: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_f64;

    fn column() -> DocValues {
        let mut builder = DocValuesBuilder::new(FieldKind::Numeric);
        builder.add(0, encode_f64(0.1).unwrap());
        builder.add(1, encode_f64(0.5).unwrap());
        builder.add(1, encode_f64(0.05).unwrap());
        builder.add(3, encode_f64(1.0).unwrap());
        builder.finish(4)
    }

    #[test]
    fn test_first_value_per_ordinal() {
        let dv = column();
        assert_eq!(dv.len(), 4);
        assert_eq!(dv.value(0), Some(FieldValue::Numeric(0.1)));
        assert_eq!(dv.value(1), Some(FieldValue::Numeric(0.5)));
        assert_eq!(dv.value(2), None);
        assert_eq!(dv.sorted().len(), 4);
    }

    #[test]
    fn test_half_open_range() {
        let dv = column();
        let lower = Bound::Included(encode_f64(0.1).unwrap());
        let upper = Bound::Excluded(encode_f64(1.0).unwrap());
        let ordinals: Vec<u32> = dv.sorted()[dv.range(lower, upper)]
            .iter()
            .map(|(_, ord)| *ord)
            .collect();
        assert_eq!(ordinals, vec![0, 1]);

        let empty = dv.range(
            Bound::Included(encode_f64(2.0).unwrap()),
            Bound::Excluded(encode_f64(1.0).unwrap()),
        );
        assert!(empty.is_empty());
    }
}
