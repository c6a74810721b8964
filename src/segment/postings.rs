//! Posting lists, term dictionaries and field norms.
//!
//! A posting list holds the ordinals of the documents containing a term,
//! sorted ascending, together with the term frequency in each document.
//! Ordinals are delta-encoded on disk.

use std::sync::Arc;

use crate::error::{QuiverError, Result};
use crate::segment::DocOrdinal;
use crate::storage::StorageOutput;
use crate::storage::structured::{StructReader, StructWriter};

/// Sorted ordinals with per-document term frequencies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostingList {
    ordinals: Vec<DocOrdinal>,
    freqs: Vec<u32>,
}

impl PostingList {
    /// Create a new empty posting list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a posting. Ordinals must be pushed in increasing order.
    pub fn push(&mut self, ordinal: DocOrdinal, freq: u32) {
        debug_assert!(self.ordinals.last().is_none_or(|last| *last < ordinal));
        self.ordinals.push(ordinal);
        self.freqs.push(freq);
    }

    /// Number of documents in the list.
    pub fn len(&self) -> usize {
        self.ordinals.len()
    }

    /// Check if the posting list is empty.
    pub fn is_empty(&self) -> bool {
        self.ordinals.is_empty()
    }

    /// Ordinals in ascending order.
    pub fn ordinals(&self) -> &[DocOrdinal] {
        &self.ordinals
    }

    /// Frequencies, parallel to [`PostingList::ordinals`].
    pub fn freqs(&self) -> &[u32] {
        &self.freqs
    }

    /// Iterate `(ordinal, freq)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (DocOrdinal, u32)> + '_ {
        self.ordinals.iter().copied().zip(self.freqs.iter().copied())
    }

    /// Encode the posting list to binary format.
    pub fn encode<W: StorageOutput>(&self, writer: &mut StructWriter<W>) -> Result<()> {
        writer.write_delta_compressed_u32s(&self.ordinals)?;
        for &freq in &self.freqs {
            writer.write_varint(freq as u64)?;
        }
        Ok(())
    }

    /// Decode a posting list written by [`PostingList::encode`].
    pub fn decode(reader: &mut StructReader) -> Result<Self> {
        let ordinals = reader.read_delta_compressed_u32s()?;
        if ordinals.windows(2).any(|w| w[0] >= w[1]) {
            return Err(QuiverError::corruption("posting ordinals not increasing"));
        }
        let mut freqs = Vec::with_capacity(ordinals.len());
        for _ in 0..ordinals.len() {
            let freq = u32::try_from(reader.read_varint()?)
                .map_err(|_| QuiverError::corruption("term frequency overflow"))?;
            freqs.push(freq);
        }
        Ok(PostingList { ordinals, freqs })
    }
}

/// A cursor over a shared posting list.
#[derive(Debug, Clone)]
pub struct PostingCursor {
    list: Arc<PostingList>,
    position: usize,
}

impl PostingCursor {
    /// Position a new cursor on the first posting.
    pub fn new(list: Arc<PostingList>) -> Self {
        PostingCursor { list, position: 0 }
    }

    /// Current ordinal, or `None` once exhausted.
    pub fn ordinal(&self) -> Option<DocOrdinal> {
        self.list.ordinals.get(self.position).copied()
    }

    /// Term frequency at the current posting.
    pub fn freq(&self) -> u32 {
        self.list.freqs.get(self.position).copied().unwrap_or(0)
    }

    /// Move to the next posting.
    pub fn advance(&mut self) {
        if self.position < self.list.len() {
            self.position += 1;
        }
    }

    /// Postings in the underlying list.
    pub fn cost(&self) -> usize {
        self.list.len()
    }
}

/// Terms of one field, sorted, each with its posting list.
#[derive(Debug, Clone, Default)]
pub struct TermDictionary {
    terms: Vec<String>,
    postings: Vec<Arc<PostingList>>,
}

impl TermDictionary {
    /// Build from `(term, postings)` pairs sorted by term.
    pub fn from_sorted(entries: impl IntoIterator<Item = (String, PostingList)>) -> Self {
        let mut dict = TermDictionary::default();
        for (term, list) in entries {
            dict.terms.push(term);
            dict.postings.push(Arc::new(list));
        }
        dict
    }

    /// Look up the posting list of a term.
    pub fn get(&self, term: &str) -> Option<&Arc<PostingList>> {
        self.terms
            .binary_search_by(|t| t.as_str().cmp(term))
            .ok()
            .map(|index| &self.postings[index])
    }

    /// Number of documents containing `term`.
    pub fn doc_freq(&self, term: &str) -> usize {
        self.get(term).map_or(0, |list| list.len())
    }

    /// Number of distinct terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Check if the dictionary has no terms.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Iterate terms in sorted order with their postings.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<PostingList>)> + '_ {
        self.terms
            .iter()
            .map(String::as_str)
            .zip(self.postings.iter())
    }

    /// Encode the dictionary.
    pub fn encode<W: StorageOutput>(&self, writer: &mut StructWriter<W>) -> Result<()> {
        writer.write_varint(self.terms.len() as u64)?;
        for (term, list) in self.iter() {
            writer.write_string(term)?;
            list.encode(writer)?;
        }
        Ok(())
    }

    /// Decode a dictionary written by [`TermDictionary::encode`].
    pub fn decode(reader: &mut StructReader) -> Result<Self> {
        let count = reader.read_len()?;
        let mut dict = TermDictionary::default();
        for _ in 0..count {
            let term = reader.read_string()?;
            if dict.terms.last().is_some_and(|last| *last >= term) {
                return Err(QuiverError::corruption("terms not sorted"));
            }
            let list = PostingList::decode(reader)?;
            dict.terms.push(term);
            dict.postings.push(Arc::new(list));
        }
        Ok(dict)
    }
}

/// Token counts of one text field, per ordinal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldNorms {
    lengths: Vec<u32>,
    stats: FieldStats,
}

/// Totals over one text field in a segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldStats {
    /// Documents with at least one token in the field.
    pub doc_count: u64,
    /// Sum of all token counts.
    pub total_tokens: u64,
}

impl FieldStats {
    /// Accumulate another segment's totals.
    pub fn merge(&mut self, other: &FieldStats) {
        self.doc_count += other.doc_count;
        self.total_tokens += other.total_tokens;
    }

    /// Mean field length, or 0 when no document has the field.
    pub fn average_length(&self) -> f32 {
        if self.doc_count == 0 {
            0.0
        } else {
            self.total_tokens as f32 / self.doc_count as f32
        }
    }
}

impl FieldNorms {
    /// Build from per-ordinal token counts.
    pub fn from_lengths(lengths: Vec<u32>) -> Self {
        let stats = FieldStats {
            doc_count: lengths.iter().filter(|len| **len > 0).count() as u64,
            total_tokens: lengths.iter().map(|len| *len as u64).sum(),
        };
        FieldNorms { lengths, stats }
    }

    /// Token count of the field in `ordinal`.
    pub fn length(&self, ordinal: DocOrdinal) -> u32 {
        self.lengths.get(ordinal as usize).copied().unwrap_or(0)
    }

    /// Per-ordinal token counts.
    pub fn lengths(&self) -> &[u32] {
        &self.lengths
    }

    /// Field totals.
    pub fn stats(&self) -> FieldStats {
        self.stats
    }

    /// Encode the norms.
    pub fn encode<W: StorageOutput>(&self, writer: &mut StructWriter<W>) -> Result<()> {
        writer.write_varint(self.lengths.len() as u64)?;
        for &len in &self.lengths {
            writer.write_varint(len as u64)?;
        }
        Ok(())
    }

    /// Decode norms written by [`FieldNorms::encode`].
    pub fn decode(reader: &mut StructReader) -> Result<Self> {
        let count = reader.read_len()?;
        let mut lengths = Vec::with_capacity(count);
        for _ in 0..count {
            let len = u32::try_from(reader.read_varint()?)
                .map_err(|_| QuiverError::corruption("field length overflow"))?;
            lengths.push(len);
        }
        Ok(Self::from_lengths(lengths))
    }
}
