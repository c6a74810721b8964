//! Segment construction.

use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::AHashMap;
use log::{debug, warn};

use crate::analysis::analyzer::Analyzer;
use crate::codec;
use crate::document::ID_FIELD;
use crate::document::document::Document;
use crate::document::field::{FieldKind, FieldValue};
use crate::error::{QuiverError, Result};
use crate::segment::doc_values::{DocValues, DocValuesBuilder};
use crate::segment::postings::{FieldNorms, PostingList, TermDictionary};
use crate::segment::stored::{self, RecordPointer};
use crate::segment::{
    DocOrdinal, FieldInfo, SEGMENT_MAGIC, SEGMENT_VERSION, Segment, index_file_name,
    stored_file_name,
};
use crate::storage::Storage;
use crate::storage::structured::StructWriter;

/// In-memory contents of a segment, ready to be serialized.
#[derive(Debug, Default)]
pub(crate) struct SegmentParts {
    pub doc_count: u32,
    pub fields: BTreeMap<String, FieldInfo>,
    pub postings: BTreeMap<String, TermDictionary>,
    pub doc_values: BTreeMap<String, DocValues>,
    pub norms: BTreeMap<String, FieldNorms>,
    pub stored: Vec<Vec<u8>>,
}

impl SegmentParts {
    /// Write `<name>.fdt` then `<name>.idx`, both synced. Partial files are
    /// removed on failure.
    pub fn write(&self, storage: &dyn Storage, name: &str) -> Result<()> {
        let result = self.write_files(storage, name);
        if result.is_err() {
            for file in [stored_file_name(name), index_file_name(name)] {
                if let Err(e) = storage.delete_file(&file) {
                    warn!("failed to remove partial segment file {file}: {e}");
                }
            }
        }
        result
    }

    fn write_files(&self, storage: &dyn Storage, name: &str) -> Result<()> {
        let mut fdt = StructWriter::new(storage.create_output(&stored_file_name(name))?);
        let mut pointers: Vec<RecordPointer> = Vec::with_capacity(self.stored.len());
        for payload in &self.stored {
            pointers.push(stored::write_record(&mut fdt, payload)?);
        }
        let fdt_len = fdt.finish()?;

        let mut idx = StructWriter::new(storage.create_output(&index_file_name(name))?);
        idx.write_u32(SEGMENT_MAGIC)?;
        idx.write_u32(SEGMENT_VERSION)?;
        idx.write_u32(self.doc_count)?;

        let fields: Vec<&FieldInfo> = self.fields.values().collect();
        let table = bincode::serialize(&fields)
            .map_err(|e| QuiverError::serialization(format!("field table: {e}")))?;
        idx.write_bytes(&table)?;

        idx.write_varint(self.postings.len() as u64)?;
        for (field, dict) in &self.postings {
            idx.write_string(field)?;
            dict.encode(&mut idx)?;
        }

        idx.write_varint(self.doc_values.len() as u64)?;
        for (field, column) in &self.doc_values {
            idx.write_string(field)?;
            column.encode(&mut idx)?;
        }

        idx.write_varint(self.norms.len() as u64)?;
        for (field, norms) in &self.norms {
            idx.write_string(field)?;
            norms.encode(&mut idx)?;
        }

        idx.write_varint(pointers.len() as u64)?;
        for pointer in &pointers {
            idx.write_varint(pointer.offset)?;
            idx.write_varint(pointer.len as u64)?;
        }
        let idx_len = idx.finish()?;

        debug!(
            "wrote segment {name}: {} docs, {idx_len} index bytes, {fdt_len} stored bytes",
            self.doc_count
        );
        Ok(())
    }
}

/// Accumulates documents and writes them out as one segment.
///
/// Ordinals are assigned `0..n` in the order documents are added.
///
/// ```
/// use std::sync::Arc;
///
/// use quiver::analysis::analyzer::standard::StandardAnalyzer;
/// use quiver::document::{Document, Field};
/// use quiver::segment::SegmentBuilder;
/// use quiver::storage::memory::MemoryStorage;
///
/// # fn main() -> quiver::error::Result<()> {
/// let storage = Arc::new(MemoryStorage::new());
/// let mut builder = SegmentBuilder::new(Arc::new(StandardAnalyzer::new()));
/// builder.add(&Document::new("a").add_field(Field::text("name", "quiver")))?;
///
/// let segment = builder.build(storage, "seg_1")?;
/// assert_eq!(segment.doc_count(), 1);
/// assert_eq!(segment.postings("name", "quiver").map(|p| p.len()), Some(1));
/// # Ok(())
/// # }
/// ```
pub struct SegmentBuilder {
    analyzer: Arc<dyn Analyzer>,
    doc_count: u32,
    fields: BTreeMap<String, FieldInfo>,
    postings: AHashMap<String, BTreeMap<String, PostingList>>,
    doc_values: AHashMap<String, DocValuesBuilder>,
    norms: AHashMap<String, Vec<u32>>,
    stored: Vec<Vec<u8>>,
}

impl std::fmt::Debug for SegmentBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentBuilder")
            .field("analyzer", &self.analyzer.name())
            .field("doc_count", &self.doc_count)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Default)]
struct TextAccumulator {
    freqs: AHashMap<String, u32>,
    length: u32,
}

impl SegmentBuilder {
    /// Create an empty builder analyzing text with `analyzer`.
    pub fn new(analyzer: Arc<dyn Analyzer>) -> Self {
        SegmentBuilder {
            analyzer,
            doc_count: 0,
            fields: BTreeMap::new(),
            postings: AHashMap::new(),
            doc_values: AHashMap::new(),
            norms: AHashMap::new(),
            stored: Vec::new(),
        }
    }

    /// Number of documents added so far.
    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    /// Check if no document has been added.
    pub fn is_empty(&self) -> bool {
        self.doc_count == 0
    }

    /// Add a document and return its ordinal.
    ///
    /// The document is validated first; a rejected document leaves the
    /// builder unchanged.
    pub fn add(&mut self, document: &Document) -> Result<DocOrdinal> {
        document.validate()?;
        self.check_kinds(document)?;

        let mut text: BTreeMap<&str, TextAccumulator> = BTreeMap::new();
        let mut numeric: Vec<(&str, FieldKind, u64)> = Vec::new();
        for field in document.fields().iter().filter(|f| f.is_indexed()) {
            match field.value() {
                FieldValue::Text(value) => {
                    let acc = text.entry(field.name()).or_default();
                    for token in self.analyzer.analyze(value)? {
                        *acc.freqs.entry(token.text).or_insert(0) += 1;
                        acc.length += 1;
                    }
                }
                other => numeric.push((field.name(), field.kind(), codec::encode_sortable(other)?)),
            }
        }
        let payload = stored::encode_document(document)?;

        let ordinal = self.doc_count;
        self.register(ID_FIELD, FieldKind::Text, true, false);
        self.postings
            .entry(ID_FIELD.to_string())
            .or_default()
            .entry(document.id().to_string())
            .or_default()
            .push(ordinal, 1);

        for field in document.fields() {
            self.register(field.name(), field.kind(), false, false);
        }

        for (name, acc) in text {
            self.register(name, FieldKind::Text, true, false);
            let dict = self.postings.entry(name.to_string()).or_default();
            for (term, freq) in acc.freqs {
                dict.entry(term).or_default().push(ordinal, freq);
            }
            let lengths = self.norms.entry(name.to_string()).or_default();
            lengths.resize(ordinal as usize + 1, 0);
            lengths[ordinal as usize] = acc.length;
        }

        for (name, kind, encoded) in numeric {
            self.register(name, kind, false, true);
            self.doc_values
                .entry(name.to_string())
                .or_insert_with(|| DocValuesBuilder::new(kind))
                .add(ordinal, encoded);
        }

        self.stored.push(payload);
        self.doc_count += 1;
        Ok(ordinal)
    }

    fn check_kinds(&self, document: &Document) -> Result<()> {
        let mut seen: AHashMap<&str, FieldKind> = AHashMap::new();
        for field in document.fields() {
            let known = self
                .fields
                .get(field.name())
                .map(|info| info.kind)
                .or_else(|| seen.get(field.name()).copied());
            if let Some(kind) = known {
                if kind != field.kind() {
                    return Err(QuiverError::invalid_field(format!(
                        "field '{}' is {:?} but was given a {:?} value",
                        field.name(),
                        kind,
                        field.kind()
                    )));
                }
            }
            seen.insert(field.name(), field.kind());
        }
        Ok(())
    }

    fn register(&mut self, name: &str, kind: FieldKind, postings: bool, doc_values: bool) {
        let info = self
            .fields
            .entry(name.to_string())
            .or_insert_with(|| FieldInfo {
                name: name.to_string(),
                kind,
                postings: false,
                doc_values: false,
            });
        info.postings |= postings;
        info.doc_values |= doc_values;
    }

    pub(crate) fn into_parts(self) -> SegmentParts {
        let doc_count = self.doc_count;
        let postings = self
            .postings
            .into_iter()
            .map(|(field, terms)| (field, TermDictionary::from_sorted(terms)))
            .collect();
        let doc_values = self
            .doc_values
            .into_iter()
            .map(|(field, builder)| (field, builder.finish(doc_count)))
            .collect();
        let norms = self
            .norms
            .into_iter()
            .map(|(field, mut lengths)| {
                lengths.resize(doc_count as usize, 0);
                (field, FieldNorms::from_lengths(lengths))
            })
            .collect();

        SegmentParts {
            doc_count,
            fields: self.fields,
            postings,
            doc_values,
            norms,
            stored: self.stored,
        }
    }

    /// Serialize the segment files under `name`.
    pub fn write(self, storage: &dyn Storage, name: &str) -> Result<()> {
        self.into_parts().write(storage, name)
    }

    /// Write the segment and open it.
    pub fn build(self, storage: Arc<dyn Storage>, name: &str) -> Result<Segment> {
        self.write(storage.as_ref(), name)?;
        Segment::open(storage, name, 0)
    }
}
