//! Opened, read-only segments.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ahash::AHashMap;
use log::{debug, warn};
use parking_lot::RwLock;

use crate::document::ID_FIELD;
use crate::document::field::{FieldKind, FieldValue};
use crate::error::{QuiverError, Result};
use crate::segment::doc_values::DocValues;
use crate::segment::postings::{FieldNorms, FieldStats, PostingList, TermDictionary};
use crate::segment::stored::{self, RecordPointer};
use crate::segment::tombstones::Tombstones;
use crate::segment::{
    DocOrdinal, FieldInfo, SEGMENT_MAGIC, SEGMENT_VERSION, index_file_name, stored_file_name,
};
use crate::storage::Storage;
use crate::storage::structured::StructReader;

/// An immutable segment loaded from storage.
///
/// Postings, doc-values and norms are held in memory; stored fields stay on
/// storage and are read per ordinal. Once marked obsolete, the segment's
/// files are deleted when the last reference is dropped.
#[derive(Debug)]
pub struct Segment {
    name: String,
    storage: Arc<dyn Storage>,
    doc_count: u32,
    fields: Vec<FieldInfo>,
    postings: AHashMap<String, TermDictionary>,
    doc_values: AHashMap<String, Arc<DocValues>>,
    norms: AHashMap<String, FieldNorms>,
    pointers: Vec<RecordPointer>,
    tombstones: RwLock<Arc<Tombstones>>,
    obsolete: AtomicBool,
}

impl Segment {
    /// Open segment `name` with tombstones at `tombstone_generation`.
    pub fn open(storage: Arc<dyn Storage>, name: &str, tombstone_generation: u64) -> Result<Self> {
        let file = index_file_name(name);
        let mut reader = StructReader::open_checked(storage.as_ref(), &file)?;

        if reader.read_u32()? != SEGMENT_MAGIC {
            return Err(QuiverError::corruption(format!("{file}: bad magic")));
        }
        let version = reader.read_u32()?;
        if version != SEGMENT_VERSION {
            return Err(QuiverError::corruption(format!(
                "{file}: unsupported version {version}"
            )));
        }
        let doc_count = reader.read_u32()?;

        let fields: Vec<FieldInfo> = bincode::deserialize(&reader.read_bytes()?)
            .map_err(|e| QuiverError::corruption(format!("{file}: field table: {e}")))?;

        let mut postings = AHashMap::new();
        for _ in 0..reader.read_len()? {
            let field = reader.read_string()?;
            postings.insert(field, TermDictionary::decode(&mut reader)?);
        }

        let mut doc_values = AHashMap::new();
        for _ in 0..reader.read_len()? {
            let field = reader.read_string()?;
            let column = DocValues::decode(&mut reader, doc_count)?;
            doc_values.insert(field, Arc::new(column));
        }

        let mut norms = AHashMap::new();
        for _ in 0..reader.read_len()? {
            let field = reader.read_string()?;
            let field_norms = FieldNorms::decode(&mut reader)?;
            if field_norms.lengths().len() != doc_count as usize {
                return Err(QuiverError::corruption(format!(
                    "{file}: norms of '{field}' do not cover every document"
                )));
            }
            norms.insert(field, field_norms);
        }

        let pointer_count = reader.read_len()?;
        if pointer_count != doc_count as usize {
            return Err(QuiverError::corruption(format!(
                "{file}: {pointer_count} stored records for {doc_count} documents"
            )));
        }
        let mut pointers = Vec::with_capacity(pointer_count);
        for _ in 0..pointer_count {
            let offset = reader.read_varint()?;
            let len = u32::try_from(reader.read_varint()?)
                .map_err(|_| QuiverError::corruption(format!("{file}: record too large")))?;
            pointers.push(RecordPointer { offset, len });
        }

        let tombstones =
            Tombstones::read(storage.as_ref(), name, tombstone_generation, doc_count)?;

        debug!(
            "opened segment {name}: {doc_count} docs, {} deleted",
            tombstones.deleted_count()
        );

        Ok(Segment {
            name: name.to_string(),
            storage,
            doc_count,
            fields,
            postings,
            doc_values,
            norms,
            pointers,
            tombstones: RwLock::new(Arc::new(tombstones)),
            obsolete: AtomicBool::new(false),
        })
    }

    /// Segment name (file stem).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of documents, live or deleted.
    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    /// The field table.
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    /// Field table entry for `name`.
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|info| info.name == name)
    }

    /// Term dictionary of a text field.
    pub fn terms(&self, field: &str) -> Option<&TermDictionary> {
        self.postings.get(field)
    }

    /// Posting list of `term` in `field`.
    pub fn postings(&self, field: &str, term: &str) -> Option<Arc<PostingList>> {
        self.postings.get(field)?.get(term).cloned()
    }

    /// Doc-values column of a numeric or date field.
    pub fn doc_values(&self, field: &str) -> Option<Arc<DocValues>> {
        self.doc_values.get(field).cloned()
    }

    /// Token count of `field` in `ordinal`.
    pub fn norm(&self, field: &str, ordinal: DocOrdinal) -> u32 {
        self.norms.get(field).map_or(0, |norms| norms.length(ordinal))
    }

    /// Totals of a text field.
    pub fn field_stats(&self, field: &str) -> FieldStats {
        self.norms
            .get(field)
            .map(|norms| norms.stats())
            .unwrap_or_default()
    }

    /// Ordinals whose identifier is `id`.
    pub fn ordinals_for_id(&self, id: &str) -> &[DocOrdinal] {
        self.postings
            .get(ID_FIELD)
            .and_then(|dict| dict.get(id))
            .map_or(&[][..], |list| list.ordinals())
    }

    /// Raw stored record of `ordinal`.
    pub fn read_stored_record(&self, ordinal: DocOrdinal) -> Result<Vec<u8>> {
        let pointer = self.pointers.get(ordinal as usize).ok_or_else(|| {
            QuiverError::other(format!(
                "ordinal {ordinal} out of range for segment {}",
                self.name
            ))
        })?;
        stored::read_record(self.storage.as_ref(), &stored_file_name(&self.name), *pointer)
    }

    /// Visit the stored fields of `ordinal` until `visitor` returns `false`.
    ///
    /// Numeric and date values are passed in their 8-byte encoded form.
    pub fn visit_stored_fields<F>(&self, ordinal: DocOrdinal, visitor: F) -> Result<()>
    where
        F: FnMut(&str, FieldKind, &[u8]) -> bool,
    {
        stored::visit_record(&self.read_stored_record(ordinal)?, visitor)
    }

    /// Decoded stored fields of `ordinal`, `_id` first.
    pub fn stored_fields(&self, ordinal: DocOrdinal) -> Result<Vec<(String, FieldValue)>> {
        stored::decode_record(&self.read_stored_record(ordinal)?)
    }

    /// The current tombstones.
    pub fn tombstones(&self) -> Arc<Tombstones> {
        self.tombstones.read().clone()
    }

    /// Whether `ordinal` is live under the current tombstones.
    pub fn is_live(&self, ordinal: DocOrdinal) -> bool {
        ordinal < self.doc_count && !self.tombstones.read().is_deleted(ordinal)
    }

    /// Delete `ordinals` by swapping in a new tombstone bitmap. Holders of
    /// the previous bitmap keep seeing it unchanged.
    pub fn mark_deleted(&self, ordinals: &[DocOrdinal]) -> Arc<Tombstones> {
        let mut current = self.tombstones.write();
        if let Some(next) = current.with_deleted(ordinals) {
            *current = Arc::new(next);
        }
        current.clone()
    }

    /// Schedule the segment's files for deletion once it is dropped.
    pub fn mark_obsolete(&self) {
        self.obsolete.store(true, Ordering::Release);
    }

    /// Whether the segment has been superseded.
    pub fn is_obsolete(&self) -> bool {
        self.obsolete.load(Ordering::Acquire)
    }

    /// Files currently making up the segment.
    pub fn file_names(&self) -> Vec<String> {
        let mut files = vec![index_file_name(&self.name), stored_file_name(&self.name)];
        let generation = self.tombstones.read().generation();
        if generation > 0 {
            files.push(Tombstones::file_name(&self.name, generation));
        }
        files
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        if !self.is_obsolete() {
            return;
        }
        for file in self.file_names() {
            if let Err(e) = self.storage.delete_file(&file) {
                warn!("failed to delete {file}: {e}");
            }
        }
        debug!("reclaimed segment {}", self.name);
    }
}
