//! Immutable index segments.
//!
//! A segment is written once by [`SegmentBuilder`] (or by
//! [`merge::merge_segments`]) and never changes afterwards, except for its
//! tombstone bitmap, which is replaced copy-on-write by the writer.
//!
//! On storage a segment named `seg_0000000001` consists of:
//!
//! - `seg_0000000001.idx`: header, field table, postings, doc-values, norms
//!   and stored-record pointers, followed by a CRC32;
//! - `seg_0000000001.fdt`: stored-field records, read lazily per match;
//! - `seg_0000000001_<gen>.del`: tombstones at generation `gen` (absent
//!   while nothing is deleted).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::document::field::FieldKind;

pub mod builder;
pub mod doc_values;
pub mod merge;
pub mod postings;
pub mod reader;
pub mod stored;
pub mod tombstones;

pub use builder::SegmentBuilder;
pub use reader::Segment;
pub use tombstones::Tombstones;

/// Position of a document within its segment, assigned in submission order.
pub type DocOrdinal = u32;

/// Magic number at the start of every `.idx` file ("QSEG").
pub const SEGMENT_MAGIC: u32 = 0x5153_4547;

/// Current `.idx` format version.
pub const SEGMENT_VERSION: u32 = 1;

/// Name of the index file of a segment.
pub fn index_file_name(segment: &str) -> String {
    format!("{segment}.idx")
}

/// Name of the stored-fields file of a segment.
pub fn stored_file_name(segment: &str) -> String {
    format!("{segment}.fdt")
}

/// Entry of a segment's field table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    /// Field name.
    pub name: String,
    /// Kind shared by every value of the field.
    pub kind: FieldKind,
    /// The field has a term dictionary.
    pub postings: bool,
    /// The field has a doc-values column.
    pub doc_values: bool,
}

/// A segment together with the tombstones captured when a snapshot was taken.
#[derive(Debug, Clone)]
pub struct SegmentView {
    segment: Arc<Segment>,
    tombstones: Arc<Tombstones>,
}

impl SegmentView {
    /// Pair a segment with its current tombstones.
    pub fn new(segment: Arc<Segment>) -> Self {
        let tombstones = segment.tombstones();
        SegmentView {
            segment,
            tombstones,
        }
    }

    /// Pair a segment with explicit tombstones.
    pub fn with_tombstones(segment: Arc<Segment>, tombstones: Arc<Tombstones>) -> Self {
        SegmentView {
            segment,
            tombstones,
        }
    }

    /// The underlying segment.
    pub fn segment(&self) -> &Arc<Segment> {
        &self.segment
    }

    /// The captured tombstones.
    pub fn tombstones(&self) -> &Arc<Tombstones> {
        &self.tombstones
    }

    /// Whether `ordinal` is live in this view.
    pub fn is_live(&self, ordinal: DocOrdinal) -> bool {
        ordinal < self.segment.doc_count() && !self.tombstones.is_deleted(ordinal)
    }

    /// Number of live documents in this view.
    pub fn live_count(&self) -> u32 {
        self.tombstones.live_count()
    }
}
