//! Segment merging.
//!
//! Live documents of several segments are copied into one new segment.
//! Postings, doc-values and norms are remapped to new ordinals directly, so
//! text is never analyzed again; stored records are copied byte for byte.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use log::info;

use crate::error::{QuiverError, Result};
use crate::segment::builder::SegmentParts;
use crate::segment::doc_values::DocValuesBuilder;
use crate::segment::postings::{FieldNorms, PostingList, TermDictionary};
use crate::segment::{DocOrdinal, Segment, SegmentView};
use crate::storage::Storage;

/// Statistics about a merge operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeStats {
    /// Number of segments merged.
    pub segments_merged: usize,
    /// Live documents copied.
    pub docs_processed: u64,
    /// Deleted documents dropped.
    pub deleted_docs_removed: u64,
    /// Distinct terms in the merged segment.
    pub terms_merged: u64,
    /// Postings in the merged segment.
    pub postings_merged: u64,
    /// Time taken in milliseconds.
    pub merge_time_ms: u64,
}

/// Result of a merge operation.
#[derive(Debug)]
pub struct MergeResult {
    /// The new segment, opened.
    pub segment: Segment,
    /// What the merge did.
    pub stats: MergeStats,
}

/// Ordinal remapping of one input view: `Some(new)` for live documents.
fn remap(view: &SegmentView, next: &mut DocOrdinal) -> Vec<Option<DocOrdinal>> {
    (0..view.segment().doc_count())
        .map(|ordinal| {
            view.is_live(ordinal).then(|| {
                let assigned = *next;
                *next += 1;
                assigned
            })
        })
        .collect()
}

/// Merge the live documents of `views` into a new segment called `name`.
///
/// Returns `None` without writing anything if no document is live.
pub fn merge_segments(
    views: &[SegmentView],
    storage: Arc<dyn Storage>,
    name: &str,
) -> Result<Option<MergeResult>> {
    let start = Instant::now();
    let mut next = 0;
    let maps: Vec<Vec<Option<DocOrdinal>>> = views.iter().map(|v| remap(v, &mut next)).collect();
    if next == 0 {
        return Ok(None);
    }

    let mut parts = SegmentParts {
        doc_count: next,
        ..Default::default()
    };
    let mut postings: BTreeMap<String, BTreeMap<String, PostingList>> = BTreeMap::new();
    let mut doc_values: BTreeMap<String, DocValuesBuilder> = BTreeMap::new();
    let mut norms: BTreeMap<String, Vec<u32>> = BTreeMap::new();
    let mut stats = MergeStats {
        segments_merged: views.len(),
        docs_processed: next as u64,
        ..Default::default()
    };

    for (view, map) in views.iter().zip(&maps) {
        let segment = view.segment();
        stats.deleted_docs_removed += map.iter().filter(|m| m.is_none()).count() as u64;

        for info in segment.fields() {
            let merged = parts
                .fields
                .entry(info.name.clone())
                .or_insert_with(|| info.clone());
            if merged.kind != info.kind {
                return Err(QuiverError::corruption(format!(
                    "field '{}' has conflicting kinds across segments",
                    info.name
                )));
            }
            merged.postings |= info.postings;
            merged.doc_values |= info.doc_values;

            if let Some(dict) = segment.terms(&info.name) {
                let merged_terms = postings.entry(info.name.clone()).or_default();
                for (term, list) in dict.iter() {
                    for (ordinal, freq) in list.iter() {
                        if let Some(new) = map[ordinal as usize] {
                            merged_terms
                                .entry(term.to_string())
                                .or_default()
                                .push(new, freq);
                        }
                    }
                }
            }

            if let Some(column) = segment.doc_values(&info.name) {
                let builder = doc_values
                    .entry(info.name.clone())
                    .or_insert_with(|| DocValuesBuilder::new(column.kind()));
                // First values go in before the remaining entries so each
                // document keeps its first value.
                for (ordinal, new) in map.iter().enumerate() {
                    if let (Some(new), Some(value)) = (new, column.get(ordinal as DocOrdinal)) {
                        builder.add(*new, value);
                    }
                }
                for &(value, ordinal) in column.sorted() {
                    if let Some(new) = map[ordinal as usize] {
                        builder.add(new, value);
                    }
                }
            }

            if info.postings && info.name != crate::document::ID_FIELD {
                let lengths = norms
                    .entry(info.name.clone())
                    .or_insert_with(|| vec![0; next as usize]);
                for (ordinal, new) in map.iter().enumerate() {
                    if let Some(new) = new {
                        lengths[*new as usize] = segment.norm(&info.name, ordinal as DocOrdinal);
                    }
                }
            }
        }

        for (ordinal, new) in map.iter().enumerate() {
            if new.is_some() {
                parts
                    .stored
                    .push(segment.read_stored_record(ordinal as DocOrdinal)?);
            }
        }
    }

    for (field, terms) in postings {
        let terms: Vec<(String, PostingList)> =
            terms.into_iter().filter(|(_, list)| !list.is_empty()).collect();
        stats.terms_merged += terms.len() as u64;
        stats.postings_merged += terms.iter().map(|(_, list)| list.len() as u64).sum::<u64>();
        parts
            .postings
            .insert(field, TermDictionary::from_sorted(terms));
    }
    parts.doc_values = doc_values
        .into_iter()
        .map(|(field, builder)| (field, builder.finish(next)))
        .collect();
    parts.norms = norms
        .into_iter()
        .map(|(field, lengths)| (field, FieldNorms::from_lengths(lengths)))
        .collect();

    parts.write(storage.as_ref(), name)?;
    let segment = Segment::open(storage, name, 0)?;

    stats.merge_time_ms = start.elapsed().as_millis() as u64;
    info!(
        "merged {} segments into {name}: {} docs kept, {} deleted dropped",
        stats.segments_merged, stats.docs_processed, stats.deleted_docs_removed
    );

    Ok(Some(MergeResult { segment, stats }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyzer::standard::StandardAnalyzer;
    use crate::document::document::Document;
    use crate::document::field::{Field, FieldValue};
    use crate::segment::SegmentBuilder;
    use crate::storage::memory::MemoryStorage;

    fn segment(storage: &Arc<MemoryStorage>, name: &str, docs: &[(&str, &str, f64)]) -> Arc<Segment> {
        let mut builder = SegmentBuilder::new(Arc::new(StandardAnalyzer::new()));
        for (id, text, age) in docs {
            builder
                .add(
                    &Document::new(*id)
                        .add_field(Field::text("body", *text).store_value())
                        .add_field(Field::numeric("age", *age)),
                )
                .unwrap();
        }
        Arc::new(builder.build(storage.clone(), name).unwrap())
    }

    #[test]
    fn test_merge_keeps_only_live_documents() {
        let storage = Arc::new(MemoryStorage::new());
        let first = segment(&storage, "seg_1", &[("a", "red fish", 1.0), ("b", "blue fish", 2.0)]);
        let second = segment(&storage, "seg_2", &[("c", "red bird", 3.0)]);
        first.mark_deleted(&[0]);

        let views = vec![SegmentView::new(first), SegmentView::new(second)];
        let result = merge_segments(&views, storage.clone(), "seg_3").unwrap().unwrap();
        let merged = result.segment;

        assert_eq!(merged.doc_count(), 2);
        assert_eq!(result.stats.deleted_docs_removed, 1);
        assert_eq!(merged.ordinals_for_id("b"), &[0]);
        assert_eq!(merged.ordinals_for_id("c"), &[1]);
        assert!(merged.ordinals_for_id("a").is_empty());
        assert_eq!(merged.postings("body", "red").unwrap().ordinals(), &[1]);
        assert_eq!(merged.postings("body", "fish").unwrap().ordinals(), &[0]);
        assert_eq!(merged.norm("body", 1), 2);
        assert_eq!(merged.doc_values("age").unwrap().value(1), Some(FieldValue::Numeric(3.0)));
        assert_eq!(
            merged.stored_fields(0).unwrap()[1],
            ("body".to_string(), FieldValue::Text("blue fish".to_string()))
        );
    }

    #[test]
    fn test_merge_of_nothing_live() {
        let storage = Arc::new(MemoryStorage::new());
        let only = segment(&storage, "seg_1", &[("a", "x", 1.0)]);
        only.mark_deleted(&[0]);

        let result = merge_segments(&[SegmentView::new(only)], storage.clone(), "seg_2").unwrap();
        assert!(result.is_none());
        assert!(!storage.file_exists("seg_2.idx"));
    }
}
