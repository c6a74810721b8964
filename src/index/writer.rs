//! The single index writer.
//!
//! Updates and deletes are buffered and published by [`IndexWriter::commit`]:
//!
//! 1. pending deletes are resolved into new tombstone bitmaps;
//! 2. buffered documents are written as a new segment;
//! 3. segments left without live documents are dropped, and if more than
//!    `merge_threshold` remain they are merged into one;
//! 4. tombstone files are written and the next manifest is published;
//! 5. only then is the in-memory snapshot swapped.
//!
//! A failure anywhere before step 5 removes the files the commit created and
//! keeps the buffer, so the commit can be retried.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use chrono::Utc;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};

use crate::analysis::analyzer::Analyzer;
use crate::document::document::Document;
use crate::document::field::FieldKind;
use crate::error::{QuiverError, Result};
use crate::index::config::{Config, WriterConfig};
use crate::index::manifest::{Manifest, SegmentEntry};
use crate::index::reader::{IndexReader, Snapshot};
use crate::segment::merge::{MergeStats, merge_segments};
use crate::segment::{
    DocOrdinal, Segment, SegmentBuilder, SegmentView, Tombstones, index_file_name,
    stored_file_name,
};
use crate::storage::{Storage, StorageFactory, StorageLock};

const WRITER_LOCK: &str = "writer";

/// One operation of a [`Batch`].
#[derive(Debug, Clone)]
pub enum BatchOp {
    /// Replace the document with the same identifier.
    Update(Document),
    /// Delete by identifier.
    Delete(String),
}

/// An ordered group of operations committed together.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the document with `document`'s identifier.
    pub fn update(&mut self, document: Document) -> &mut Self {
        self.ops.push(BatchOp::Update(document));
        self
    }

    /// Delete the document with identifier `id`.
    pub fn delete<S: Into<String>>(&mut self, id: S) -> &mut Self {
        self.ops.push(BatchOp::Delete(id.into()));
        self
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Check if the batch holds no operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The operations in order.
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }
}

/// Writer statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriterStats {
    /// Documents accepted by `update`.
    pub docs_added: u64,
    /// Identifiers passed to `delete`.
    pub deletes_requested: u64,
    /// Commits that published a new generation.
    pub commits: u64,
    /// Segments written from the buffer.
    pub segments_created: u64,
    /// Merges performed.
    pub merges: u64,
    /// Statistics of the most recent merge.
    pub last_merge: Option<MergeStats>,
}

struct WriterState {
    manifest: Manifest,
    segments: Vec<Arc<Segment>>,
    buffer: Vec<Document>,
    pending_deletes: AHashSet<String>,
    field_kinds: AHashMap<String, FieldKind>,
    lock: Option<Box<dyn StorageLock>>,
    closed: bool,
    stats: WriterStats,
}

impl WriterState {
    fn has_pending_work(&self) -> bool {
        !self.buffer.is_empty() || !self.pending_deletes.is_empty()
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(QuiverError::WriterClosed)
        } else {
            Ok(())
        }
    }

    fn buffer_update(&mut self, document: Document) {
        let id = document.id().to_string();
        self.buffer.retain(|buffered| buffered.id() != id);
        self.buffer.push(document);
        self.pending_deletes.insert(id);
        self.stats.docs_added += 1;
    }

    fn buffer_delete(&mut self, id: String) {
        self.buffer.retain(|buffered| buffered.id() != id);
        self.pending_deletes.insert(id);
        self.stats.deletes_requested += 1;
    }
}

/// A segment that stays in the manifest after a commit.
struct Kept {
    segment: Arc<Segment>,
    deletes: Vec<DocOrdinal>,
    tombstones: Arc<Tombstones>,
}

impl Kept {
    fn unchanged(segment: Arc<Segment>) -> Self {
        let tombstones = segment.tombstones();
        Kept {
            segment,
            deletes: Vec::new(),
            tombstones,
        }
    }

    fn view(&self) -> SegmentView {
        SegmentView::with_tombstones(Arc::clone(&self.segment), Arc::clone(&self.tombstones))
    }
}

/// A fully written, published commit waiting to be applied in memory.
struct CommitPlan {
    manifest: Manifest,
    kept: Vec<Kept>,
    retired: Vec<Arc<Segment>>,
    superseded_files: Vec<String>,
    segment_created: bool,
    merge: Option<MergeStats>,
}

/// Adds, replaces and deletes documents, and publishes snapshots.
///
/// One writer owns an index location at a time. The writer is `Send + Sync`:
/// mutations serialize on an internal mutex, while [`IndexWriter::reader`]
/// only copies the published snapshot pointer.
///
/// ```
/// use quiver::document::{Document, Field};
/// use quiver::index::{Config, IndexWriter};
/// use quiver::search::{MatchQuery, SearchContext, TopNSearch};
///
/// # fn main() -> quiver::error::Result<()> {
/// let writer = IndexWriter::open(Config::in_memory())?;
/// writer.update("a", Document::new("a").add_field(Field::text("name", "quiver")))?;
///
/// let reader = writer.reader();
/// let request = TopNSearch::new(10, MatchQuery::new("quiver").set_field("name"));
/// let ids: Vec<String> = reader
///     .search(&SearchContext::new(), &request)?
///     .map(|m| m?.id())
///     .collect::<quiver::error::Result<_>>()?;
/// assert_eq!(ids, vec!["a"]);
/// writer.close()?;
/// # Ok(())
/// # }
/// ```
pub struct IndexWriter {
    storage: Arc<dyn Storage>,
    config: WriterConfig,
    analyzer: Arc<dyn Analyzer>,
    state: Mutex<WriterState>,
    published: RwLock<Arc<Snapshot>>,
}

impl std::fmt::Debug for IndexWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("IndexWriter")
            .field("storage", &self.storage)
            .field("config", &self.config)
            .field("analyzer", &self.analyzer.name())
            .field("generation", &state.manifest.generation)
            .field("segments", &state.segments.len())
            .field("buffered_docs", &state.buffer.len())
            .field("closed", &state.closed)
            .field("stats", &state.stats)
            .finish()
    }
}

impl IndexWriter {
    /// Open (or create) the index described by `config`.
    ///
    /// Fails with [`QuiverError::Storage`] while another writer holds the
    /// index. A process that dies without closing its writer leaves the
    /// `writer.lock` file behind; once it is certain no writer is running,
    /// [`IndexWriter::force_unlock`] clears it.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let storage = StorageFactory::create(&config.storage)?;
        Self::with_storage(storage, config)
    }

    /// Remove a writer lock left behind by a crashed process. Returns whether
    /// a lock was present.
    ///
    /// Breaking the lock of a writer that is still running lets a second
    /// writer in and corrupts the index.
    pub fn force_unlock(config: &Config) -> Result<bool> {
        config.validate()?;
        let storage = StorageFactory::create(&config.storage)?;
        if !storage.lock_exists(WRITER_LOCK) {
            return Ok(false);
        }
        storage.break_lock(WRITER_LOCK)?;
        warn!("forced release of the writer lock");
        Ok(true)
    }

    /// Open an index on an already constructed storage backend. The storage
    /// part of `config` is ignored.
    pub fn with_storage(storage: Arc<dyn Storage>, config: Config) -> Result<Self> {
        let lock = storage.acquire_lock(WRITER_LOCK)?;
        let manifest = Manifest::load_latest(storage.as_ref())?.unwrap_or_default();

        let mut segments = Vec::with_capacity(manifest.segments.len());
        for entry in &manifest.segments {
            let segment = Segment::open(Arc::clone(&storage), &entry.name, entry.tombstone_generation)?;
            if segment.doc_count() != entry.doc_count {
                return Err(QuiverError::corruption(format!(
                    "segment {} has {} documents, manifest says {}",
                    entry.name,
                    segment.doc_count(),
                    entry.doc_count
                )));
            }
            segments.push(Arc::new(segment));
        }
        remove_orphans(storage.as_ref(), &manifest)?;

        let mut field_kinds = AHashMap::new();
        for segment in &segments {
            for info in segment.fields() {
                field_kinds.insert(info.name.clone(), info.kind);
            }
        }

        let views = segments.iter().cloned().map(SegmentView::new).collect();
        let snapshot = Snapshot::new(manifest.generation, views, Arc::clone(&config.analyzer));
        info!(
            "opened index at generation {} with {} segments",
            manifest.generation,
            segments.len()
        );

        Ok(IndexWriter {
            storage,
            config: config.writer,
            analyzer: config.analyzer,
            state: Mutex::new(WriterState {
                manifest,
                segments,
                buffer: Vec::new(),
                pending_deletes: AHashSet::new(),
                field_kinds,
                lock: Some(lock),
                closed: false,
                stats: WriterStats::default(),
            }),
            published: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// Replace whatever document has identifier `id` with `document`.
    ///
    /// `document` must carry the same identifier. With auto-commit on, the
    /// change is committed before returning; if that commit fails the
    /// document stays buffered.
    pub fn update(&self, id: &str, document: Document) -> Result<()> {
        let mut state = self.state.lock();
        state.check_open()?;
        if document.id() != id {
            return Err(QuiverError::invalid_field(format!(
                "document identifier '{}' does not match '{id}'",
                document.id()
            )));
        }
        let kinds = checked_kinds(&state.field_kinds, std::slice::from_ref(&document))?;

        state.field_kinds = kinds;
        state.buffer_update(document);
        self.after_mutation(&mut state)
    }

    /// Delete the document with identifier `id`, if any.
    pub fn delete(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.check_open()?;
        state.buffer_delete(id.to_string());
        self.after_mutation(&mut state)
    }

    /// Apply `batch` in order and commit it as one unit. Every document is
    /// validated before anything is applied.
    pub fn batch(&self, batch: Batch) -> Result<()> {
        let mut state = self.state.lock();
        state.check_open()?;

        let updates: Vec<Document> = batch
            .ops
            .iter()
            .filter_map(|op| match op {
                BatchOp::Update(document) => Some(document.clone()),
                BatchOp::Delete(_) => None,
            })
            .collect();
        let kinds = checked_kinds(&state.field_kinds, &updates)?;

        state.field_kinds = kinds;
        for op in batch.ops {
            match op {
                BatchOp::Update(document) => state.buffer_update(document),
                BatchOp::Delete(id) => state.buffer_delete(id),
            }
        }
        self.commit_locked(&mut state)
    }

    /// Publish everything buffered so far.
    pub fn commit(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.check_open()?;
        self.commit_locked(&mut state)
    }

    /// A reader over the most recently published snapshot.
    pub fn reader(&self) -> IndexReader {
        IndexReader::new(Arc::clone(&self.published.read()))
    }

    /// Commit buffered work and release the index. Later operations fail
    /// with [`QuiverError::WriterClosed`]; closing again is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        self.commit_locked(&mut state)?;

        if let Some(mut lock) = state.lock.take() {
            lock.release()?;
        }
        state.closed = true;
        info!("closed index writer at generation {}", state.manifest.generation);
        Ok(())
    }

    /// Check if the writer has been closed.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Documents buffered and not yet committed.
    pub fn pending_docs(&self) -> usize {
        self.state.lock().buffer.len()
    }

    /// Writer statistics.
    pub fn stats(&self) -> WriterStats {
        self.state.lock().stats.clone()
    }

    /// Writer options in effect.
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    fn after_mutation(&self, state: &mut WriterState) -> Result<()> {
        if self.config.auto_commit || state.buffer.len() >= self.config.max_buffered_docs {
            self.commit_locked(state)
        } else {
            Ok(())
        }
    }

    fn commit_locked(&self, state: &mut WriterState) -> Result<()> {
        if !state.has_pending_work() {
            return Ok(());
        }

        let mut created = Vec::new();
        match self.prepare_commit(state, &mut created) {
            Ok(Some(plan)) => {
                self.apply_commit(state, plan);
                Ok(())
            }
            Ok(None) => {
                state.pending_deletes.clear();
                Ok(())
            }
            Err(e) => {
                remove_files(self.storage.as_ref(), &created);
                warn!("commit failed, previous generation kept: {e}");
                Err(e.into_commit())
            }
        }
    }

    /// Write every file of the next generation and publish its manifest.
    /// Returns `None` when the pending work changes nothing.
    fn prepare_commit(
        &self,
        state: &WriterState,
        created: &mut Vec<String>,
    ) -> Result<Option<CommitPlan>> {
        let storage = self.storage.as_ref();
        let mut manifest = state.manifest.clone();
        manifest.generation += 1;

        let mut survivors = Vec::with_capacity(state.segments.len());
        let mut retired = Vec::new();
        for segment in &state.segments {
            let mut deletes: Vec<DocOrdinal> = state
                .pending_deletes
                .iter()
                .flat_map(|id| segment.ordinals_for_id(id).iter().copied())
                .collect();
            deletes.sort_unstable();

            let current = segment.tombstones();
            match current.with_deleted(&deletes) {
                Some(next) if next.live_count() == 0 => retired.push(Arc::clone(segment)),
                Some(next) => survivors.push(Kept {
                    segment: Arc::clone(segment),
                    deletes,
                    tombstones: Arc::new(next),
                }),
                None => survivors.push(Kept::unchanged(Arc::clone(segment))),
            }
        }

        let mut segment_created = false;
        if !state.buffer.is_empty() {
            let name = manifest.allocate_segment_name();
            let mut builder = SegmentBuilder::new(Arc::clone(&self.analyzer));
            for document in &state.buffer {
                builder.add(document)?;
            }
            builder.write(storage, &name)?;
            created.push(index_file_name(&name));
            created.push(stored_file_name(&name));

            let segment = Segment::open(Arc::clone(&self.storage), &name, 0)?;
            survivors.push(Kept::unchanged(Arc::new(segment)));
            segment_created = true;
        }

        let changed = segment_created
            || !retired.is_empty()
            || survivors.iter().any(|kept| !kept.deletes.is_empty());
        if !changed {
            return Ok(None);
        }

        let threshold = self.config.merge_threshold;
        let mut merge = None;
        let kept = if threshold > 0 && survivors.len() > threshold {
            let views: Vec<SegmentView> = survivors.iter().map(Kept::view).collect();
            let name = manifest.allocate_segment_name();
            let merged = merge_segments(&views, Arc::clone(&self.storage), &name)?;
            retired.extend(survivors.into_iter().map(|kept| kept.segment));

            match merged {
                Some(result) => {
                    created.push(index_file_name(&name));
                    created.push(stored_file_name(&name));
                    merge = Some(result.stats);
                    vec![Kept::unchanged(Arc::new(result.segment))]
                }
                None => Vec::new(),
            }
        } else {
            for kept in survivors.iter().filter(|kept| !kept.deletes.is_empty()) {
                created.push(kept.tombstones.write(storage, kept.segment.name())?);
            }
            survivors
        };

        let mut superseded_files = Vec::new();
        for kept in kept.iter().filter(|kept| !kept.deletes.is_empty()) {
            let previous = kept.segment.tombstones().generation();
            if previous > 0 {
                superseded_files.push(Tombstones::file_name(kept.segment.name(), previous));
            }
        }
        if state.manifest.generation > 0 {
            superseded_files.push(Manifest::file_name(state.manifest.generation));
        }

        manifest.segments = kept
            .iter()
            .map(|kept| SegmentEntry {
                name: kept.segment.name().to_string(),
                doc_count: kept.segment.doc_count(),
                tombstone_generation: kept.tombstones.generation(),
            })
            .collect();
        manifest.committed_at = Utc::now();
        manifest.save(storage)?;

        Ok(Some(CommitPlan {
            manifest,
            kept,
            retired,
            superseded_files,
            segment_created,
            merge,
        }))
    }

    /// Swap in a published commit. Nothing here can fail.
    fn apply_commit(&self, state: &mut WriterState, plan: CommitPlan) {
        let mut views = Vec::with_capacity(plan.kept.len());
        let mut segments = Vec::with_capacity(plan.kept.len());
        for kept in plan.kept {
            let tombstones = if kept.deletes.is_empty() {
                kept.tombstones
            } else {
                kept.segment.mark_deleted(&kept.deletes)
            };
            views.push(SegmentView::with_tombstones(
                Arc::clone(&kept.segment),
                tombstones,
            ));
            segments.push(kept.segment);
        }
        for segment in &plan.retired {
            segment.mark_obsolete();
        }

        let generation = plan.manifest.generation;
        let snapshot = Snapshot::new(generation, views, Arc::clone(&self.analyzer));
        *self.published.write() = Arc::new(snapshot);

        let buffered = state.buffer.len();
        state.manifest = plan.manifest;
        state.segments = segments;
        state.buffer.clear();
        state.pending_deletes.clear();
        state.stats.commits += 1;
        if plan.segment_created {
            state.stats.segments_created += 1;
        }
        if let Some(merge) = plan.merge {
            state.stats.merges += 1;
            state.stats.last_merge = Some(merge);
        }

        remove_files(self.storage.as_ref(), &plan.superseded_files);
        info!(
            "committed generation {generation}: {buffered} documents flushed, {} segments live, {} retired",
            state.segments.len(),
            plan.retired.len()
        );
    }
}

impl Drop for IndexWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("failed to close index writer: {e}");
        }
    }
}

/// Field kinds after accepting `documents`, or the first invalid field.
fn checked_kinds(
    known: &AHashMap<String, FieldKind>,
    documents: &[Document],
) -> Result<AHashMap<String, FieldKind>> {
    let mut kinds = known.clone();
    for document in documents {
        document.validate()?;
        for field in document.fields() {
            let kind = *kinds.entry(field.name().to_string()).or_insert(field.kind());
            if kind != field.kind() {
                return Err(QuiverError::invalid_field(format!(
                    "field '{}' is {:?} but was given a {:?} value",
                    field.name(),
                    kind,
                    field.kind()
                )));
            }
        }
    }
    Ok(kinds)
}

fn remove_files(storage: &dyn Storage, files: &[String]) {
    for file in files {
        match storage.delete_file(file) {
            Ok(()) => debug!("removed {file}"),
            Err(e) => warn!("failed to remove {file}: {e}"),
        }
    }
}

/// Delete index files left behind by interrupted commits.
fn remove_orphans(storage: &dyn Storage, manifest: &Manifest) -> Result<()> {
    let referenced: AHashSet<String> = manifest.referenced_files().into_iter().collect();
    let orphans: Vec<String> = storage
        .list_files()?
        .into_iter()
        .filter(|file| file.starts_with("seg_") || file.starts_with("manifest_"))
        .filter(|file| !referenced.contains(file))
        .collect();
    if !orphans.is_empty() {
        info!("removing {} orphaned files", orphans.len());
        remove_files(storage, &orphans);
    }
    Ok(())
}
