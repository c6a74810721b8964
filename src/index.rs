//! Index lifecycle: configuration, manifests, the writer and readers.

pub mod config;
pub mod manifest;
pub mod reader;
pub mod writer;

pub use config::{Config, WriterConfig};
pub use manifest::{Manifest, SegmentEntry};
pub use reader::IndexReader;
pub use writer::{Batch, BatchOp, IndexWriter, WriterStats};
