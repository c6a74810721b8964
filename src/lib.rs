//! # Quiver
//!
//! A single-node document index with typed fields and ranked search.
//!
//! ## Features
//!
//! - Text, numeric and date/time fields with order-preserving encodings
//! - Immutable, checksummed segments with copy-on-write tombstones
//! - A single writer with atomic, crash-safe commits
//! - Point-in-time readers that never block on the writer
//! - Match (BM25), numeric range and date range queries
//! - Top-N collection with aggregations over every match
//!
//! ## Example
//!
//! ```
//! use quiver::prelude::*;
//!
//! # fn main() -> quiver::error::Result<()> {
//! let writer = IndexWriter::open(Config::in_memory())?;
//! writer.update(
//!     "a",
//!     Document::new("a").add_field(Field::numeric("age", 0.1)),
//! )?;
//!
//! let request = TopNSearch::new(10, NumericRangeQuery::new(0.0, 1.0).set_field("age"))
//!     .with_standard_aggregations();
//! let results = writer.reader().search(&SearchContext::new(), &request)?;
//! assert_eq!(results.aggregations().count(), Some(1));
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod codec;
pub mod document;
pub mod error;
pub mod index;
pub mod search;
pub mod segment;
pub mod storage;
pub mod util;

pub mod prelude {
    pub use crate::document::{Document, Field, FieldKind, FieldValue};
    pub use crate::error::{QuiverError, Result};
    pub use crate::index::{Batch, Config, IndexReader, IndexWriter};
    pub use crate::search::{
        Aggregation, DateRangeQuery, DocumentMatch, MatchQuery, NumericRangeQuery, Query,
        SearchContext, TopNSearch,
    };
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
