//! Documents and typed fields.
//!
//! A [`Document`](document::Document) is an external identifier plus an
//! ordered list of [`Field`](field::Field)s. The identifier is indexed and
//! stored under the reserved field name [`ID_FIELD`].

pub mod document;
pub mod field;

pub use document::Document;
pub use field::{Field, FieldKind, FieldValue};

/// Reserved field holding the document identifier.
pub const ID_FIELD: &str = "_id";
