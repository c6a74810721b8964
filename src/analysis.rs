//! Text analysis: turning field text into index terms.
//!
//! The pipeline is a [`tokenizer::Tokenizer`] followed by zero or more
//! [`token_filter::Filter`]s, packaged as an [`analyzer::Analyzer`]. The same
//! analyzer runs at index time and when a match query is evaluated, so query
//! text and document text always produce comparable terms.

pub mod analyzer;
pub mod token;
pub mod token_filter;
pub mod tokenizer;
