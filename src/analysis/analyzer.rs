//! Analyzers: complete text-to-terms pipelines.
//!
//! ```text
//! Raw Text -> Tokenizer -> Filter 1 -> ... -> Filter N -> Token Stream
//! ```

use crate::analysis::token::TokenStream;
use crate::error::Result;

pub mod standard;

/// Trait for analyzers that convert text into processed tokens.
pub trait Analyzer: Send + Sync {
    /// Analyze the given text into a lazy stream of tokens.
    fn analyze<'a>(&self, text: &'a str) -> Result<TokenStream<'a>>;

    /// Get the name of this analyzer (for debugging and configuration).
    fn name(&self) -> &'static str;

    /// Collect the analyzed term texts.
    fn terms(&self, text: &str) -> Result<Vec<String>> {
        Ok(self.analyze(text)?.map(|token| token.text).collect())
    }
}
