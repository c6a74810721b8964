//! Tokenizers: the first stage of the analysis pipeline.

use crate::analysis::token::TokenStream;
use crate::error::Result;

pub mod unicode_word;

/// Trait for tokenizers that convert text into tokens.
///
/// The returned stream must be lazy and finite; calling `tokenize` again on
/// the same text must produce the same tokens.
pub trait Tokenizer: Send + Sync {
    /// Tokenize the given text into a stream of tokens.
    fn tokenize<'a>(&self, text: &'a str) -> Result<TokenStream<'a>>;

    /// Get the name of this tokenizer (for debugging and configuration).
    fn name(&self) -> &'static str;
}
