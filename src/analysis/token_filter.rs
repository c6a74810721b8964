//! Token filters: transformations applied after tokenization.

use crate::analysis::token::TokenStream;
use crate::error::Result;

pub mod lowercase;

/// Trait for filters that transform a token stream.
pub trait Filter: Send + Sync {
    /// Apply this filter to a token stream.
    fn filter<'a>(&self, tokens: TokenStream<'a>) -> Result<TokenStream<'a>>;

    /// Get the name of this filter.
    fn name(&self) -> &'static str;
}
