//! Lowercase filter implementation.
//!
//! ```
//! use quiver::analysis::token::Token;
//! use quiver::analysis::token_filter::Filter;
//! use quiver::analysis::token_filter::lowercase::LowercaseFilter;
//!
//! let filter = LowercaseFilter::new();
//! let tokens = vec![Token::new("Hello", 0), Token::new("WORLD", 1)];
//! let filtered: Vec<_> = filter.filter(Box::new(tokens.into_iter())).unwrap().collect();
//!
//! assert_eq!(filtered[0].text, "hello");
//! assert_eq!(filtered[1].text, "world");
//! ```

use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::Filter;
use crate::error::Result;

/// A filter that converts tokens to lowercase.
///
/// ASCII-only tokens take a fast path; everything else goes through
/// Unicode-aware lowercasing. Positions and offsets are preserved.
#[derive(Clone, Debug, Default)]
pub struct LowercaseFilter;

impl LowercaseFilter {
    /// Create a new lowercase filter.
    pub fn new() -> Self {
        LowercaseFilter
    }
}

impl Filter for LowercaseFilter {
    fn filter<'a>(&self, tokens: TokenStream<'a>) -> Result<TokenStream<'a>> {
        Ok(Box::new(tokens.map(|mut token| {
            if token.text.is_ascii() {
                token.text.make_ascii_lowercase();
            } else {
                token.text = token.text.to_lowercase();
            }
            token
        })))
    }

    fn name(&self) -> &'static str {
        "lowercase"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::token::Token;

    #[test]
    fn test_lowercase_unicode() {
        let filter = LowercaseFilter::new();
        let tokens = vec![Token::new("ÉCOLE", 0), Token::new("Straße", 1)];
        let result: Vec<Token> = filter
            .filter(Box::new(tokens.into_iter()))
            .unwrap()
            .collect();

        assert_eq!(result[0].text, "école");
        assert_eq!(result[1].text, "straße");
        assert_eq!(result[1].position, 1);
    }
}
