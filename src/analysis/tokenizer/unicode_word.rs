//! Unicode word tokenizer.
//!
//! Splits text on Unicode word boundaries (UAX #29) and keeps only the
//! segments that contain at least one alphanumeric character, so whitespace
//! and punctuation never become terms.
//!
//! ```
//! use quiver::analysis::tokenizer::Tokenizer;
//! use quiver::analysis::tokenizer::unicode_word::UnicodeWordTokenizer;
//!
//! let tokenizer = UnicodeWordTokenizer::new();
//! let tokens: Vec<_> = tokenizer.tokenize("Hello, world! café").unwrap().collect();
//! assert_eq!(tokens.len(), 3);
//! assert_eq!(tokens[0].text, "Hello");
//! assert_eq!(tokens[2].text, "café");
//! ```

use unicode_segmentation::UnicodeSegmentation;

use crate::analysis::token::{Token, TokenStream};
use crate::analysis::tokenizer::Tokenizer;
use crate::error::Result;

/// A tokenizer that splits text on Unicode word boundaries.
#[derive(Clone, Debug, Default)]
pub struct UnicodeWordTokenizer;

impl UnicodeWordTokenizer {
    /// Create a new Unicode word tokenizer.
    pub fn new() -> Self {
        UnicodeWordTokenizer
    }
}

impl Tokenizer for UnicodeWordTokenizer {
    fn tokenize<'a>(&self, text: &'a str) -> Result<TokenStream<'a>> {
        let tokens = text
            .split_word_bound_indices()
            .filter(|(_, word)| word.chars().any(|c| c.is_alphanumeric()))
            .enumerate()
            .map(|(position, (start, word))| {
                Token::with_offsets(word, position, start, start + word.len())
            });

        Ok(Box::new(tokens))
    }

    fn name(&self) -> &'static str {
        "unicode_word"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unicode_word_tokenizer() {
        let tokenizer = UnicodeWordTokenizer::new();
        let tokens: Vec<Token> = tokenizer.tokenize("hello, world!").unwrap().collect();

        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].text, "hello");
        assert_eq!(tokens[1].text, "world");
        assert_eq!(tokens[1].position, 1);
        assert_eq!(tokens[1].start_offset, 7);
        assert_eq!(tokens[1].end_offset, 12);
    }

    #[test]
    fn test_repeated_words_have_distinct_offsets() {
        let tokenizer = UnicodeWordTokenizer::new();
        let tokens: Vec<Token> = tokenizer.tokenize("go go").unwrap().collect();
        assert_eq!(tokens[0].start_offset, 0);
        assert_eq!(tokens[1].start_offset, 3);
    }

    #[test]
    fn test_stream_is_restartable() {
        let tokenizer = UnicodeWordTokenizer::new();
        let first: Vec<Token> = tokenizer.tokenize("a-b c").unwrap().collect();
        let second: Vec<Token> = tokenizer.tokenize("a-b c").unwrap().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_punctuation_only() {
        let tokenizer = UnicodeWordTokenizer::new();
        assert_eq!(tokenizer.tokenize(" ,.!? ").unwrap().count(), 0);
    }

    #[test]
    fn test_tokenizer_name() {
        assert_eq!(UnicodeWordTokenizer::new().name(), "unicode_word");
    }
}
