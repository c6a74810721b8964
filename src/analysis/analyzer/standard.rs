//! Standard analyzer: Unicode word segmentation followed by lowercasing.
//!
//! ```
//! use quiver::analysis::analyzer::Analyzer;
//! use quiver::analysis::analyzer::standard::StandardAnalyzer;
//!
//! let analyzer = StandardAnalyzer::new();
//! let terms = analyzer.terms("Hello, Quiver World!").unwrap();
//! assert_eq!(terms, vec!["hello", "quiver", "world"]);
//! ```

use crate::analysis::analyzer::Analyzer;
use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::Filter;
use crate::analysis::token_filter::lowercase::LowercaseFilter;
use crate::analysis::tokenizer::Tokenizer;
use crate::analysis::tokenizer::unicode_word::UnicodeWordTokenizer;
use crate::error::Result;

/// The default analyzer for text fields.
#[derive(Clone, Debug, Default)]
pub struct StandardAnalyzer {
    tokenizer: UnicodeWordTokenizer,
    lowercase: LowercaseFilter,
}

impl StandardAnalyzer {
    /// Create a new standard analyzer.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Analyzer for StandardAnalyzer {
    fn analyze<'a>(&self, text: &'a str) -> Result<TokenStream<'a>> {
        let tokens = self.tokenizer.tokenize(text)?;
        self.lowercase.filter(tokens)
    }

    fn name(&self) -> &'static str {
        "standard"
    }
}
