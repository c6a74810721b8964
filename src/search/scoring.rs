//! BM25 relevance scoring for match queries.
//!
//! `idf = ln(1 + (N - df + 0.5) / (df + 0.5))` where `N` counts every
//! document in the snapshot and `df` every document containing the term,
//! deleted ones included. Each matched term adds
//! `idf * tf * (k1 + 1) / (tf + k1 * (1 - b + b * len / avg_len))`.

use serde::{Deserialize, Serialize};

/// Configuration for BM25.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// K1 parameter (term frequency saturation).
    pub k1: f64,

    /// B parameter (field length normalization).
    pub b: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig { k1: 1.2, b: 0.75 }
    }
}

impl ScoringConfig {
    /// Inverse document frequency. Always positive when `doc_freq <= doc_count`.
    pub fn idf(&self, doc_count: u64, doc_freq: u64) -> f64 {
        let n = doc_count as f64;
        let df = doc_freq as f64;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    /// Contribution of one matched term.
    pub fn term_score(&self, idf: f64, freq: u32, field_len: u32, avg_len: f64) -> f64 {
        let tf = freq as f64;
        let norm = if avg_len > 0.0 {
            1.0 - self.b + self.b * (field_len as f64 / avg_len)
        } else {
            1.0
        };
        idf * (tf * (self.k1 + 1.0)) / (tf + self.k1 * norm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idf_positive_and_decreasing() {
        let config = ScoringConfig::default();
        assert!(config.idf(10, 10) > 0.0);
        assert!(config.idf(10, 1) > config.idf(10, 5));
    }

    #[test]
    fn test_term_score_saturates() {
        let config = ScoringConfig::default();
        let idf = config.idf(100, 3);
        let one = config.term_score(idf, 1, 5, 5.0);
        let two = config.term_score(idf, 2, 5, 5.0);
        let many = config.term_score(idf, 50, 5, 5.0);
        assert!(one > 0.0);
        assert!(two > one);
        assert!(many < idf * (config.k1 + 1.0));
    }

    #[test]
    fn test_longer_fields_score_lower() {
        let config = ScoringConfig::default();
        let idf = config.idf(100, 3);
        assert!(config.term_score(idf, 1, 2, 5.0) > config.term_score(idf, 1, 20, 5.0));
    }
}
