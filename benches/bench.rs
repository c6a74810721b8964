//! Criterion benchmarks for Quiver.
//!
//! Covers the hot paths of the index:
//! - Text analysis
//! - Field encoding
//! - Committing buffered documents
//! - Match and range search, sequential and parallel

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use quiver::analysis::analyzer::Analyzer;
use quiver::analysis::analyzer::standard::StandardAnalyzer;
use quiver::codec;
use quiver::document::{Document, Field};
use quiver::index::{Config, IndexWriter};
use quiver::search::{MatchQuery, NumericRangeQuery, SearchContext, TopNSearch};
use std::hint::black_box;

const WORDS: [&str; 24] = [
    "search", "engine", "full", "text", "index", "query", "document", "field", "term",
    "segment", "range", "numeric", "date", "score", "relevance", "tombstone", "manifest",
    "snapshot", "reader", "writer", "merge", "postings", "storage", "commit",
];

/// Generate test documents for benchmarking.
fn generate_test_documents(count: usize) -> Vec<Document> {
    (0..count)
        .map(|i| {
            let text: Vec<&str> = (0..12).map(|j| WORDS[(i * 7 + j * 13) % WORDS.len()]).collect();
            Document::new(format!("doc{i}"))
                .add_field(Field::text("body", text.join(" ")))
                .add_field(Field::numeric("rank", (i % 1000) as f64))
        })
        .collect()
}

fn build_index(docs: &[Document], segments: usize) -> IndexWriter {
    let writer = IndexWriter::open(
        Config::in_memory()
            .with_auto_commit(false)
            .with_merge_threshold(0),
    )
    .unwrap();
    let per_segment = docs.len().div_ceil(segments);
    for chunk in docs.chunks(per_segment) {
        for doc in chunk {
            writer.update(doc.id(), doc.clone()).unwrap();
        }
        writer.commit().unwrap();
    }
    writer
}

/// Benchmark text analysis.
fn bench_text_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_analysis");

    let analyzer = StandardAnalyzer::new();
    let text = "The Quick Brown Fox jumps over the lazy dog; naïve café résumé 2024".repeat(8);

    group.throughput(Throughput::Bytes(text.len() as u64));
    group.bench_function("analyze_terms", |b| {
        b.iter(|| black_box(analyzer.terms(black_box(&text)).unwrap()))
    });

    group.finish();
}

/// Benchmark order-preserving encodings.
fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    let values: Vec<f64> = (0..1000).map(|i| (i as f64 - 500.0) * 1.25).collect();

    group.throughput(Throughput::Elements(values.len() as u64));
    group.bench_function("encode_f64", |b| {
        b.iter(|| {
            for value in &values {
                black_box(codec::encode_f64(black_box(*value)).unwrap());
            }
        })
    });

    group.finish();
}

/// Benchmark committing a buffer of documents as one segment.
fn bench_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit");
    group.sample_size(20);

    let docs = generate_test_documents(1000);
    group.throughput(Throughput::Elements(docs.len() as u64));
    group.bench_function("commit_1000_documents", |b| {
        b.iter_with_setup(
            || {
                let writer = IndexWriter::open(Config::in_memory().with_auto_commit(false)).unwrap();
                for doc in &docs {
                    writer.update(doc.id(), doc.clone()).unwrap();
                }
                writer
            },
            |writer| {
                writer.commit().unwrap();
                black_box(writer)
            },
        )
    });

    group.finish();
}

/// Benchmark search over a multi-segment snapshot.
fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");

    let docs = generate_test_documents(10_000);
    let writer = build_index(&docs, 8);
    let reader = writer.reader();
    let context = SearchContext::new();

    let match_request = TopNSearch::new(10, MatchQuery::new("segment merge").set_field("body"))
        .with_standard_aggregations();
    group.bench_function("match_top_10", |b| {
        b.iter(|| black_box(reader.search(&context, &match_request).unwrap().count()))
    });
    group.bench_function("match_top_10_parallel", |b| {
        b.iter(|| {
            black_box(
                reader
                    .search_parallel(&context, &match_request)
                    .unwrap()
                    .count(),
            )
        })
    });

    let range_request =
        TopNSearch::new(10, NumericRangeQuery::new(100.0, 200.0).set_field("rank"))
            .with_standard_aggregations();
    group.bench_function("numeric_range_top_10", |b| {
        b.iter(|| black_box(reader.search(&context, &range_request).unwrap().count()))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_text_analysis,
    bench_codec,
    bench_commit,
    bench_search
);

criterion_main!(benches);
