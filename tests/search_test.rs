use std::time::Duration;

use chrono::{TimeZone, Utc};

use quiver::document::{Document, Field};
use quiver::error::{QuiverError, Result};
use quiver::index::{Batch, Config, IndexReader, IndexWriter};
use quiver::search::{
    Aggregation, DateRangeQuery, MatchQuery, NumericRangeQuery, Query, SearchContext, TopNSearch,
};

const VALUES: [f64; 11] = [-5.5, -1.0, -0.0, 0.0, 0.25, 1.0, 1.0, 3.0, 7.5, 1e9, -1e-9];

const TEXTS: [&str; 6] = [
    "the quick brown fox",
    "quick quick fox",
    "a lazy dog sleeps in the sun all day long",
    "fox",
    "brown dog",
    "the fox and the dog and the quick cat",
];

fn numeric_index(config: Config) -> Result<IndexWriter> {
    let writer = IndexWriter::open(config.with_auto_commit(false))?;
    for (i, value) in VALUES.iter().enumerate() {
        let id = format!("n{i}");
        writer.update(&id, Document::new(&id).add_field(Field::numeric("v", *value)))?;
        // Spread documents over several segments.
        if i % 4 == 3 {
            writer.commit()?;
        }
    }
    writer.commit()?;
    Ok(writer)
}

fn text_index() -> Result<IndexWriter> {
    let writer = IndexWriter::open(Config::in_memory())?;
    for (i, text) in TEXTS.iter().enumerate() {
        let id = format!("t{i}");
        writer.update(
            &id,
            Document::new(&id)
                .add_field(Field::text("body", *text))
                .add_field(Field::numeric("rank", i as f64)),
        )?;
    }
    Ok(writer)
}

fn ranked(reader: &IndexReader, request: &TopNSearch) -> Result<Vec<(String, f64)>> {
    reader
        .search(&SearchContext::new(), request)?
        .map(|m| {
            let m = m?;
            Ok((m.id()?, m.score()))
        })
        .collect()
}

fn sorted_ids(reader: &IndexReader, query: impl Into<Query>) -> Result<Vec<String>> {
    let mut ids: Vec<String> = ranked(reader, &TopNSearch::new(100, query))?
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    ids.sort();
    Ok(ids)
}

#[test]
fn test_half_open_range_law() -> Result<()> {
    let writer = numeric_index(Config::in_memory())?;
    let reader = writer.reader();
    let bounds = [-10.0, -5.5, -1.0, -0.0, 0.0, 0.25, 1.0, 2.0, 7.5, 1e9, 1e10];

    for &min in &bounds {
        for &max in &bounds {
            let query = NumericRangeQuery::new(min, max).set_field("v");
            if min > max {
                assert!(reader.count(&query.into()).is_err());
                continue;
            }
            let mut expected: Vec<String> = VALUES
                .iter()
                .enumerate()
                .filter(|(_, v)| min <= **v && **v < max)
                .map(|(i, _)| format!("n{i}"))
                .collect();
            expected.sort();
            assert_eq!(sorted_ids(&reader, query)?, expected, "range [{min}, {max})");
        }
    }
    Ok(())
}

#[test]
fn test_inclusive_and_open_ended_ranges() -> Result<()> {
    let writer = numeric_index(Config::in_memory())?;
    let reader = writer.reader();

    let inclusive = NumericRangeQuery::new_inclusive(1.0, 3.0, true, true).set_field("v");
    assert_eq!(sorted_ids(&reader, inclusive)?, vec!["n5", "n6", "n7"]);

    let exclusive_min = NumericRangeQuery::new_inclusive(1.0, 3.0, false, true).set_field("v");
    assert_eq!(sorted_ids(&reader, exclusive_min)?, vec!["n7"]);

    let everything = NumericRangeQuery::new(f64::NEG_INFINITY, f64::INFINITY).set_field("v");
    assert_eq!(reader.count(&everything.into())?, VALUES.len() as u64);
    Ok(())
}

#[test]
fn test_date_ranges_beyond_nanosecond_range() -> Result<()> {
    let t = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
    let far_future = Utc.with_ymd_and_hms(3000, 1, 1, 0, 0, 0).unwrap();
    let far_past = Utc.with_ymd_and_hms(1000, 1, 1, 0, 0, 0).unwrap();

    let writer = IndexWriter::open(Config::in_memory())?;
    writer.update("a", Document::new("a").add_field(Field::datetime("updated", t)))?;
    let reader = writer.reader();

    let to_far_future = DateRangeQuery::new(t, far_future).set_field("updated");
    assert_eq!(sorted_ids(&reader, to_far_future)?, vec!["a"]);

    let from_far_past = DateRangeQuery::new(far_past, far_future).set_field("updated");
    assert_eq!(sorted_ids(&reader, from_far_past)?, vec!["a"]);

    let all_after = DateRangeQuery::new(far_future, far_future + chrono::Duration::days(1))
        .set_field("updated");
    assert!(sorted_ids(&reader, all_after)?.is_empty());

    let all_before = DateRangeQuery::new_inclusive(None, Some(far_past), true, true)
        .set_field("updated");
    assert!(sorted_ids(&reader, all_before)?.is_empty());
    Ok(())
}

#[test]
fn test_top_n_is_a_prefix_of_the_full_ranking() -> Result<()> {
    let writer = text_index()?;
    let reader = writer.reader();
    let query = MatchQuery::new("quick fox dog").set_field("body");

    let full = ranked(&reader, &TopNSearch::new(100, query.clone()))?;
    assert_eq!(full.len(), TEXTS.len());
    for pair in full.windows(2) {
        assert!(pair[0].1 >= pair[1].1);
    }

    for n in 0..=full.len() {
        let top = ranked(&reader, &TopNSearch::new(n, query.clone()))?;
        assert_eq!(top, full[..n].to_vec());
    }

    let page = ranked(&reader, &TopNSearch::new(2, query).set_from(2))?;
    assert_eq!(page, full[2..4].to_vec());
    Ok(())
}

#[test]
fn test_more_matched_terms_score_higher() -> Result<()> {
    let writer = IndexWriter::open(Config::in_memory())?;
    writer.update("one", Document::new("one").add_field(Field::text("body", "alpha gamma")))?;
    writer.update("two", Document::new("two").add_field(Field::text("body", "alpha beta")))?;

    let hits = ranked(
        &writer.reader(),
        &TopNSearch::new(10, MatchQuery::new("alpha beta alpha").set_field("body")),
    )?;
    assert_eq!(hits[0].0, "two");
    assert!(hits[0].1 > hits[1].1);
    assert!(hits[1].1 > 0.0);
    Ok(())
}

#[test]
fn test_boost_scales_scores() -> Result<()> {
    let writer = text_index()?;
    let reader = writer.reader();

    let plain = ranked(
        &reader,
        &TopNSearch::new(10, MatchQuery::new("fox").set_field("body")),
    )?;
    let boosted = ranked(
        &reader,
        &TopNSearch::new(10, MatchQuery::new("fox").set_field("body").with_boost(2.0)),
    )?;
    for ((id, score), (boosted_id, boosted_score)) in plain.iter().zip(&boosted) {
        assert_eq!(id, boosted_id);
        assert!((score * 2.0 - boosted_score).abs() < 1e-9);
    }
    Ok(())
}

#[test]
fn test_aggregations_cover_every_match() -> Result<()> {
    let writer = text_index()?;
    let reader = writer.reader();
    let query = MatchQuery::new("dog").set_field("body");
    let expected = reader.count(&query.clone().into())?;
    assert_eq!(expected, 3);

    for n in [0, 1, 2, 10] {
        let request = TopNSearch::new(n, query.clone())
            .with_standard_aggregations()
            .add_aggregation("rank_sum", Aggregation::Sum("rank".to_string()))
            .add_aggregation("rank_min", Aggregation::Min("rank".to_string()))
            .add_aggregation("rank_max", Aggregation::Max("rank".to_string()))
            .add_aggregation("rank_avg", Aggregation::Avg("rank".to_string()))
            .add_aggregation("missing_avg", Aggregation::Avg("missing".to_string()));
        let results = reader.search(&SearchContext::new(), &request)?;
        let aggregations = results.aggregations();

        assert_eq!(aggregations.count(), Some(expected));
        assert_eq!(aggregations.metric("rank_sum"), Some(2.0 + 4.0 + 5.0));
        assert_eq!(aggregations.metric("rank_min"), Some(2.0));
        assert_eq!(aggregations.metric("rank_max"), Some(5.0));
        assert_eq!(aggregations.metric("rank_avg"), Some(11.0 / 3.0));
        assert_eq!(aggregations.metric("missing_avg"), None);
        assert_eq!(results.total_hits(), expected);
        assert_eq!(results.count(), n.min(3));
    }
    Ok(())
}

#[test]
fn test_merge_preserves_results() -> Result<()> {
    let unmerged = numeric_index(Config::in_memory().with_merge_threshold(0))?;
    let merged = numeric_index(Config::in_memory().with_merge_threshold(1))?;
    for writer in [&unmerged, &merged] {
        let mut batch = Batch::new();
        batch.delete("n2").delete("n9");
        writer.batch(batch)?;
    }

    let (unmerged, merged) = (unmerged.reader(), merged.reader());
    assert!(unmerged.segment_count() > 1);
    assert_eq!(merged.segment_count(), 1);
    assert_eq!(unmerged.doc_count(), merged.doc_count());

    for (min, max) in [(-10.0, 10.0), (0.0, 1.0), (1.0, 1e10)] {
        let query = NumericRangeQuery::new(min, max).set_field("v");
        assert_eq!(
            sorted_ids(&unmerged, query.clone())?,
            sorted_ids(&merged, query)?
        );
    }
    Ok(())
}

#[test]
fn test_parallel_search_matches_sequential() -> Result<()> {
    let writer = IndexWriter::open(Config::in_memory().with_merge_threshold(0))?;
    for (i, text) in TEXTS.iter().cycle().take(40).enumerate() {
        let id = format!("d{i}");
        writer.update(&id, Document::new(&id).add_field(Field::text("body", *text)))?;
    }
    let reader = writer.reader();
    assert_eq!(reader.segment_count(), 40);

    let request = TopNSearch::new(7, MatchQuery::new("the quick dog").set_field("body"))
        .with_standard_aggregations();
    let sequential = reader.search(&SearchContext::new(), &request)?;
    let parallel = reader.search_parallel(&SearchContext::new(), &request)?;
    assert_eq!(
        sequential.aggregations().count(),
        parallel.aggregations().count()
    );

    let collect = |it: quiver::search::DocumentMatchIterator| -> Result<Vec<(String, f64)>> {
        it.map(|m| {
            let m = m?;
            Ok((m.id()?, m.score()))
        })
        .collect()
    };
    assert_eq!(collect(sequential)?, collect(parallel)?);
    Ok(())
}

#[test]
fn test_cancelled_and_expired_searches_fail() -> Result<()> {
    let writer = text_index()?;
    let reader = writer.reader();
    let request = TopNSearch::new(10, MatchQuery::new("fox").set_field("body"));

    let context = SearchContext::new();
    context.cancel();
    assert!(matches!(
        reader.search(&context, &request),
        Err(QuiverError::Cancelled(_))
    ));

    let expired = SearchContext::new().with_timeout(Duration::ZERO);
    std::thread::sleep(Duration::from_millis(5));
    assert!(matches!(
        reader.search(&expired, &request),
        Err(QuiverError::Cancelled(_))
    ));
    Ok(())
}

#[test]
fn test_invalid_queries_are_rejected() -> Result<()> {
    let writer = text_index()?;
    let reader = writer.reader();
    let context = SearchContext::new();

    let invalid: Vec<Query> = vec![
        MatchQuery::new("fox").into(),
        NumericRangeQuery::new(f64::NAN, 1.0).set_field("rank").into(),
        NumericRangeQuery::new(2.0, 1.0).set_field("rank").into(),
        MatchQuery::new("fox").set_field("body").with_boost(0.0).into(),
    ];
    for query in invalid {
        assert!(matches!(
            reader.search(&context, &TopNSearch::new(1, query)),
            Err(QuiverError::Query(_))
        ));
    }

    // Empty intervals and unknown fields are valid and match nothing.
    assert_eq!(
        reader.count(&NumericRangeQuery::new(1.0, 1.0).set_field("rank").into())?,
        0
    );
    assert_eq!(
        reader.count(&MatchQuery::new("fox").set_field("nope").into())?,
        0
    );
    Ok(())
}
