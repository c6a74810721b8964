use chrono::{Duration, TimeZone, Utc};
use quiver::document::{Document, Field};
use quiver::error::Result;
use quiver::index::{Config, IndexReader, IndexWriter};
use quiver::search::{
    DateRangeQuery, MatchQuery, NumericRangeQuery, Query, SearchContext, TopNSearch,
};
use tempfile::TempDir;

fn matching_ids(reader: &IndexReader, query: impl Into<Query>) -> Result<Vec<String>> {
    let request = TopNSearch::new(10, query).with_standard_aggregations();
    let mut ids = Vec::new();
    for document_match in reader.search(&SearchContext::new(), &request)? {
        document_match?.visit_stored_fields(|field, value| {
            if field == "_id" {
                ids.push(String::from_utf8_lossy(value).into_owned());
            }
            true
        })?;
    }
    Ok(ids)
}

#[test]
fn test_text_match_scenario() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let writer = IndexWriter::open(Config::default_config(temp_dir.path()))?;

    let doc = Document::new("a").add_field(Field::text("name", "bluge"));
    writer.update(doc.id(), doc.clone())?;

    let reader = writer.reader();
    assert_eq!(
        matching_ids(&reader, MatchQuery::new("bluge").set_field("name"))?,
        vec!["a"]
    );
    assert!(matching_ids(&reader, MatchQuery::new("other").set_field("name"))?.is_empty());

    reader.close();
    writer.close()?;
    Ok(())
}

#[test]
fn test_numeric_range_scenario() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let writer = IndexWriter::open(Config::default_config(temp_dir.path()))?;

    writer.update("a", Document::new("a").add_field(Field::numeric("age", 0.1)))?;

    let reader = writer.reader();
    assert_eq!(
        matching_ids(&reader, NumericRangeQuery::new(0.0, 1.0).set_field("age"))?,
        vec!["a"]
    );
    assert!(matching_ids(&reader, NumericRangeQuery::new(0.2, 1.0).set_field("age"))?.is_empty());

    writer.close()?;
    Ok(())
}

#[test]
fn test_date_range_scenario() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let writer = IndexWriter::open(Config::default_config(temp_dir.path()))?;

    let now = Utc.with_ymd_and_hms(2021, 3, 14, 15, 9, 26).unwrap();
    writer.update("a", Document::new("a").add_field(Field::datetime("updated", now)))?;

    let reader = writer.reader();
    let hour = Duration::hours(1);
    assert_eq!(
        matching_ids(
            &reader,
            DateRangeQuery::new(now - hour, now + hour).set_field("updated")
        )?,
        vec!["a"]
    );
    assert!(
        matching_ids(
            &reader,
            DateRangeQuery::new(now + hour, now + hour * 2).set_field("updated")
        )?
        .is_empty()
    );

    // Half-open: the end bound itself is excluded.
    assert!(
        matching_ids(
            &reader,
            DateRangeQuery::new(now - hour, now).set_field("updated")
        )?
        .is_empty()
    );

    writer.close()?;
    Ok(())
}

#[test]
fn test_standard_aggregations() -> Result<()> {
    let writer = IndexWriter::open(Config::in_memory())?;
    for (id, age) in [("a", 0.1), ("b", 0.5), ("c", 2.0)] {
        writer.update(id, Document::new(id).add_field(Field::numeric("age", age)))?;
    }

    let request = TopNSearch::new(1, NumericRangeQuery::new(0.0, 1.0).set_field("age"))
        .with_standard_aggregations();
    let results = writer.reader().search(&SearchContext::new(), &request)?;

    let aggregations = results.aggregations();
    assert_eq!(aggregations.count(), Some(2));
    assert_eq!(aggregations.max_score(), Some(1.0));
    assert!(aggregations.duration().is_some());
    assert_eq!(results.count(), 1);
    Ok(())
}
