//! Index one numeric field and find it with a range query.

use anyhow::Result;
use quiver::prelude::*;
use tempfile::TempDir;

fn main() -> Result<()> {
    env_logger::init();

    let temp_dir = TempDir::new()?;
    let writer = IndexWriter::open(Config::default_config(temp_dir.path()))?;

    let doc = Document::new("a").add_field(Field::numeric("age", 0.1));
    writer.update(doc.id(), doc.clone())?;
    println!("indexed document with id:a age:0.1");

    let reader = writer.reader();
    let query = NumericRangeQuery::new(0.0, 1.0).set_field("age");
    let request = TopNSearch::new(10, query).with_standard_aggregations();

    println!("searching for age in [0, 1)");
    let results = reader.search(&SearchContext::new(), &request)?;
    let total = results.aggregations().count().unwrap_or_default();
    for document_match in results {
        document_match?.visit_stored_fields(|field, value| {
            if field == "_id" {
                println!("match: {}", String::from_utf8_lossy(value));
            }
            true
        })?;
    }
    println!("{total} total matches");

    reader.close();
    writer.close()?;
    Ok(())
}
