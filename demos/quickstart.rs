//! Index one text field and find it with a match query.

use anyhow::Result;
use quiver::prelude::*;
use tempfile::TempDir;

fn main() -> Result<()> {
    env_logger::init();

    // The index lives in a temp directory removed on exit.
    let temp_dir = TempDir::new()?;
    let writer = IndexWriter::open(Config::default_config(temp_dir.path()))?;

    let doc = Document::new("a").add_field(Field::text("name", "bluge"));
    writer.update(doc.id(), doc.clone())?;
    println!("indexed document with id:a name:bluge");

    let reader = writer.reader();
    let query = MatchQuery::new("bluge").set_field("name");
    let request = TopNSearch::new(10, query).with_standard_aggregations();

    println!("searching for name:bluge");
    for document_match in reader.search(&SearchContext::new(), &request)? {
        document_match?.visit_stored_fields(|field, value| {
            if field == "_id" {
                println!("match: {}", String::from_utf8_lossy(value));
            }
            true
        })?;
    }

    reader.close();
    writer.close()?;
    Ok(())
}
