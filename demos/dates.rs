//! Index one date field and find it with a date range query.

use anyhow::Result;
use chrono::{Duration, SecondsFormat, Utc};
use quiver::prelude::*;
use tempfile::TempDir;

fn main() -> Result<()> {
    env_logger::init();

    let temp_dir = TempDir::new()?;
    let writer = IndexWriter::open(Config::default_config(temp_dir.path()))?;

    let now = Utc::now();
    let doc = Document::new("a").add_field(Field::datetime("updated", now));
    writer.update(doc.id(), doc.clone())?;
    println!(
        "indexed document with id:a updated:{}",
        now.to_rfc3339_opts(SecondsFormat::Secs, true)
    );

    let reader = writer.reader();
    let an_hour_ago = now - Duration::hours(1);
    let an_hour_from_now = now + Duration::hours(1);
    let query = DateRangeQuery::new(an_hour_ago, an_hour_from_now).set_field("updated");
    let request = TopNSearch::new(10, query).with_standard_aggregations();

    println!(
        "searching for updated after {} and before {}",
        an_hour_ago.to_rfc3339_opts(SecondsFormat::Secs, true),
        an_hour_from_now.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
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
