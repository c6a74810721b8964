//! Document structure.

use serde::{Deserialize, Serialize};

use crate::document::field::Field;
use crate::error::{QuiverError, Result};

/// A document: an external identifier and an ordered sequence of fields.
///
/// ```
/// use quiver::document::{Document, Field};
///
/// let doc = Document::new("a")
///     .add_field(Field::text("name", "quiver").store_value())
///     .add_field(Field::numeric("age", 0.1));
/// assert_eq!(doc.id(), "a");
/// assert_eq!(doc.fields().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    id: String,
    fields: Vec<Field>,
}

impl Document {
    /// Create a document with no fields.
    pub fn new<S: Into<String>>(id: S) -> Self {
        Document {
            id: id.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field, builder style.
    pub fn add_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Append a field in place.
    pub fn push_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// The external identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Fields in insertion order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Fields with the given name, in insertion order.
    pub fn fields_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Field> + 'a {
        self.fields.iter().filter(move |f| f.name() == name)
    }

    /// Validate the identifier and every field.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(QuiverError::invalid_field("document identifier must not be empty"));
        }
        self.fields.iter().try_for_each(Field::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_keep_order() {
        let mut doc = Document::new("x").add_field(Field::text("tag", "one"));
        doc.push_field(Field::numeric("n", 1.0));
        doc.push_field(Field::text("tag", "two"));

        let names: Vec<&str> = doc.fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["tag", "n", "tag"]);
        assert_eq!(doc.fields_named("tag").count(), 2);
    }

    #[test]
    fn test_validate() {
        assert!(Document::new("").validate().is_err());
        assert!(Document::new("a").validate().is_ok());
        assert!(
            Document::new("a")
                .add_field(Field::numeric("n", f64::NAN))
                .validate()
                .is_err()
        );
    }
}
