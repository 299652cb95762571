//! Decoded business documents.

use crate::catalog::{Attribute, Collection};
use crate::value::FieldValue;
use std::collections::BTreeMap;

/// The decoded business object obtained from a row.
///
/// Ids here are plaintext and tenant-local; the row codec owns the mapping
/// to storage form. `fields` holds the business document proper, including
/// duplicates of any indexed column the document also carries.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Owning collection.
    pub collection: Collection,
    /// Plaintext local id of the parent/major entity.
    pub id: String,
    /// Plaintext child id within a sub-collection.
    pub sub_id: Option<String>,
    /// Document version.
    pub version: i64,
    /// Business fields, keyed by attribute name.
    pub fields: BTreeMap<String, FieldValue>,
    /// Logically deleted: persisted without payload, purged later.
    pub zombie: bool,
}

impl Document {
    /// Creates a default-valued document for a collection.
    ///
    /// Every non-structural schema attribute is filled with its kind's zero
    /// value; sub-collections get an empty `sub_id`.
    #[must_use]
    pub fn new(collection: Collection) -> Self {
        let mut fields = BTreeMap::new();
        for Attribute { name, kind } in collection.schema() {
            if matches!(*name, "id" | "ids" | "v") {
                continue;
            }
            fields.insert((*name).to_owned(), FieldValue::zero(*kind));
        }
        Self {
            collection,
            id: String::new(),
            sub_id: collection.has_sub_id().then(String::new),
            version: 0,
            fields,
            zombie: false,
        }
    }

    /// Reads a business field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Sets a business field, returning `self` for chaining.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Marks the document as a zombie. Its payload will not be persisted.
    pub fn mark_zombie(&mut self) {
        self.zombie = true;
    }
}

impl Collection {
    /// Factory shorthand: a default-valued document of this collection.
    #[must_use]
    pub fn new_document(self) -> Document {
        Document::new(self)
    }
}
