//! Physical rows: what backends actually store.

use crate::catalog::Collection;
use crate::value::FieldValue;
use std::collections::BTreeMap;

/// Physical storage unit for one document.
///
/// Ids are in their *storage* form: `id` is the tenant-prefixed long id
/// (optionally encrypted by the row codec), `sub_id` the optionally
/// encrypted child id. The payload is the encrypted business document, or
/// `None` for zombies and payload-exempt collections.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Owning collection.
    pub collection: Collection,
    /// Long id of the parent/major entity (storage form).
    pub id: String,
    /// Child id within a sub-collection (storage form).
    pub sub_id: Option<String>,
    /// Document version; monotonic non-decreasing per key.
    pub version: i64,
    /// Extra indexed columns beyond id/ids/v (expiry stamps, lookup hashes).
    pub indexed: BTreeMap<&'static str, FieldValue>,
    /// Opaque payload bytes; `None` marks a zombie or an exempt collection.
    pub payload: Option<Vec<u8>>,
}

impl Row {
    /// Returns the row's key.
    #[must_use]
    pub fn key(&self) -> RowKey {
        RowKey {
            collection: self.collection,
            id: self.id.clone(),
            sub_id: self.sub_id.clone(),
        }
    }

    /// Looks an indexed column up by name, falling back to the structural
    /// columns for `id`, `ids` and `v`.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => Some(FieldValue::Text(self.id.clone())),
            "ids" => self.sub_id.clone().map(FieldValue::Text),
            "v" => Some(FieldValue::Integer(self.version)),
            _ => self.indexed.get(name).cloned(),
        }
    }

    /// A row whose payload has been cleared is a zombie: logically deleted,
    /// kept so watermark readers learn of the deletion before physical
    /// removal. Exempt collections never carry a payload and are not
    /// zombies.
    #[must_use]
    pub fn is_zombie(&self) -> bool {
        self.payload.is_none() && self.collection.has_payload()
    }
}

/// Identity of one row: collection plus storage-form ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey {
    /// Owning collection.
    pub collection: Collection,
    /// Long id (storage form).
    pub id: String,
    /// Child id (storage form).
    pub sub_id: Option<String>,
}

impl RowKey {
    /// Creates a key for a major-collection row.
    #[must_use]
    pub fn new(collection: Collection, id: impl Into<String>) -> Self {
        Self {
            collection,
            id: id.into(),
            sub_id: None,
        }
    }

    /// Creates a key for a sub-collection row.
    #[must_use]
    pub fn with_sub(collection: Collection, id: impl Into<String>, sub_id: impl Into<String>) -> Self {
        Self {
            collection,
            id: id.into(),
            sub_id: Some(sub_id.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(collection: Collection, payload: Option<Vec<u8>>) -> Row {
        Row {
            collection,
            id: "815@42".into(),
            sub_id: None,
            version: 3,
            indexed: BTreeMap::new(),
            payload,
        }
    }

    #[test]
    fn zombie_requires_payload_collection() {
        assert!(row(Collection::Accounts, None).is_zombie());
        assert!(!row(Collection::Accounts, Some(vec![1])).is_zombie());
        // Versions never persists a payload, so a missing one is normal.
        assert!(!row(Collection::Versions, None).is_zombie());
    }

    #[test]
    fn column_reads_structural_fields() {
        let r = row(Collection::Accounts, Some(vec![1]));
        assert_eq!(r.column("id"), Some(FieldValue::Text("815@42".into())));
        assert_eq!(r.column("v"), Some(FieldValue::Integer(3)));
        assert_eq!(r.column("ids"), None);
        assert_eq!(r.column("hps1"), None);
    }
}
