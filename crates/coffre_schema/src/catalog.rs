//! Collection catalog: names, attribute schemas, purge order.

use std::fmt;

/// Value kind of an indexed attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    /// UTF-8 text (ids, hashed lookup keys).
    Text,
    /// Signed 64-bit integer (versions).
    Integer,
    /// Milliseconds since the epoch (expiry thresholds).
    Timestamp,
    /// Raw bytes.
    Bytes,
}

/// One indexed column of a collection.
///
/// Indexed attributes are stored outside the encrypted payload so that
/// every backend can build predicates on them. A value that also belongs
/// to the business document is duplicated inside the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute {
    /// Column name, shared by all backends.
    pub name: &'static str,
    /// Value kind.
    pub kind: AttrKind,
}

impl Attribute {
    /// Creates an attribute.
    #[must_use]
    pub const fn new(name: &'static str, kind: AttrKind) -> Self {
        Self { name, kind }
    }
}

const ID: Attribute = Attribute::new("id", AttrKind::Text);
const IDS: Attribute = Attribute::new("ids", AttrKind::Text);
const V: Attribute = Attribute::new("v", AttrKind::Integer);
const DLV: Attribute = Attribute::new("dlv", AttrKind::Timestamp);
const DFH: Attribute = Attribute::new("dfh", AttrKind::Timestamp);
const HPS1: Attribute = Attribute::new("hps1", AttrKind::Text);

/// A named collection with a fixed, ordered attribute schema shared by all
/// backends.
///
/// Major collections are synced as whole units by clients; sub-collections
/// are scoped under a major entity's id through the `ids` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    /// Fixed rows: id `"1"` holds the provider heartbeat.
    Singletons,
    /// Account records, looked up by contact-phrase hash.
    Accounts,
    /// Tenant partitions.
    Partitions,
    /// Version markers; payload is never persisted.
    Versions,
    /// Avatar records, looked up by contact-phrase hash.
    Avatars,
    /// Group records with a hosting-expiry column.
    Groups,
    /// Pending-purge markers; identity-only rows.
    Fpurges,
    /// Pending-transfer markers for attachment uploads.
    Transferts,
    /// Notes under an avatar or group.
    Notes,
    /// Chat threads between avatars.
    Chats,
    /// Group members.
    Members,
    /// Payment tickets under an account.
    Tickets,
    /// Sponsorings; their sub id is unique across all parents.
    Sponsorings,
}

impl Collection {
    /// Every collection, majors first.
    pub const ALL: [Collection; 13] = [
        Collection::Singletons,
        Collection::Accounts,
        Collection::Partitions,
        Collection::Versions,
        Collection::Avatars,
        Collection::Groups,
        Collection::Fpurges,
        Collection::Transferts,
        Collection::Notes,
        Collection::Chats,
        Collection::Members,
        Collection::Tickets,
        Collection::Sponsorings,
    ];

    /// Collections swept by a namespace purge, in sweep order.
    ///
    /// `Singletons` is deliberately absent: it is not tenant-scoped.
    pub const PURGE_LIST: [Collection; 12] = [
        Collection::Accounts,
        Collection::Partitions,
        Collection::Versions,
        Collection::Avatars,
        Collection::Groups,
        Collection::Notes,
        Collection::Chats,
        Collection::Members,
        Collection::Tickets,
        Collection::Sponsorings,
        Collection::Fpurges,
        Collection::Transferts,
    ];

    /// Returns the collection's physical name (table / top-level path).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Collection::Singletons => "singletons",
            Collection::Accounts => "accounts",
            Collection::Partitions => "partitions",
            Collection::Versions => "versions",
            Collection::Avatars => "avatars",
            Collection::Groups => "groups",
            Collection::Fpurges => "fpurges",
            Collection::Transferts => "transferts",
            Collection::Notes => "notes",
            Collection::Chats => "chats",
            Collection::Members => "members",
            Collection::Tickets => "tickets",
            Collection::Sponsorings => "sponsorings",
        }
    }

    /// Looks a collection up by its physical name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Collection::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Ordered attribute list: the single source of truth for statement
    /// and path generation in every backend.
    #[must_use]
    pub const fn schema(self) -> &'static [Attribute] {
        match self {
            Collection::Singletons => &[ID, V],
            Collection::Accounts => &[ID, V, HPS1, DLV],
            Collection::Partitions => &[ID, V],
            Collection::Versions => &[ID, V, DLV],
            Collection::Avatars => &[ID, V, HPS1],
            Collection::Groups => &[ID, V, DFH],
            Collection::Fpurges => &[ID, V],
            Collection::Transferts => &[ID, IDS, V, DLV],
            Collection::Notes => &[ID, IDS, V],
            Collection::Chats => &[ID, IDS, V],
            Collection::Members => &[ID, IDS, V, DLV],
            Collection::Tickets => &[ID, IDS, V, DLV],
            Collection::Sponsorings => &[ID, IDS, V, DLV],
        }
    }

    /// Whether rows carry a sub-document id (`ids` column).
    #[must_use]
    pub const fn has_sub_id(self) -> bool {
        matches!(
            self,
            Collection::Transferts
                | Collection::Notes
                | Collection::Chats
                | Collection::Members
                | Collection::Tickets
                | Collection::Sponsorings
        )
    }

    /// Whether rows persist an opaque payload.
    ///
    /// `Versions` and `Fpurges` reconstruct their document entirely from
    /// indexed columns; their payload column is never written.
    #[must_use]
    pub const fn has_payload(self) -> bool {
        !matches!(self, Collection::Versions | Collection::Fpurges)
    }

    /// Whether the collection carries the given indexed attribute.
    #[must_use]
    pub fn has_attr(self, name: &str) -> bool {
        self.schema().iter().any(|a| a.name == name)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_schema_starts_with_id_and_version() {
        for c in Collection::ALL {
            let schema = c.schema();
            assert_eq!(schema[0].name, "id", "{c}");
            assert!(schema.iter().any(|a| a.name == "v"), "{c}");
        }
    }

    #[test]
    fn sub_collections_carry_ids_column() {
        assert!(Collection::Notes.has_sub_id());
        assert!(Collection::Chats.has_sub_id());
        assert!(Collection::Members.has_sub_id());
        assert!(Collection::Tickets.has_sub_id());
        assert!(Collection::Sponsorings.has_sub_id());
        assert!(Collection::Transferts.has_sub_id());
        assert!(!Collection::Accounts.has_sub_id());
        assert!(!Collection::Versions.has_sub_id());
        for c in Collection::ALL {
            assert_eq!(c.has_sub_id(), c.has_attr("ids"), "{c}");
        }
    }

    #[test]
    fn payload_exempt_collections() {
        assert!(!Collection::Versions.has_payload());
        assert!(!Collection::Fpurges.has_payload());
        assert!(Collection::Accounts.has_payload());
        assert!(Collection::Notes.has_payload());
    }

    #[test]
    fn name_round_trip() {
        for c in Collection::ALL {
            assert_eq!(Collection::from_name(c.name()), Some(c));
        }
        assert_eq!(Collection::from_name("nope"), None);
    }

    #[test]
    fn purge_list_excludes_singletons() {
        assert!(!Collection::PURGE_LIST.contains(&Collection::Singletons));
        assert_eq!(Collection::PURGE_LIST.len(), Collection::ALL.len() - 1);
    }
}
