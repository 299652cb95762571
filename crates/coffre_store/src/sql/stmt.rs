//! Data-driven SQL generation from the schema registry.
//!
//! Every statement is derived from a collection's ordered attribute list;
//! nothing here is hand-written per table. Callers cache the generated
//! text (or the prepared statement) keyed by a stable per-collection code
//! such as `"INS accounts"`.

use coffre_schema::{AttrKind, Collection};

/// Physical column name of the opaque payload.
pub const PAYLOAD: &str = "payload";

fn sql_type(kind: AttrKind) -> &'static str {
    match kind {
        AttrKind::Text => "TEXT",
        AttrKind::Integer | AttrKind::Timestamp => "INTEGER",
        AttrKind::Bytes => "BLOB",
    }
}

/// All physical columns of a collection, schema attributes first and the
/// payload column last when the collection persists one.
pub fn columns(c: Collection) -> Vec<&'static str> {
    let mut cols: Vec<&'static str> = c.schema().iter().map(|a| a.name).collect();
    if c.has_payload() {
        cols.push(PAYLOAD);
    }
    cols
}

fn key_predicate(c: Collection) -> &'static str {
    if c.has_sub_id() {
        "id = ? AND ids = ?"
    } else {
        "id = ?"
    }
}

fn order_by(c: Collection) -> &'static str {
    if c.has_sub_id() {
        " ORDER BY id, ids"
    } else {
        " ORDER BY id"
    }
}

/// `CREATE TABLE IF NOT EXISTS` for a collection.
pub fn create_table(c: Collection) -> String {
    let mut cols: Vec<String> = c
        .schema()
        .iter()
        .map(|a| format!("{} {} NOT NULL", a.name, sql_type(a.kind)))
        .collect();
    if c.has_payload() {
        cols.push(format!("{PAYLOAD} BLOB"));
    }
    let pk = if c.has_sub_id() { "id, ids" } else { "id" };
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({}, PRIMARY KEY ({pk}))",
        c.name(),
        cols.join(", ")
    )
}

/// Parameterized insert of every column, in schema order.
pub fn insert(c: Collection) -> String {
    let cols = columns(c);
    let marks = vec!["?"; cols.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({marks})",
        c.name(),
        cols.join(", ")
    )
}

/// Parameterized update of every non-key column, guarded so a stored
/// version can never decrease. Zero affected rows means either a missing
/// row or an optimistic clash; the caller disambiguates.
pub fn update(c: Collection) -> String {
    let sets: Vec<String> = columns(c)
        .into_iter()
        .filter(|name| !matches!(*name, "id" | "ids"))
        .map(|name| format!("{name} = ?"))
        .collect();
    format!(
        "UPDATE {} SET {} WHERE {} AND v <= ?",
        c.name(),
        sets.join(", "),
        key_predicate(c)
    )
}

/// Delete by key.
pub fn delete(c: Collection) -> String {
    format!("DELETE FROM {} WHERE {}", c.name(), key_predicate(c))
}

/// Point lookup by key.
pub fn select_by_key(c: Collection) -> String {
    format!(
        "SELECT {} FROM {} WHERE {}",
        columns(c).join(", "),
        c.name(),
        key_predicate(c)
    )
}

/// Point lookup by parent id alone (majors, or first child row).
pub fn select_by_id(c: Collection) -> String {
    format!(
        "SELECT {} FROM {} WHERE id = ?",
        columns(c).join(", "),
        c.name()
    )
}

/// The row iff its version is strictly newer than the watermark.
pub fn select_newer(c: Collection) -> String {
    format!(
        "SELECT {} FROM {} WHERE id = ? AND v > ?",
        columns(c).join(", "),
        c.name()
    )
}

/// Single-row lookup by the deterministic secondary hash column.
pub fn select_by_secondary(c: Collection) -> String {
    format!(
        "SELECT {} FROM {} WHERE hps1 = ? LIMIT 1",
        columns(c).join(", "),
        c.name()
    )
}

/// Lookup by sub id across all parents, bounded to the tenant's id range.
pub fn select_across(c: Collection) -> String {
    format!(
        "SELECT {} FROM {} WHERE ids = ? AND id >= ? AND id < ? LIMIT 1",
        columns(c).join(", "),
        c.name()
    )
}

/// Namespace range scan over `[lo, hi)`.
pub fn select_ns(c: Collection) -> String {
    format!(
        "SELECT {} FROM {} WHERE id >= ? AND id < ?{}",
        columns(c).join(", "),
        c.name(),
        order_by(c)
    )
}

/// Expiry sweep over one timestamp column.
pub fn select_expiring(c: Collection, column: &str) -> String {
    format!(
        "SELECT {} FROM {} WHERE {column} > 0 AND {column} <= ?{}",
        columns(c).join(", "),
        c.name(),
        order_by(c)
    )
}

/// Children of one parent, optionally newer than a watermark.
pub fn select_children(c: Collection, with_watermark: bool) -> String {
    let watermark = if with_watermark { " AND v > ?" } else { "" };
    format!(
        "SELECT {} FROM {} WHERE id = ?{watermark} ORDER BY ids",
        columns(c).join(", "),
        c.name()
    )
}

/// Namespace purge for one collection.
pub fn delete_ns(c: Collection) -> String {
    format!("DELETE FROM {} WHERE id >= ? AND id < ?", c.name())
}

/// The `taches` task-queue table.
pub fn create_taches() -> String {
    "CREATE TABLE IF NOT EXISTS taches (\
     op TEXT NOT NULL, ns TEXT NOT NULL, id TEXT NOT NULL, ids TEXT NOT NULL, \
     dh INTEGER NOT NULL, exc TEXT, PRIMARY KEY (op, ns, id, ids))"
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_table_reflects_schema() {
        let sql = create_table(Collection::Accounts);
        assert!(sql.contains("accounts"));
        assert!(sql.contains("hps1 TEXT NOT NULL"));
        assert!(sql.contains("dlv INTEGER NOT NULL"));
        assert!(sql.contains("payload BLOB"));
        assert!(sql.contains("PRIMARY KEY (id)"));
    }

    #[test]
    fn exempt_collections_have_no_payload_column() {
        assert!(!create_table(Collection::Versions).contains(PAYLOAD));
        assert!(!insert(Collection::Fpurges).contains(PAYLOAD));
    }

    #[test]
    fn sub_collections_key_on_both_ids() {
        let sql = create_table(Collection::Notes);
        assert!(sql.contains("PRIMARY KEY (id, ids)"));
        assert!(delete(Collection::Notes).ends_with("WHERE id = ? AND ids = ?"));
        assert!(delete(Collection::Accounts).ends_with("WHERE id = ?"));
    }

    #[test]
    fn insert_parameter_count_matches_columns() {
        for c in Collection::ALL {
            let sql = insert(c);
            let marks = sql.matches('?').count();
            assert_eq!(marks, columns(c).len(), "{c}");
        }
    }

    #[test]
    fn update_guards_version_monotonicity() {
        let sql = update(Collection::Accounts);
        assert!(sql.ends_with("WHERE id = ? AND v <= ?"));
        assert!(!sql.contains("id = ?,"));
    }

    #[test]
    fn watermark_predicate_is_strictly_greater() {
        assert!(select_newer(Collection::Accounts).contains("v > ?"));
        assert!(select_children(Collection::Notes, true).contains("v > ?"));
        assert!(!select_children(Collection::Notes, false).contains("v > ?"));
    }
}
