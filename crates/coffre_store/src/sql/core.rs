//! Shared SQL query machinery for the relational and embedded providers.
//!
//! One statement-generation strategy, two caching policies: `Fresh`
//! re-prepares from per-connection cached text, `Cached` reuses prepared
//! statements through the connection's process-local cache.

use super::stmt;
use crate::error::{StoreError, StoreResult};
use crate::provider::{Task, TaskKey, WriteBatch, WriteMode, HEARTBEAT_ID};
use coffre_codec::{RowCodec, TenantKeys};
use coffre_schema::{AttrKind, Collection, FieldValue, Row};
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use std::collections::{BTreeMap, HashMap};
use std::time::{SystemTime, UNIX_EPOCH};

/// How a generated statement is turned into an executable one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum PrepareMode {
    /// Cache the statement text per connection, prepare on every use.
    Fresh,
    /// Keep fully prepared statements process-locally (`prepare_cached`).
    Cached,
}

struct SqlState {
    conn: Connection,
    in_txn: bool,
    /// Generated statement text keyed by a stable per-collection code,
    /// built lazily on first use.
    stmt_text: HashMap<String, String>,
}

/// The query surface shared by both SQL providers.
pub(super) struct SqlCore {
    codec: RowCodec,
    mode: PrepareMode,
    state: Mutex<SqlState>,
}

fn value_of(fv: &FieldValue) -> Value {
    match fv {
        FieldValue::Text(s) => Value::Text(s.clone()),
        FieldValue::Integer(n) | FieldValue::Timestamp(n) => Value::Integer(*n),
        FieldValue::Bytes(b) => Value::Blob(b.clone()),
    }
}

fn column_value(row: &Row, name: &'static str, kind: AttrKind) -> Value {
    match name {
        "id" => Value::Text(row.id.clone()),
        "ids" => Value::Text(row.sub_id.clone().unwrap_or_default()),
        "v" => Value::Integer(row.version),
        stmt::PAYLOAD => match &row.payload {
            Some(bytes) => Value::Blob(bytes.clone()),
            None => Value::Null,
        },
        _ => row
            .indexed
            .get(name)
            .map(value_of)
            .unwrap_or_else(|| value_of(&FieldValue::zero(kind))),
    }
}

fn row_from_sql(c: Collection, r: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
    let mut id = String::new();
    let mut sub_id = None;
    let mut version = 0i64;
    let mut indexed = BTreeMap::new();
    let mut idx = 0;
    for attr in c.schema() {
        match attr.name {
            "id" => id = r.get(idx)?,
            "ids" => sub_id = Some(r.get(idx)?),
            "v" => version = r.get(idx)?,
            name => {
                let value = match attr.kind {
                    AttrKind::Text => FieldValue::Text(r.get(idx)?),
                    AttrKind::Integer => FieldValue::Integer(r.get(idx)?),
                    AttrKind::Timestamp => FieldValue::Timestamp(r.get(idx)?),
                    AttrKind::Bytes => FieldValue::Bytes(r.get(idx)?),
                };
                indexed.insert(name, value);
            }
        }
        idx += 1;
    }
    let payload = if c.has_payload() {
        r.get::<_, Option<Vec<u8>>>(idx)?
    } else {
        None
    };
    Ok(Row {
        collection: c,
        id,
        sub_id,
        version,
        indexed,
        payload,
    })
}

fn task_from_sql(r: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        op_type: r.get(0)?,
        ns: r.get(1)?,
        id: r.get(2)?,
        sub_id: r.get(3)?,
        due_at: r.get(4)?,
        retry_payload: r.get(5)?,
    })
}

const TASK_COLS: &str = "op, ns, id, ids, dh, exc";

fn with_stmt<T>(
    mode: PrepareMode,
    state: &mut SqlState,
    code: &str,
    build: impl FnOnce() -> String,
    f: impl FnOnce(&mut rusqlite::Statement<'_>) -> StoreResult<T>,
) -> StoreResult<T> {
    let text = state
        .stmt_text
        .entry(code.to_owned())
        .or_insert_with(build)
        .clone();
    match mode {
        PrepareMode::Fresh => {
            let mut statement = state.conn.prepare(&text)?;
            f(&mut statement)
        }
        PrepareMode::Cached => {
            let mut statement = state.conn.prepare_cached(&text)?;
            f(&mut statement)
        }
    }
}

impl SqlCore {
    /// Wraps an opened connection, creating every table on first use.
    pub(super) fn open(conn: Connection, keys: TenantKeys, mode: PrepareMode) -> StoreResult<Self> {
        conn.busy_timeout(std::time::Duration::from_millis(5_000))?;
        for c in Collection::ALL {
            conn.execute_batch(&stmt::create_table(c))?;
        }
        conn.execute_batch(&stmt::create_taches())?;
        Ok(Self {
            codec: RowCodec::new(keys),
            mode,
            state: Mutex::new(SqlState {
                conn,
                in_txn: false,
                stmt_text: HashMap::new(),
            }),
        })
    }

    pub(super) fn codec(&self) -> &RowCodec {
        &self.codec
    }

    // ---- transaction protocol ----

    pub(super) fn begin(&self) -> StoreResult<()> {
        let mut state = self.state.lock();
        if state.in_txn {
            return Err(StoreError::invalid_operation("transaction already open"));
        }
        state.conn.execute_batch("BEGIN IMMEDIATE")?;
        state.in_txn = true;
        Ok(())
    }

    pub(super) fn commit(&self) -> StoreResult<()> {
        let mut state = self.state.lock();
        if !state.in_txn {
            return Err(StoreError::invalid_operation("no open transaction"));
        }
        state.in_txn = false;
        state.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    pub(super) fn rollback(&self) -> StoreResult<()> {
        let mut state = self.state.lock();
        if !state.in_txn {
            return Ok(());
        }
        state.in_txn = false;
        state.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    // ---- query surface ----

    fn query_one(
        &self,
        code: &str,
        build: impl FnOnce() -> String,
        params: Vec<Value>,
        c: Collection,
    ) -> StoreResult<Option<Row>> {
        let mut state = self.state.lock();
        with_stmt(self.mode, &mut state, code, build, |statement| {
            let mut rows = statement.query_map(params_from_iter(params), |r| row_from_sql(c, r))?;
            Ok(rows.next().transpose()?)
        })
    }

    fn query_all(
        &self,
        code: &str,
        build: impl FnOnce() -> String,
        params: Vec<Value>,
        c: Collection,
    ) -> StoreResult<Vec<Row>> {
        let mut state = self.state.lock();
        with_stmt(self.mode, &mut state, code, build, |statement| {
            let rows = statement
                .query_map(params_from_iter(params), |r| row_from_sql(c, r))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub(super) fn get_by_version(
        &self,
        c: Collection,
        id: &str,
        watermark: i64,
    ) -> StoreResult<Option<Row>> {
        let long = self.codec.long_id(id)?;
        self.query_one(
            &format!("SELV {c}"),
            || stmt::select_newer(c),
            vec![Value::Text(long), Value::Integer(watermark)],
            c,
        )
    }

    pub(super) fn get_latest(
        &self,
        c: Collection,
        id: &str,
        sub_id: Option<&str>,
    ) -> StoreResult<Option<Row>> {
        let long = self.codec.long_id(id)?;
        match sub_id {
            Some(sub) => {
                let storage_sub = self.codec.crypt_id(sub)?;
                self.query_one(
                    &format!("SELKEY {c}"),
                    || stmt::select_by_key(c),
                    vec![Value::Text(long), Value::Text(storage_sub)],
                    c,
                )
            }
            None => self.query_one(
                &format!("SELID {c}"),
                || stmt::select_by_id(c),
                vec![Value::Text(long)],
                c,
            ),
        }
    }

    pub(super) fn get_by_secondary_key(
        &self,
        c: Collection,
        hashed_key: &str,
    ) -> StoreResult<Option<Row>> {
        if !c.has_attr("hps1") {
            return Err(StoreError::invalid_operation(format!(
                "{c} has no secondary key column"
            )));
        }
        let scoped = self.codec.scoped_secondary(hashed_key)?;
        self.query_one(
            &format!("SELHPS {c}"),
            || stmt::select_by_secondary(c),
            vec![Value::Text(scoped)],
            c,
        )
    }

    pub(super) fn get_across_groups(&self, c: Collection, sub_id: &str) -> StoreResult<Option<Row>> {
        let storage_sub = self.codec.crypt_id(sub_id)?;
        let (lo, hi) = self.codec.ns_bounds(self.codec.org())?;
        self.query_one(
            &format!("SELACR {c}"),
            || stmt::select_across(c),
            vec![Value::Text(storage_sub), Value::Text(lo), Value::Text(hi)],
            c,
        )
    }

    pub(super) fn scan_namespace(&self, c: Collection, ns: &str) -> StoreResult<Vec<Row>> {
        let (lo, hi) = self.codec.ns_bounds(ns)?;
        self.query_all(
            &format!("SELNS {c}"),
            || stmt::select_ns(c),
            vec![Value::Text(lo), Value::Text(hi)],
            c,
        )
    }

    pub(super) fn scan_expiring(
        &self,
        c: Collection,
        column: &str,
        threshold: i64,
    ) -> StoreResult<Vec<Row>> {
        if !c.has_attr(column) {
            return Err(StoreError::invalid_operation(format!(
                "{c} has no column {column}"
            )));
        }
        // Column names come from the catalog, never from callers' data.
        let column = column.to_owned();
        self.query_all(
            &format!("SELEXP {c} {column}"),
            || stmt::select_expiring(c, &column),
            vec![Value::Integer(threshold)],
            c,
        )
    }

    pub(super) fn list_children(
        &self,
        c: Collection,
        parent_id: &str,
        watermark: Option<i64>,
    ) -> StoreResult<Vec<Row>> {
        let long = self.codec.long_id(parent_id)?;
        match watermark {
            Some(w) => self.query_all(
                &format!("SELCHW {c}"),
                || stmt::select_children(c, true),
                vec![Value::Text(long), Value::Integer(w)],
                c,
            ),
            None => self.query_all(
                &format!("SELCH {c}"),
                || stmt::select_children(c, false),
                vec![Value::Text(long)],
                c,
            ),
        }
    }

    // ---- mutation ----

    fn apply_batch(&self, state: &mut SqlState, batch: &WriteBatch) -> StoreResult<()> {
        for row in &batch.inserts {
            let c = row.collection;
            let values: Vec<Value> = stmt::columns(c)
                .into_iter()
                .map(|name| {
                    let kind = c
                        .schema()
                        .iter()
                        .find(|a| a.name == name)
                        .map_or(AttrKind::Bytes, |a| a.kind);
                    column_value(row, name, kind)
                })
                .collect();
            let inserted = with_stmt(
                self.mode,
                state,
                &format!("INS {c}"),
                || stmt::insert(c),
                |statement| {
                    statement.execute(params_from_iter(values))?;
                    Ok(())
                },
            );
            if let Err(StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _))) = &inserted {
                if e.code == rusqlite::ErrorCode::ConstraintViolation {
                    return Err(StoreError::DuplicateKey {
                        collection: c,
                        id: row.id.clone(),
                    });
                }
            }
            inserted?;
        }

        for row in &batch.updates {
            let c = row.collection;
            let mut values: Vec<Value> = stmt::columns(c)
                .into_iter()
                .filter(|name| !matches!(*name, "id" | "ids"))
                .map(|name| {
                    let kind = c
                        .schema()
                        .iter()
                        .find(|a| a.name == name)
                        .map_or(AttrKind::Bytes, |a| a.kind);
                    column_value(row, name, kind)
                })
                .collect();
            values.push(Value::Text(row.id.clone()));
            if c.has_sub_id() {
                values.push(Value::Text(row.sub_id.clone().unwrap_or_default()));
            }
            values.push(Value::Integer(row.version));

            let changed = with_stmt(
                self.mode,
                state,
                &format!("UPD {c}"),
                || stmt::update(c),
                |statement| Ok(statement.execute(params_from_iter(values))?),
            )?;
            if changed == 0 {
                // Key params only: does the row exist at a newer version?
                let mut key = vec![Value::Text(row.id.clone())];
                if c.has_sub_id() {
                    key.push(Value::Text(row.sub_id.clone().unwrap_or_default()));
                }
                let exists = with_stmt(
                    self.mode,
                    state,
                    &format!("SELKEY {c}"),
                    || stmt::select_by_key(c),
                    |statement| {
                        let mut rows =
                            statement.query_map(params_from_iter(key), |r| row_from_sql(c, r))?;
                        Ok(rows.next().transpose()?)
                    },
                )?;
                return Err(match exists {
                    Some(_) => StoreError::Contention {
                        collection: c,
                        id: row.id.clone(),
                    },
                    None => StoreError::MissingRow {
                        collection: c,
                        id: row.id.clone(),
                    },
                });
            }
        }

        for key in &batch.deletes {
            let c = key.collection;
            let mut values = vec![Value::Text(key.id.clone())];
            if c.has_sub_id() {
                values.push(Value::Text(key.sub_id.clone().unwrap_or_default()));
            }
            with_stmt(
                self.mode,
                state,
                &format!("DEL {c}"),
                || stmt::delete(c),
                |statement| {
                    statement.execute(params_from_iter(values))?;
                    Ok(())
                },
            )?;
        }
        Ok(())
    }

    pub(super) fn bulk_mutate(&self, batch: &WriteBatch, mode: WriteMode) -> StoreResult<()> {
        let mut state = self.state.lock();
        match mode {
            WriteMode::Transactional => {
                if !state.in_txn {
                    return Err(StoreError::invalid_operation(
                        "transactional batch outside a transaction",
                    ));
                }
                self.apply_batch(&mut state, batch)
            }
            WriteMode::Immediate => {
                if state.in_txn {
                    return Err(StoreError::invalid_operation(
                        "immediate batch inside a transaction",
                    ));
                }
                state.conn.execute_batch("BEGIN IMMEDIATE")?;
                match self.apply_batch(&mut state, batch) {
                    Ok(()) => {
                        state.conn.execute_batch("COMMIT")?;
                        Ok(())
                    }
                    Err(e) => {
                        let _ = state.conn.execute_batch("ROLLBACK");
                        Err(e)
                    }
                }
            }
        }
    }

    pub(super) fn purge_namespace(&self, ns: &str) -> StoreResult<u64> {
        let mut state = self.state.lock();
        let mut total = 0u64;
        for c in Collection::PURGE_LIST {
            let swept = self.codec.ns_bounds(ns).map_err(StoreError::from).and_then(
                |(lo, hi)| {
                    with_stmt(
                        self.mode,
                        &mut state,
                        &format!("DELNS {c}"),
                        || stmt::delete_ns(c),
                        |statement| Ok(statement.execute(params![lo, hi])?),
                    )
                },
            );
            match swept {
                Ok(rows) => {
                    tracing::info!(collection = %c, rows, ns, "namespace purge");
                    total += rows as u64;
                }
                Err(e) => {
                    tracing::warn!(collection = %c, ns, error = %e, "purge skipped collection");
                }
            }
        }
        // Best-effort like the collection sweeps: keep the row total even
        // if the task sweep fails.
        match state
            .conn
            .execute("DELETE FROM taches WHERE ns = ?1", params![ns])
        {
            Ok(tasks) => total += tasks as u64,
            Err(e) => tracing::warn!(ns, error = %e, "purge skipped tasks"),
        }
        Ok(total)
    }

    pub(super) fn ping(&self) -> StoreResult<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();
        // The heartbeat is an ordinary codec-encoded row, so it stays
        // readable through get_latest like any other document.
        let long = self.codec.long_id(HEARTBEAT_ID)?;
        let state = self.state.lock();
        let existing: Option<(i64, Option<Vec<u8>>)> = state
            .conn
            .query_row(
                "SELECT v, payload FROM singletons WHERE id = ?1",
                params![long],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        let (previous, version) = match existing {
            Some((v, payload)) => {
                let row = Row {
                    collection: Collection::Singletons,
                    id: long.clone(),
                    sub_id: None,
                    version: v,
                    indexed: BTreeMap::new(),
                    payload,
                };
                let doc = self.codec.decode_row(&row)?;
                let text = doc
                    .field("ping")
                    .and_then(FieldValue::as_text)
                    .unwrap_or_default()
                    .to_owned();
                (text, v + 1)
            }
            None => (String::new(), 1),
        };
        let mut doc = Collection::Singletons
            .new_document()
            .with_field("ping", format!("sql ping at {now}"));
        doc.id = HEARTBEAT_ID.into();
        doc.version = version;
        let row = self.codec.prepare_row(&doc)?;
        state.conn.execute(
            "INSERT INTO singletons (id, v, payload) VALUES (?1, ?2, ?3) \
             ON CONFLICT(id) DO UPDATE SET v = excluded.v, payload = excluded.payload",
            params![row.id, row.version, row.payload],
        )?;
        Ok(previous)
    }

    // ---- task queue ----

    pub(super) fn task_upsert(&self, task: &Task) -> StoreResult<()> {
        let state = self.state.lock();
        state.conn.execute(
            "INSERT INTO taches (op, ns, id, ids, dh, exc) VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(op, ns, id, ids) DO UPDATE SET dh = excluded.dh, exc = excluded.exc",
            params![
                task.op_type,
                task.ns,
                task.id,
                task.sub_id,
                task.due_at,
                task.retry_payload
            ],
        )?;
        Ok(())
    }

    pub(super) fn task_remove(&self, key: &TaskKey) -> StoreResult<()> {
        let state = self.state.lock();
        state.conn.execute(
            "DELETE FROM taches WHERE op = ?1 AND ns = ?2 AND id = ?3 AND ids = ?4",
            params![key.op_type, key.ns, key.id, key.sub_id],
        )?;
        Ok(())
    }

    pub(super) fn task_next_due(
        &self,
        before: i64,
        excluded_ns: &[String],
    ) -> StoreResult<Option<Task>> {
        let state = self.state.lock();
        let mut statement = state.conn.prepare(&format!(
            "SELECT {TASK_COLS} FROM taches WHERE dh <= ?1 ORDER BY dh"
        ))?;
        let rows = statement.query_map(params![before], task_from_sql)?;
        for task in rows {
            let task = task?;
            if !excluded_ns.contains(&task.ns) {
                return Ok(Some(task));
            }
        }
        Ok(None)
    }

    pub(super) fn tasks_by_ns(&self, ns: &str) -> StoreResult<Vec<Task>> {
        let state = self.state.lock();
        let mut statement = state.conn.prepare(&format!(
            "SELECT {TASK_COLS} FROM taches WHERE ns = ?1 ORDER BY dh"
        ))?;
        let tasks = statement
            .query_map(params![ns], task_from_sql)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    pub(super) fn tasks_all(&self) -> StoreResult<Vec<Task>> {
        let state = self.state.lock();
        let mut statement = state
            .conn
            .prepare(&format!("SELECT {TASK_COLS} FROM taches ORDER BY dh"))?;
        let tasks = statement
            .query_map([], task_from_sql)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }
}
