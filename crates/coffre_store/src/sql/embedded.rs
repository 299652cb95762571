//! Embedded single-file realization of the provider contract.
//!
//! Runs SQLite in WAL mode with statements held in the connection's
//! prepared-statement cache, tuned for a long-lived in-process database.

use super::core::{PrepareMode, SqlCore};
use crate::error::StoreResult;
use crate::provider::{Provider, Task, TaskKey, WriteBatch, WriteMode};
use coffre_codec::{RowCodec, TenantKeys};
use coffre_schema::{Collection, Row};
use rusqlite::Connection;
use std::path::Path;

/// Embedded provider backed by a single WAL-journaled database file.
pub struct EmbeddedProvider {
    core: SqlCore,
}

impl EmbeddedProvider {
    /// Opens (creating if needed) the database file at `path` for one
    /// tenant.
    pub fn open(path: impl AsRef<Path>, keys: TenantKeys) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = wal; PRAGMA synchronous = normal;")?;
        Ok(Self {
            core: SqlCore::open(conn, keys, PrepareMode::Cached)?,
        })
    }
}

impl Provider for EmbeddedProvider {
    fn codec(&self) -> &RowCodec {
        self.core.codec()
    }

    fn begin(&self) -> StoreResult<()> {
        self.core.begin()
    }

    fn commit(&self) -> StoreResult<()> {
        self.core.commit()
    }

    fn rollback(&self) -> StoreResult<()> {
        self.core.rollback()
    }

    fn get_by_version(
        &self,
        collection: Collection,
        id: &str,
        watermark: i64,
    ) -> StoreResult<Option<Row>> {
        self.core.get_by_version(collection, id, watermark)
    }

    fn get_latest(
        &self,
        collection: Collection,
        id: &str,
        sub_id: Option<&str>,
    ) -> StoreResult<Option<Row>> {
        self.core.get_latest(collection, id, sub_id)
    }

    fn get_by_secondary_key(
        &self,
        collection: Collection,
        hashed_key: &str,
    ) -> StoreResult<Option<Row>> {
        self.core.get_by_secondary_key(collection, hashed_key)
    }

    fn get_across_groups(&self, collection: Collection, sub_id: &str) -> StoreResult<Option<Row>> {
        self.core.get_across_groups(collection, sub_id)
    }

    fn scan_namespace(&self, collection: Collection, ns: &str) -> StoreResult<Vec<Row>> {
        self.core.scan_namespace(collection, ns)
    }

    fn scan_expiring(
        &self,
        collection: Collection,
        column: &str,
        threshold: i64,
    ) -> StoreResult<Vec<Row>> {
        self.core.scan_expiring(collection, column, threshold)
    }

    fn list_children(
        &self,
        collection: Collection,
        parent_id: &str,
        watermark: Option<i64>,
    ) -> StoreResult<Vec<Row>> {
        self.core.list_children(collection, parent_id, watermark)
    }

    fn bulk_mutate(&self, batch: &WriteBatch, mode: WriteMode) -> StoreResult<()> {
        self.core.bulk_mutate(batch, mode)
    }

    fn purge_namespace(&self, ns: &str) -> StoreResult<u64> {
        self.core.purge_namespace(ns)
    }

    fn ping(&self) -> StoreResult<String> {
        self.core.ping()
    }

    fn task_upsert(&self, task: &Task) -> StoreResult<()> {
        self.core.task_upsert(task)
    }

    fn task_remove(&self, key: &TaskKey) -> StoreResult<()> {
        self.core.task_remove(key)
    }

    fn task_next_due(&self, before: i64, excluded_ns: &[String]) -> StoreResult<Option<Task>> {
        self.core.task_next_due(before, excluded_ns)
    }

    fn tasks_by_ns(&self, ns: &str) -> StoreResult<Vec<Task>> {
        self.core.tasks_by_ns(ns)
    }

    fn tasks_all(&self) -> StoreResult<Vec<Task>> {
        self.core.tasks_all()
    }
}
