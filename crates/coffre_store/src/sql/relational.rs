//! Relational realization of the provider contract on SQLite.
//!
//! Statement text is generated once per collection and cached on the
//! connection; statements themselves are re-prepared per call, matching
//! how a server-grade relational driver hands statements out.

use super::core::{PrepareMode, SqlCore};
use crate::error::StoreResult;
use crate::provider::{Provider, Task, TaskKey, WriteBatch, WriteMode};
use coffre_codec::{RowCodec, TenantKeys};
use coffre_schema::{Collection, Row};
use rusqlite::Connection;
use std::path::Path;

/// Relational provider backed by a SQLite database file.
pub struct SqlProvider {
    core: SqlCore,
}

impl SqlProvider {
    /// Opens (creating if needed) the database at `path` for one tenant.
    pub fn open(path: impl AsRef<Path>, keys: TenantKeys) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Ok(Self {
            core: SqlCore::open(conn, keys, PrepareMode::Fresh)?,
        })
    }

    /// Opens a private in-memory database, mainly for tests.
    pub fn open_in_memory(keys: TenantKeys) -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            core: SqlCore::open(conn, keys, PrepareMode::Fresh)?,
        })
    }
}

impl Provider for SqlProvider {
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
