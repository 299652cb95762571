//! The provider contract: one query surface, three realizations.

use crate::error::StoreResult;
use coffre_codec::RowCodec;
use coffre_schema::{Collection, Row, RowKey};

/// Plaintext id of the `singletons` heartbeat row touched by
/// [`Provider::ping`]. Stored codec-encoded like every other row.
pub const HEARTBEAT_ID: &str = "1";

/// Whether a mutation joins the open transaction or applies on its own.
///
/// Maintenance and purge jobs write outside any business transaction; the
/// mode is an explicit flag rather than being inferred from provider
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Apply inside the currently open transaction.
    Transactional,
    /// Apply immediately as an independent atomic unit.
    Immediate,
}

/// Staged physical writes, flushed as one unit.
///
/// The flush order is fixed - inserts, then updates, then deletes -
/// regardless of staging order, so a delete-then-reinsert of one key
/// within a transaction cannot trip a unique constraint.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    /// Rows to insert.
    pub inserts: Vec<Row>,
    /// Rows to overwrite.
    pub updates: Vec<Row>,
    /// Keys to remove.
    pub deletes: Vec<RowKey>,
}

impl WriteBatch {
    /// Total number of write units in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inserts.len() + self.updates.len() + self.deletes.len()
    }

    /// Whether the batch stages nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A durable deferred work item, hosted by the backend in the `taches`
/// table/collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Operation type code.
    pub op_type: String,
    /// Namespace the work belongs to.
    pub ns: String,
    /// Target entity id (plaintext, may be empty).
    pub id: String,
    /// Target sub-document id (plaintext, may be empty).
    pub sub_id: String,
    /// When the task becomes due, in epoch milliseconds.
    pub due_at: i64,
    /// Opaque retry payload for the sweeper.
    pub retry_payload: Option<String>,
}

impl Task {
    /// Returns the task's key.
    #[must_use]
    pub fn key(&self) -> TaskKey {
        TaskKey {
            op_type: self.op_type.clone(),
            ns: self.ns.clone(),
            id: self.id.clone(),
            sub_id: self.sub_id.clone(),
        }
    }
}

/// Identity of one task: `(opType, namespace, id, subId)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskKey {
    /// Operation type code.
    pub op_type: String,
    /// Namespace.
    pub ns: String,
    /// Target entity id.
    pub id: String,
    /// Target sub-document id.
    pub sub_id: String,
}

/// A storage provider bound to one tenant and one backend.
///
/// Connections are acquired at construction and owned by the provider
/// instance; one provider per tenant-backend pairing, never shared across
/// tenants. Queries take plaintext local ids and translate them through
/// the composed [`RowCodec`]; returned [`Row`]s are in storage form and
/// decode through the same codec.
///
/// Implementations must be `Send` so operations can move across worker
/// threads; concurrent access is serialized by the backend's own
/// concurrency control.
pub trait Provider: Send + Sync {
    /// The row codec composed into this provider.
    fn codec(&self) -> &RowCodec;

    // ---- transaction protocol ----

    /// Opens a transaction. Fails if one is already open.
    fn begin(&self) -> StoreResult<()>;

    /// Commits the open transaction.
    fn commit(&self) -> StoreResult<()>;

    /// Rolls the open transaction back. Best-effort; callers swallow the
    /// result when already handling a failure.
    fn rollback(&self) -> StoreResult<()>;

    // ---- query surface ----

    /// Returns the row iff a version strictly newer than `watermark`
    /// exists. Uniform newest-since-watermark semantics on every backend.
    fn get_by_version(
        &self,
        collection: Collection,
        id: &str,
        watermark: i64,
    ) -> StoreResult<Option<Row>>;

    /// Unconditional point lookup.
    fn get_latest(
        &self,
        collection: Collection,
        id: &str,
        sub_id: Option<&str>,
    ) -> StoreResult<Option<Row>>;

    /// Single-row lookup by the deterministic secondary hash column.
    fn get_by_secondary_key(
        &self,
        collection: Collection,
        hashed_key: &str,
    ) -> StoreResult<Option<Row>>;

    /// Lookup by a sub id unique across all parents of the collection
    /// (sponsoring lookup regardless of owning account).
    fn get_across_groups(&self, collection: Collection, sub_id: &str) -> StoreResult<Option<Row>>;

    /// All rows whose id falls in the namespace's half-open id range.
    fn scan_namespace(&self, collection: Collection, ns: &str) -> StoreResult<Vec<Row>>;

    /// All rows whose expiry column is non-zero and at or before the
    /// threshold. Feeds background sweeps.
    fn scan_expiring(
        &self,
        collection: Collection,
        column: &str,
        threshold: i64,
    ) -> StoreResult<Vec<Row>>;

    /// All sub-collection rows of a parent, optionally restricted to
    /// versions strictly newer than the watermark.
    fn list_children(
        &self,
        collection: Collection,
        parent_id: &str,
        watermark: Option<i64>,
    ) -> StoreResult<Vec<Row>>;

    /// Applies a batch of inserts, updates and deletes, in that order.
    fn bulk_mutate(&self, batch: &WriteBatch, mode: WriteMode) -> StoreResult<()>;

    /// Deletes every row of the namespace across the fixed purge list,
    /// plus its pending tasks. Best-effort per collection: failures are
    /// logged and the sweep continues. Returns the number of rows
    /// removed.
    fn purge_namespace(&self, ns: &str) -> StoreResult<u64>;

    /// Touches the `singletons` heartbeat row ([`HEARTBEAT_ID`]), bumping
    /// its version, and returns the previous heartbeat text.
    fn ping(&self) -> StoreResult<String>;

    // ---- task queue ----

    /// Inserts the task, or refreshes due time and retry payload if the
    /// key already exists.
    fn task_upsert(&self, task: &Task) -> StoreResult<()>;

    /// Removes a task; absent keys are not an error.
    fn task_remove(&self, key: &TaskKey) -> StoreResult<()>;

    /// The earliest task due at or before `before`, skipping suspended
    /// namespaces. At most one task.
    fn task_next_due(&self, before: i64, excluded_ns: &[String]) -> StoreResult<Option<Task>>;

    /// All tasks of one namespace, ordered by due time.
    fn tasks_by_ns(&self, ns: &str) -> StoreResult<Vec<Task>>;

    /// Every task, ordered by due time.
    fn tasks_all(&self) -> StoreResult<Vec<Task>>;
}
