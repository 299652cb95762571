//! In-process document-store backend.
//!
//! Documents live in per-collection ordered maps keyed by storage long id
//! plus sub id. Filters run on the indexed fields and range scans on the
//! key prefix, the way a hosted document store scopes paths by
//! organization. Commits are batch-atomic: a mutation batch is validated
//! and applied under one write lock, so a failing write leaves nothing
//! behind. Transactional batches additionally record the prior value of
//! every touched entry, and `rollback` replays that log in reverse.

use crate::error::{StoreError, StoreResult};
use crate::provider::{Provider, Task, TaskKey, WriteBatch, WriteMode, HEARTBEAT_ID};
use coffre_codec::{RowCodec, TenantKeys};
use coffre_schema::{Collection, FieldValue, Row};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Storage key: (long id, sub id or empty).
type DocKey = (String, String);

/// Prior value of one entry touched inside a transaction.
type UndoEntry = (Collection, DocKey, Option<StoredDoc>);

#[derive(Debug, Clone)]
struct StoredDoc {
    version: i64,
    indexed: BTreeMap<&'static str, FieldValue>,
    payload: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct DocState {
    collections: HashMap<Collection, BTreeMap<DocKey, StoredDoc>>,
    tasks: BTreeMap<TaskKey, (i64, Option<String>)>,
}

/// Transaction state of one tenant handle.
///
/// Lives outside the shared [`DocState`] so tenants sharing a store
/// transact independently, as they would against a hosted service.
#[derive(Debug, Default)]
struct TxnState {
    open: bool,
    undo: Vec<UndoEntry>,
}

/// The document-store realization of the provider contract.
///
/// Also serves as the reference realization in the cross-backend contract
/// tests. Several tenants may share one underlying store through
/// [`share_with`](DocProvider::share_with), mirroring one hosted service
/// with per-tenant scoping.
#[derive(Debug, Clone)]
pub struct DocProvider {
    codec: RowCodec,
    state: Arc<RwLock<DocState>>,
    txn: Arc<Mutex<TxnState>>,
}

impl DocProvider {
    /// Creates an empty store for one tenant.
    #[must_use]
    pub fn new(keys: TenantKeys) -> Self {
        Self {
            codec: RowCodec::new(keys),
            state: Arc::new(RwLock::new(DocState::default())),
            txn: Arc::new(Mutex::new(TxnState::default())),
        }
    }

    /// Creates another tenant's provider over the same underlying store.
    ///
    /// The new handle carries its own transaction state, so tenants open
    /// and roll back transactions without stepping on each other.
    #[must_use]
    pub fn share_with(&self, keys: TenantKeys) -> Self {
        Self {
            codec: RowCodec::new(keys),
            state: Arc::clone(&self.state),
            txn: Arc::new(Mutex::new(TxnState::default())),
        }
    }

    fn storage_key(&self, id: &str, sub_id: Option<&str>) -> StoreResult<DocKey> {
        let long = self.codec.long_id(id)?;
        let sub = match sub_id {
            Some(s) => self.codec.crypt_id(s)?,
            None => String::new(),
        };
        Ok((long, sub))
    }

    fn to_row(collection: Collection, key: &DocKey, stored: &StoredDoc) -> Row {
        Row {
            collection,
            id: key.0.clone(),
            sub_id: (!key.1.is_empty()).then(|| key.1.clone()),
            version: stored.version,
            indexed: stored.indexed.clone(),
            payload: stored.payload.clone(),
        }
    }

    fn apply_batch(
        state: &mut DocState,
        batch: &WriteBatch,
        mut undo: Option<&mut Vec<UndoEntry>>,
    ) -> StoreResult<()> {
        // Validate everything before touching the maps: all-or-nothing.
        for row in &batch.inserts {
            let map = state.collections.entry(row.collection).or_default();
            let key = (row.id.clone(), row.sub_id.clone().unwrap_or_default());
            if map.contains_key(&key) {
                return Err(StoreError::DuplicateKey {
                    collection: row.collection,
                    id: row.id.clone(),
                });
            }
        }
        for row in &batch.updates {
            let key = (row.id.clone(), row.sub_id.clone().unwrap_or_default());
            match state
                .collections
                .get(&row.collection)
                .and_then(|m| m.get(&key))
            {
                None => {
                    return Err(StoreError::MissingRow {
                        collection: row.collection,
                        id: row.id.clone(),
                    })
                }
                Some(existing) if existing.version > row.version => {
                    return Err(StoreError::Contention {
                        collection: row.collection,
                        id: row.id.clone(),
                    })
                }
                Some(_) => {}
            }
        }

        for row in batch.inserts.iter().chain(&batch.updates) {
            let key = (row.id.clone(), row.sub_id.clone().unwrap_or_default());
            let prev = state.collections.entry(row.collection).or_default().insert(
                key.clone(),
                StoredDoc {
                    version: row.version,
                    indexed: row.indexed.clone(),
                    payload: row.payload.clone(),
                },
            );
            if let Some(undo) = undo.as_mut() {
                undo.push((row.collection, key, prev));
            }
        }
        for key in &batch.deletes {
            let map_key = (key.id.clone(), key.sub_id.clone().unwrap_or_default());
            if let Some(map) = state.collections.get_mut(&key.collection) {
                let prev = map.remove(&map_key);
                if let Some(undo) = undo.as_mut() {
                    undo.push((key.collection, map_key, prev));
                }
            }
        }
        Ok(())
    }
}

impl Provider for DocProvider {
    fn codec(&self) -> &RowCodec {
        &self.codec
    }

    fn begin(&self) -> StoreResult<()> {
        let mut txn = self.txn.lock();
        if txn.open {
            return Err(StoreError::invalid_operation("transaction already open"));
        }
        txn.open = true;
        Ok(())
    }

    fn commit(&self) -> StoreResult<()> {
        let mut txn = self.txn.lock();
        if !txn.open {
            return Err(StoreError::invalid_operation("no open transaction"));
        }
        txn.open = false;
        txn.undo.clear();
        Ok(())
    }

    fn rollback(&self) -> StoreResult<()> {
        let mut txn = self.txn.lock();
        if !txn.open {
            return Ok(());
        }
        txn.open = false;
        let mut state = self.state.write();
        // Restore touched entries newest-first.
        for (collection, key, prev) in txn.undo.drain(..).rev() {
            let map = state.collections.entry(collection).or_default();
            match prev {
                Some(stored) => {
                    map.insert(key, stored);
                }
                None => {
                    map.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn get_by_version(
        &self,
        collection: Collection,
        id: &str,
        watermark: i64,
    ) -> StoreResult<Option<Row>> {
        Ok(self
            .get_latest(collection, id, None)?
            .filter(|row| row.version > watermark))
    }

    fn get_latest(
        &self,
        collection: Collection,
        id: &str,
        sub_id: Option<&str>,
    ) -> StoreResult<Option<Row>> {
        let key = self.storage_key(id, sub_id)?;
        let state = self.state.read();
        Ok(state
            .collections
            .get(&collection)
            .and_then(|m| m.get(&key))
            .map(|stored| Self::to_row(collection, &key, stored)))
    }

    fn get_by_secondary_key(
        &self,
        collection: Collection,
        hashed_key: &str,
    ) -> StoreResult<Option<Row>> {
        if !collection.has_attr("hps1") {
            return Err(StoreError::invalid_operation(format!(
                "{collection} has no secondary key column"
            )));
        }
        let scoped = FieldValue::Text(self.codec.scoped_secondary(hashed_key)?);
        let state = self.state.read();
        Ok(state.collections.get(&collection).and_then(|m| {
            m.iter()
                .find(|(_, stored)| stored.indexed.get("hps1") == Some(&scoped))
                .map(|(key, stored)| Self::to_row(collection, key, stored))
        }))
    }

    fn get_across_groups(&self, collection: Collection, sub_id: &str) -> StoreResult<Option<Row>> {
        let storage_sub = self.codec.crypt_id(sub_id)?;
        // Scoped to this tenant's id range; the store may be shared.
        let (lo, hi) = self.codec.ns_bounds(self.codec.org())?;
        let state = self.state.read();
        Ok(state.collections.get(&collection).and_then(|m| {
            m.range((lo, String::new())..(hi, String::new()))
                .find(|((_, sub), _)| *sub == storage_sub)
                .map(|(key, stored)| Self::to_row(collection, key, stored))
        }))
    }

    fn scan_namespace(&self, collection: Collection, ns: &str) -> StoreResult<Vec<Row>> {
        let (lo, hi) = self.codec.ns_bounds(ns)?;
        let state = self.state.read();
        Ok(state
            .collections
            .get(&collection)
            .map(|m| {
                m.range((lo, String::new())..(hi, String::new()))
                    .map(|(key, stored)| Self::to_row(collection, key, stored))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn scan_expiring(
        &self,
        collection: Collection,
        column: &str,
        threshold: i64,
    ) -> StoreResult<Vec<Row>> {
        if !collection.has_attr(column) {
            return Err(StoreError::invalid_operation(format!(
                "{collection} has no column {column}"
            )));
        }
        let state = self.state.read();
        Ok(state
            .collections
            .get(&collection)
            .map(|m| {
                m.iter()
                    .filter(|(_, stored)| {
                        stored
                            .indexed
                            .get(column)
                            .and_then(FieldValue::as_i64)
                            .is_some_and(|t| t > 0 && t <= threshold)
                    })
                    .map(|(key, stored)| Self::to_row(collection, key, stored))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_children(
        &self,
        collection: Collection,
        parent_id: &str,
        watermark: Option<i64>,
    ) -> StoreResult<Vec<Row>> {
        let long = self.codec.long_id(parent_id)?;
        let state = self.state.read();
        Ok(state
            .collections
            .get(&collection)
            .map(|m| {
                m.range((long.clone(), String::new())..)
                    .take_while(|((id, _), _)| *id == long)
                    .filter(|(_, stored)| watermark.is_none_or(|w| stored.version > w))
                    .map(|(key, stored)| Self::to_row(collection, key, stored))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn bulk_mutate(&self, batch: &WriteBatch, mode: WriteMode) -> StoreResult<()> {
        let mut txn = self.txn.lock();
        let mut state = self.state.write();
        match mode {
            WriteMode::Transactional => {
                if !txn.open {
                    return Err(StoreError::invalid_operation(
                        "transactional batch outside a transaction",
                    ));
                }
                Self::apply_batch(&mut state, batch, Some(&mut txn.undo))
            }
            WriteMode::Immediate => {
                if txn.open {
                    return Err(StoreError::invalid_operation(
                        "immediate batch inside a transaction",
                    ));
                }
                Self::apply_batch(&mut state, batch, None)
            }
        }
    }

    fn purge_namespace(&self, ns: &str) -> StoreResult<u64> {
        let mut total = 0u64;
        let mut state = self.state.write();
        for collection in Collection::PURGE_LIST {
            match self.codec.ns_bounds(ns) {
                Ok((lo, hi)) => {
                    let map = state.collections.entry(collection).or_default();
                    let keys: Vec<DocKey> = map
                        .range((lo, String::new())..(hi, String::new()))
                        .map(|(k, _)| k.clone())
                        .collect();
                    for key in &keys {
                        map.remove(key);
                    }
                    tracing::info!(%collection, rows = keys.len(), ns, "namespace purge");
                    total += keys.len() as u64;
                }
                Err(e) => {
                    tracing::warn!(%collection, ns, error = %e, "purge skipped collection");
                }
            }
        }
        let before = state.tasks.len();
        state.tasks.retain(|key, _| key.ns != ns);
        total += (before - state.tasks.len()) as u64;
        Ok(total)
    }

    fn ping(&self) -> StoreResult<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();
        // The heartbeat is an ordinary codec-encoded row, so it stays
        // readable through get_latest like any other document.
        let key = (self.codec.long_id(HEARTBEAT_ID)?, String::new());
        let mut state = self.state.write();
        let (previous, version) = match state
            .collections
            .get(&Collection::Singletons)
            .and_then(|m| m.get(&key))
        {
            Some(stored) => {
                let row = Self::to_row(Collection::Singletons, &key, stored);
                let doc = self.codec.decode_row(&row)?;
                let text = doc
                    .field("ping")
                    .and_then(FieldValue::as_text)
                    .unwrap_or_default()
                    .to_owned();
                (text, stored.version + 1)
            }
            None => (String::new(), 1),
        };
        let mut doc = Collection::Singletons
            .new_document()
            .with_field("ping", format!("doc ping at {now}"));
        doc.id = HEARTBEAT_ID.into();
        doc.version = version;
        let row = self.codec.prepare_row(&doc)?;
        state.collections.entry(Collection::Singletons).or_default().insert(
            key,
            StoredDoc {
                version: row.version,
                indexed: row.indexed,
                payload: row.payload,
            },
        );
        Ok(previous)
    }

    fn task_upsert(&self, task: &Task) -> StoreResult<()> {
        self.state
            .write()
            .tasks
            .insert(task.key(), (task.due_at, task.retry_payload.clone()));
        Ok(())
    }

    fn task_remove(&self, key: &TaskKey) -> StoreResult<()> {
        self.state.write().tasks.remove(key);
        Ok(())
    }

    fn task_next_due(&self, before: i64, excluded_ns: &[String]) -> StoreResult<Option<Task>> {
        let state = self.state.read();
        Ok(state
            .tasks
            .iter()
            .filter(|(key, (due, _))| *due <= before && !excluded_ns.contains(&key.ns))
            .min_by_key(|(_, (due, _))| *due)
            .map(|(key, (due, payload))| Task {
                op_type: key.op_type.clone(),
                ns: key.ns.clone(),
                id: key.id.clone(),
                sub_id: key.sub_id.clone(),
                due_at: *due,
                retry_payload: payload.clone(),
            }))
    }

    fn tasks_by_ns(&self, ns: &str) -> StoreResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .state
            .read()
            .tasks
            .iter()
            .filter(|(key, _)| key.ns == ns)
            .map(|(key, (due, payload))| Task {
                op_type: key.op_type.clone(),
                ns: key.ns.clone(),
                id: key.id.clone(),
                sub_id: key.sub_id.clone(),
                due_at: *due,
                retry_payload: payload.clone(),
            })
            .collect();
        tasks.sort_by_key(|t| t.due_at);
        Ok(tasks)
    }

    fn tasks_all(&self) -> StoreResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .state
            .read()
            .tasks
            .iter()
            .map(|(key, (due, payload))| Task {
                op_type: key.op_type.clone(),
                ns: key.ns.clone(),
                id: key.id.clone(),
                sub_id: key.sub_id.clone(),
                due_at: *due,
                retry_payload: payload.clone(),
            })
            .collect();
        tasks.sort_by_key(|t| t.due_at);
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coffre_codec::SecretKey;
    use coffre_schema::{Document, RowKey};

    fn provider() -> DocProvider {
        DocProvider::new(TenantKeys::cleartext("815", SecretKey::generate()))
    }

    fn account(id: &str, version: i64) -> Document {
        let mut doc = Collection::Accounts
            .new_document()
            .with_field("hps1", format!("h-{id}"))
            .with_field("name", id);
        doc.id = id.into();
        doc.version = version;
        doc
    }

    fn insert(p: &DocProvider, doc: &Document) {
        let batch = WriteBatch {
            inserts: vec![p.codec().prepare_row(doc).unwrap()],
            ..WriteBatch::default()
        };
        p.bulk_mutate(&batch, WriteMode::Immediate).unwrap();
    }

    #[test]
    fn point_lookup_round_trips() {
        let p = provider();
        let doc = account("A1", 0);
        insert(&p, &doc);

        let row = p.get_latest(Collection::Accounts, "A1", None).unwrap().unwrap();
        assert_eq!(p.codec().decode_row(&row).unwrap(), doc);
        assert!(p.get_latest(Collection::Accounts, "A2", None).unwrap().is_none());
    }

    #[test]
    fn watermark_semantics() {
        let p = provider();
        insert(&p, &account("A1", 0));
        let mut updated = account("A1", 1);
        updated.fields.insert("name".into(), "changed".into());
        let batch = WriteBatch {
            updates: vec![p.codec().prepare_row(&updated).unwrap()],
            ..WriteBatch::default()
        };
        p.bulk_mutate(&batch, WriteMode::Immediate).unwrap();

        let newer = p.get_by_version(Collection::Accounts, "A1", 0).unwrap();
        assert_eq!(newer.unwrap().version, 1);
        assert!(p.get_by_version(Collection::Accounts, "A1", 1).unwrap().is_none());
    }

    #[test]
    fn stale_update_is_contention() {
        let p = provider();
        insert(&p, &account("A1", 5));
        let batch = WriteBatch {
            updates: vec![p.codec().prepare_row(&account("A1", 3)).unwrap()],
            ..WriteBatch::default()
        };
        let err = p.bulk_mutate(&batch, WriteMode::Immediate).unwrap_err();
        assert!(matches!(err, StoreError::Contention { .. }));
    }

    #[test]
    fn duplicate_insert_is_fatal() {
        let p = provider();
        insert(&p, &account("A1", 0));
        let batch = WriteBatch {
            inserts: vec![p.codec().prepare_row(&account("A1", 0)).unwrap()],
            ..WriteBatch::default()
        };
        let err = p.bulk_mutate(&batch, WriteMode::Immediate).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
    }

    #[test]
    fn failed_batch_leaves_nothing_behind() {
        let p = provider();
        insert(&p, &account("A1", 0));
        // A2 would be new, but the A1 insert collides: nothing may land.
        let batch = WriteBatch {
            inserts: vec![
                p.codec().prepare_row(&account("A2", 0)).unwrap(),
                p.codec().prepare_row(&account("A1", 0)).unwrap(),
            ],
            ..WriteBatch::default()
        };
        assert!(p.bulk_mutate(&batch, WriteMode::Immediate).is_err());
        assert!(p.get_latest(Collection::Accounts, "A2", None).unwrap().is_none());
    }

    #[test]
    fn transactional_batch_requires_open_transaction() {
        let p = provider();
        let batch = WriteBatch::default();
        assert!(matches!(
            p.bulk_mutate(&batch, WriteMode::Transactional),
            Err(StoreError::InvalidOperation(_))
        ));
        p.begin().unwrap();
        p.bulk_mutate(&batch, WriteMode::Transactional).unwrap();
        p.commit().unwrap();
    }

    #[test]
    fn rollback_discards_transactional_writes() {
        let p = provider();
        insert(&p, &account("A1", 0));

        p.begin().unwrap();
        let mut updated = account("A1", 1);
        updated.fields.insert("name".into(), "changed".into());
        let batch = WriteBatch {
            inserts: vec![p.codec().prepare_row(&account("A2", 0)).unwrap()],
            updates: vec![p.codec().prepare_row(&updated).unwrap()],
            ..WriteBatch::default()
        };
        p.bulk_mutate(&batch, WriteMode::Transactional).unwrap();
        p.rollback().unwrap();

        assert!(p.get_latest(Collection::Accounts, "A2", None).unwrap().is_none());
        let row = p.get_latest(Collection::Accounts, "A1", None).unwrap().unwrap();
        assert_eq!(row.version, 0);
        assert_eq!(p.codec().decode_row(&row).unwrap(), account("A1", 0));
    }

    #[test]
    fn rollback_restores_deleted_rows() {
        let p = provider();
        insert(&p, &account("A1", 0));

        p.begin().unwrap();
        let batch = WriteBatch {
            deletes: vec![RowKey::new(
                Collection::Accounts,
                p.codec().long_id("A1").unwrap(),
            )],
            ..WriteBatch::default()
        };
        p.bulk_mutate(&batch, WriteMode::Transactional).unwrap();
        assert!(p.get_latest(Collection::Accounts, "A1", None).unwrap().is_none());
        p.rollback().unwrap();

        assert!(p.get_latest(Collection::Accounts, "A1", None).unwrap().is_some());
    }

    #[test]
    fn commit_keeps_transactional_writes() {
        let p = provider();
        p.begin().unwrap();
        let batch = WriteBatch {
            inserts: vec![p.codec().prepare_row(&account("A1", 0)).unwrap()],
            ..WriteBatch::default()
        };
        p.bulk_mutate(&batch, WriteMode::Transactional).unwrap();
        p.commit().unwrap();

        assert!(p.get_latest(Collection::Accounts, "A1", None).unwrap().is_some());
    }

    #[test]
    fn tenants_transact_independently() {
        let a = provider();
        let b = a.share_with(TenantKeys::cleartext("816", SecretKey::generate()));

        a.begin().unwrap();
        // Tenant B is not blocked by A's open transaction.
        b.begin().unwrap();
        let batch = WriteBatch {
            inserts: vec![b.codec().prepare_row(&account("B1", 0)).unwrap()],
            ..WriteBatch::default()
        };
        b.bulk_mutate(&batch, WriteMode::Transactional).unwrap();
        b.commit().unwrap();

        let batch = WriteBatch {
            inserts: vec![a.codec().prepare_row(&account("A1", 0)).unwrap()],
            ..WriteBatch::default()
        };
        a.bulk_mutate(&batch, WriteMode::Transactional).unwrap();
        a.rollback().unwrap();

        // A's rollback discards only A's writes.
        assert!(a.get_latest(Collection::Accounts, "A1", None).unwrap().is_none());
        assert!(b.get_latest(Collection::Accounts, "B1", None).unwrap().is_some());
    }

    #[test]
    fn secondary_key_lookup() {
        let p = provider();
        insert(&p, &account("A1", 0));
        let row = p
            .get_by_secondary_key(Collection::Accounts, "h-A1")
            .unwrap()
            .unwrap();
        assert_eq!(p.codec().decode_row(&row).unwrap().id, "A1");
        assert!(p.get_by_secondary_key(Collection::Accounts, "h-A9").unwrap().is_none());
    }

    #[test]
    fn tenants_do_not_see_each_other() {
        let a = provider();
        let b = a.share_with(TenantKeys::cleartext("816", SecretKey::generate()));
        insert(&a, &account("A1", 0));

        assert!(b.get_latest(Collection::Accounts, "A1", None).unwrap().is_none());
        assert!(b.scan_namespace(Collection::Accounts, "816").unwrap().is_empty());
        assert_eq!(a.scan_namespace(Collection::Accounts, "815").unwrap().len(), 1);
    }

    #[test]
    fn ping_bumps_heartbeat() {
        let p = provider();
        assert_eq!(p.ping().unwrap(), "");
        let prev = p.ping().unwrap();
        assert!(prev.starts_with("doc ping at "));
        // The heartbeat is a regular row, observable through the surface.
        let row = p
            .get_latest(Collection::Singletons, HEARTBEAT_ID, None)
            .unwrap()
            .unwrap();
        assert_eq!(row.version, 2);
        let doc = p.codec().decode_row(&row).unwrap();
        assert!(doc
            .field("ping")
            .and_then(FieldValue::as_text)
            .unwrap()
            .starts_with("doc ping at "));
        assert!(p.ping().unwrap().starts_with("doc ping at "));
    }

    #[test]
    fn task_queue_orders_by_due_time() {
        let p = provider();
        for (op, due) in [("GC", 30), ("EXP", 10), ("PRG", 20)] {
            p.task_upsert(&Task {
                op_type: op.into(),
                ns: "815".into(),
                id: "A1".into(),
                sub_id: String::new(),
                due_at: due,
                retry_payload: None,
            })
            .unwrap();
        }

        let next = p.task_next_due(100, &[]).unwrap().unwrap();
        assert_eq!(next.op_type, "EXP");
        // Suspended namespaces are skipped entirely.
        assert!(p.task_next_due(100, &["815".into()]).unwrap().is_none());
        // Nothing due yet.
        assert!(p.task_next_due(5, &[]).unwrap().is_none());

        let all = p.tasks_all().unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].due_at <= w[1].due_at));
    }

    #[test]
    fn task_upsert_refreshes_due_time() {
        let p = provider();
        let mut task = Task {
            op_type: "GC".into(),
            ns: "815".into(),
            id: "A1".into(),
            sub_id: String::new(),
            due_at: 50,
            retry_payload: None,
        };
        p.task_upsert(&task).unwrap();
        task.due_at = 10;
        task.retry_payload = Some("attempt 2".into());
        p.task_upsert(&task).unwrap();

        let all = p.tasks_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].due_at, 10);
        assert_eq!(all[0].retry_payload.as_deref(), Some("attempt 2"));

        p.task_remove(&task.key()).unwrap();
        assert!(p.tasks_all().unwrap().is_empty());
    }
}
