//! Cross-backend contract: the same fixture must produce identical
//! logical results on the document, relational and embedded providers.

use std::convert::Infallible;

use coffre_codec::{SecretKey, TenantKeys};
use coffre_schema::{Collection, Document, FieldValue};
use coffre_store::{
    run_operation, DocProvider, EmbeddedProvider, OpError, OperationContext, Outcome, Provider,
    SqlProvider, Task, WriteBatch, WriteMode, HEARTBEAT_ID,
};

fn tenant_keys() -> TenantKeys {
    TenantKeys::new("815", SecretKey::from_bytes(&[9u8; 32]).unwrap())
}

fn with_each_provider(scenario: impl Fn(&dyn Provider)) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let doc = DocProvider::new(tenant_keys());
    scenario(&doc);

    let sql = SqlProvider::open_in_memory(tenant_keys()).unwrap();
    scenario(&sql);

    let dir = tempfile::tempdir().unwrap();
    let embedded = EmbeddedProvider::open(dir.path().join("coffre.db"), tenant_keys()).unwrap();
    scenario(&embedded);
}

fn account(id: &str, version: i64) -> Document {
    let mut doc = Collection::Accounts
        .new_document()
        .with_field("name", id)
        .with_field("hps1", format!("h-{id}"));
    doc.id = id.into();
    doc.version = version;
    doc
}

fn note(parent: &str, sub: &str, version: i64) -> Document {
    let mut doc = Collection::Notes
        .new_document()
        .with_field("text", format!("note {sub}"));
    doc.id = parent.into();
    doc.sub_id = Some(sub.to_owned());
    doc.version = version;
    doc
}

fn commit(p: &dyn Provider, stage: impl FnOnce(&mut OperationContext)) {
    let mut ctx = OperationContext::new("815");
    let outcome = run_operation::<Infallible, _>(p, &mut ctx, |ctx, _| {
        stage(ctx);
        Ok(())
    })
    .unwrap();
    assert!(outcome.is_committed(), "{:?}", outcome.detail());
}

#[test]
fn watermark_read_cycle() {
    with_each_provider(|p| {
        commit(p, |ctx| ctx.stage_insert(account("A1", 0)));

        // Strictly-newer semantics: the v0 row is invisible at watermark 0.
        assert!(p.get_by_version(Collection::Accounts, "A1", 0).unwrap().is_none());
        let seen = p.get_by_version(Collection::Accounts, "A1", -1).unwrap();
        assert_eq!(seen.unwrap().version, 0);

        commit(p, |ctx| ctx.stage_update(account("A1", 1)));
        let seen = p.get_by_version(Collection::Accounts, "A1", 0).unwrap();
        assert_eq!(seen.unwrap().version, 1);
        assert!(p.get_by_version(Collection::Accounts, "A1", 1).unwrap().is_none());
    });
}

#[test]
fn children_listing_honors_watermark() {
    with_each_provider(|p| {
        commit(p, |ctx| {
            ctx.stage_insert(note("G1", "n1", 2));
            ctx.stage_insert(note("G1", "n2", 5));
            ctx.stage_insert(note("G1", "n3", 7));
            ctx.stage_insert(note("G2", "n4", 9));
        });

        assert_eq!(p.list_children(Collection::Notes, "G1", None).unwrap().len(), 3);
        let newer = p.list_children(Collection::Notes, "G1", Some(5)).unwrap();
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].version, 7);
        assert_eq!(
            p.codec().decode_row(&newer[0]).unwrap().sub_id.as_deref(),
            Some("n3")
        );
    });
}

#[test]
fn namespace_scan_covers_exactly_the_tenant_range() {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    let mut ids: Vec<String> = (0..16).map(|_| format!("A{}", rng.gen::<u32>())).collect();
    ids.sort();
    ids.dedup();

    with_each_provider(|p| {
        commit(p, |ctx| {
            for id in &ids {
                ctx.stage_insert(account(id, 1));
            }
        });

        let rows = p.scan_namespace(Collection::Accounts, "815").unwrap();
        assert_eq!(rows.len(), ids.len());
        let mut seen: Vec<String> = rows
            .iter()
            .map(|r| p.codec().decode_row(r).unwrap().id)
            .collect();
        seen.sort();
        assert_eq!(seen, ids);
        assert!(p.scan_namespace(Collection::Accounts, "999").unwrap().is_empty());
    });
}

#[test]
fn purge_removes_rows_and_tasks_but_not_the_heartbeat() {
    with_each_provider(|p| {
        commit(p, |ctx| {
            ctx.stage_insert(account("A1", 1));
            ctx.stage_insert(note("G1", "n1", 1));
        });
        p.task_upsert(&Task {
            op_type: "Fpurge".into(),
            ns: "815".into(),
            id: "A1".into(),
            sub_id: String::new(),
            due_at: 1,
            retry_payload: None,
        })
        .unwrap();
        p.ping().unwrap();

        let swept = p.purge_namespace("815").unwrap();
        assert_eq!(swept, 3);
        assert!(p.get_latest(Collection::Accounts, "A1", None).unwrap().is_none());
        assert!(p.scan_namespace(Collection::Notes, "815").unwrap().is_empty());
        assert!(p.tasks_all().unwrap().is_empty());
        // The singleton heartbeat is outside the purge list.
        assert!(p.ping().unwrap().contains("ping at "));
    });
}

#[test]
fn app_error_rolls_back_and_propagates() {
    with_each_provider(|p| {
        let mut ctx = OperationContext::new("815");
        let result: Result<Outcome, &str> = run_operation(p, &mut ctx, |ctx, _| {
            ctx.stage_insert(account("A1", 0));
            Err(OpError::App("quota exceeded"))
        });
        assert_eq!(result.unwrap_err(), "quota exceeded");
        assert!(p.get_latest(Collection::Accounts, "A1", None).unwrap().is_none());
    });
}

#[test]
fn stale_update_yields_retryable_outcome() {
    with_each_provider(|p| {
        commit(p, |ctx| ctx.stage_insert(account("A1", 5)));

        let mut ctx = OperationContext::new("815");
        let outcome = run_operation::<Infallible, _>(p, &mut ctx, |ctx, _| {
            ctx.stage_update(account("A1", 3));
            Ok(())
        })
        .unwrap();
        assert!(matches!(outcome, Outcome::Retryable(_)));
        // The stored row is untouched.
        let row = p.get_latest(Collection::Accounts, "A1", None).unwrap().unwrap();
        assert_eq!(row.version, 5);
    });
}

#[test]
fn duplicate_insert_yields_fatal_outcome() {
    with_each_provider(|p| {
        commit(p, |ctx| ctx.stage_insert(account("A1", 0)));

        let mut ctx = OperationContext::new("815");
        let outcome = run_operation::<Infallible, _>(p, &mut ctx, |ctx, _| {
            ctx.stage_insert(account("A1", 0));
            Ok(())
        })
        .unwrap();
        assert!(matches!(outcome, Outcome::Fatal(_)));
    });
}

#[test]
fn zombie_documents_round_trip_without_payload() {
    with_each_provider(|p| {
        let mut doc = account("A1", 4);
        doc.mark_zombie();
        commit(p, |ctx| ctx.stage_insert(doc));

        let row = p.get_latest(Collection::Accounts, "A1", None).unwrap().unwrap();
        assert!(row.payload.is_none());
        let decoded = p.codec().decode_row(&row).unwrap();
        assert!(decoded.zombie);
        assert_eq!(decoded.id, "A1");
        assert_eq!(decoded.version, 4);
    });
}

#[test]
fn expiring_scan_uses_the_indexed_column() {
    with_each_provider(|p| {
        commit(p, |ctx| {
            ctx.stage_insert(account("A1", 1).with_field("dlv", 100i64));
            ctx.stage_insert(account("A2", 1)); // dlv stays zero: never expires
            ctx.stage_insert(account("A3", 1).with_field("dlv", 300i64));
        });

        let due = p.scan_expiring(Collection::Accounts, "dlv", 200).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(p.codec().decode_row(&due[0]).unwrap().id, "A1");
        assert_eq!(p.scan_expiring(Collection::Accounts, "dlv", 400).unwrap().len(), 2);
        assert!(p.scan_expiring(Collection::Accounts, "nope", 0).is_err());
    });
}

#[test]
fn deletes_flush_after_updates() {
    with_each_provider(|p| {
        commit(p, |ctx| {
            ctx.stage_insert(account("A1", 0));
            ctx.stage_insert(note("G1", "n1", 0));
        });
        commit(p, |ctx| {
            ctx.stage_update(account("A1", 1));
            ctx.stage_delete(Collection::Notes, "G1", Some("n1"));
        });

        assert_eq!(
            p.get_latest(Collection::Accounts, "A1", None).unwrap().unwrap().version,
            1
        );
        assert!(p.get_latest(Collection::Notes, "G1", Some("n1")).unwrap().is_none());
    });
}

#[test]
fn rollback_leaves_no_trace_of_transactional_writes() {
    with_each_provider(|p| {
        commit(p, |ctx| ctx.stage_insert(account("A1", 0)));

        p.begin().unwrap();
        let batch = WriteBatch {
            inserts: vec![p.codec().prepare_row(&account("A2", 0)).unwrap()],
            updates: vec![p.codec().prepare_row(&account("A1", 1)).unwrap()],
            ..WriteBatch::default()
        };
        p.bulk_mutate(&batch, WriteMode::Transactional).unwrap();
        p.rollback().unwrap();

        assert!(p.get_latest(Collection::Accounts, "A2", None).unwrap().is_none());
        assert_eq!(
            p.get_latest(Collection::Accounts, "A1", None).unwrap().unwrap().version,
            0
        );
    });
}

#[test]
fn heartbeat_is_reachable_through_the_query_surface() {
    with_each_provider(|p| {
        assert!(p
            .get_latest(Collection::Singletons, HEARTBEAT_ID, None)
            .unwrap()
            .is_none());
        p.ping().unwrap();
        p.ping().unwrap();

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
            .contains("ping at "));
    });
}

#[test]
fn secondary_key_is_tenant_scoped() {
    with_each_provider(|p| {
        commit(p, |ctx| ctx.stage_insert(account("A1", 0)));
        let row = p
            .get_by_secondary_key(Collection::Accounts, "h-A1")
            .unwrap()
            .unwrap();
        assert_eq!(p.codec().decode_row(&row).unwrap().id, "A1");
        assert!(p.get_by_secondary_key(Collection::Accounts, "h-A2").unwrap().is_none());
        assert!(p.get_by_secondary_key(Collection::Versions, "h-A1").is_err());
    });
}
