use serde_json::{Value, json};

use tenant_objects::{
    core::store::{ObjectStore, QueryOptions, StoreError},
    op::Op,
    paginate::StorePage,
    record::{ObjectDraft, ObjectKey, ObjectPatch, ObjectRecord},
    types::ObjectType,
};

fn draft(object_type: ObjectType, id: &str, mut body: Value) -> ObjectDraft {
    body["id"] = json!(id);
    ObjectDraft::from_body(object_type, body).expect("draft")
}

fn ids(page: &StorePage<ObjectRecord>) -> Vec<&str> {
    page.items.iter().map(|r| r.id.as_str()).collect()
}

#[test]
fn create_is_conditional_and_strips_reserved_keys() {
    let mut store = ObjectStore::new();
    let (rec, op) = store
        .create(
            "T1",
            draft(ObjectType::Product, "p1", json!({ "name": "Widget", "tenantId": "evil", "createdAt": 5 })),
        )
        .expect("create");
    assert_eq!(rec.id, "p1");
    assert_eq!(rec.tenant_id, "T1");
    assert!(rec.body.get("tenantId").is_none());
    assert!(rec.body.get("createdAt").is_none());
    assert_eq!(op.seq, 1);
    assert!(matches!(op.op, Op::Put { .. }));

    let err = store
        .create("T1", draft(ObjectType::Product, "p1", json!({})))
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists(_)));

    // same id under another tenant is a different object
    store
        .create("T2", draft(ObjectType::Product, "p1", json!({})))
        .expect("other tenant");
    assert_eq!(store.len(), 2);
}

#[test]
fn create_without_id_assigns_one() {
    let mut store = ObjectStore::new();
    let draft = ObjectDraft::from_body(ObjectType::Event, json!({ "name": "Gala" })).unwrap();
    let (rec, _) = store.create("T1", draft).unwrap();
    assert!(!rec.id.is_empty());
    assert_eq!(rec.to_json()["type"], json!("event"));
    assert_eq!(rec.to_json()["id"], json!(rec.id));
}

#[test]
fn non_object_bodies_are_rejected() {
    assert!(matches!(
        ObjectDraft::from_body(ObjectType::Product, json!([1, 2])),
        Err(StoreError::InvalidBody(_))
    ));
    assert!(matches!(
        ObjectDraft::from_body(ObjectType::Product, json!({ "id": 7 })),
        Err(StoreError::InvalidBody(_))
    ));
    assert!(ObjectPatch::from_body(json!("x")).is_err());
}

#[test]
fn update_merges_and_null_removes() {
    let mut store = ObjectStore::new();
    let (rec, _) = store
        .create("T1", draft(ObjectType::Product, "p1", json!({ "name": "A", "color": "red" })))
        .unwrap();
    let key = rec.key();

    let patch = ObjectPatch::default().set("name", "B").set("color", Value::Null);
    let (updated, op) = store.update(&key, &patch).unwrap();
    assert_eq!(updated.str_field("name"), Some("B"));
    assert!(updated.field("color").is_none());
    assert_eq!(updated.created_at_ms, rec.created_at_ms);
    assert_eq!(op.seq, 2);

    let missing = ObjectKey::for_object("T1", ObjectType::Product, "nope");
    assert!(matches!(
        store.update(&missing, &patch),
        Err(StoreError::NotFound(_))
    ));
}

#[test]
fn delete_queues_delete_op() {
    let mut store = ObjectStore::new();
    let (rec, _) = store.create("T1", draft(ObjectType::View, "v1", json!({}))).unwrap();
    let (_, op) = store.delete(&rec.key()).unwrap();
    assert_eq!(op.op, Op::Delete { key: rec.key() });
    assert!(store.get(&rec.key()).is_none());
    assert!(matches!(store.delete(&rec.key()), Err(StoreError::NotFound(_))));

    let pending = store.drain_pending_ops();
    assert_eq!(pending.iter().map(|o| o.seq).collect::<Vec<_>>(), vec![1, 2]);
    assert!(store.drain_pending_ops().is_empty());
    assert_eq!(store.latest_op_seq(), 2);
}

#[test]
fn query_stays_inside_tenant_and_type() {
    let mut store = ObjectStore::new();
    for id in ["a", "b", "c"] {
        store.create("T1", draft(ObjectType::Product, id, json!({}))).unwrap();
    }
    store.create("T1", draft(ObjectType::Event, "e1", json!({}))).unwrap();
    store.create("T2", draft(ObjectType::Product, "x", json!({}))).unwrap();

    let prefix = ObjectKey::type_prefix(ObjectType::Product);
    let first = store.query("T1", &prefix, &QueryOptions::new(2));
    assert_eq!(ids(&first), vec!["a", "b"]);
    assert_eq!(first.last_key.as_ref().map(|k| k.sk.as_str()), Some("product#b"));

    let second = store.query("T1", &prefix, &QueryOptions::new(2).after(first.last_key));
    assert_eq!(ids(&second), vec!["c"]);
    assert_eq!(second.last_key, None);
}

#[test]
fn exact_fit_page_has_no_cursor() {
    let mut store = ObjectStore::new();
    for id in ["a", "b"] {
        store.create("T1", draft(ObjectType::Product, id, json!({}))).unwrap();
    }
    let page = store.query("T1", "product#", &QueryOptions::new(2));
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.last_key, None);
}

#[test]
fn foreign_start_key_restarts_from_first_page() {
    let mut store = ObjectStore::new();
    for id in ["a", "b"] {
        store.create("T1", draft(ObjectType::Product, id, json!({}))).unwrap();
    }
    let foreign = ObjectKey::for_object("T2", ObjectType::Product, "a");
    let page = store.query("T1", "product#", &QueryOptions::new(10).after(Some(foreign)));
    assert_eq!(ids(&page), vec!["a", "b"]);
}

#[test]
fn scan_crosses_partitions() {
    let mut store = ObjectStore::new();
    store.create("T1", draft(ObjectType::Product, "a", json!({}))).unwrap();
    store.create("T2", draft(ObjectType::Product, "b", json!({}))).unwrap();
    store.create("T3", draft(ObjectType::Product, "c", json!({}))).unwrap();

    let first = store.scan(&QueryOptions::new(2));
    assert_eq!(ids(&first), vec!["a", "b"]);
    let rest = store.scan(&QueryOptions::new(2).after(first.last_key));
    assert_eq!(ids(&rest), vec!["c"]);
    assert_eq!(rest.last_key, None);
}

#[test]
fn snapshot_round_trip() {
    let mut store = ObjectStore::new();
    store.create("T1", draft(ObjectType::Product, "a", json!({ "n": 1 }))).unwrap();
    store.create("T1", draft(ObjectType::Event, "e", json!({}))).unwrap();

    let snapshot = store.export_snapshot();
    let restored = ObjectStore::from_snapshot(snapshot.clone()).unwrap();
    assert_eq!(restored.export_snapshot(), snapshot);
    assert_eq!(restored.latest_op_seq(), 2);
}
