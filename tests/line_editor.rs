use serde_json::{Value, json};

use tenant_objects::{
    api::App,
    client::{ClientError, LineEditor, ListParams, ObjectsClient, Session},
    config::ServiceConfig,
    core::store::ObjectStore,
    line::{Line, PatchOp},
    runtime::handle::spawn_service,
    types::ObjectType,
};

fn app() -> App {
    let config = ServiceConfig::default();
    let handle = spawn_service(ObjectStore::new(), None, config.runtime.clone());
    App::new(handle, config)
}

fn client(app: &App) -> ObjectsClient {
    ObjectsClient::new(app.clone(), Session::logged_in("token-1", "T1"))
}

fn order_lines(order: &Value) -> Vec<Line> {
    serde_json::from_value(order["lines"].clone()).expect("lines")
}

async fn seeded_order(client: &ObjectsClient) -> Vec<Line> {
    let order = client
        .create(
            ObjectType::SalesOrder,
            json!({ "id": "so1", "lines": [
                { "id": "L1", "itemId": "A", "qty": 1, "uom": "ea" },
                { "id": "L2", "itemId": "B", "qty": 4, "uom": "ea" },
            ] }),
        )
        .await
        .expect("create order");
    order_lines(&order)
}

#[tokio::test]
async fn logged_out_session_cannot_call() {
    let app = app();
    let mut client = client(&app);
    client.session_mut().logout();
    assert!(!client.session().is_authenticated());

    let err = client.get(ObjectType::Product, "p1").await.unwrap_err();
    assert!(matches!(err, ClientError::NotLoggedIn));
}

#[tokio::test]
async fn api_errors_carry_status_and_message() {
    let app = app();
    let client = client(&app);
    let err = client.get(ObjectType::Product, "missing").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(matches!(err, ClientError::Api { ref message, .. } if message.contains("not found")));
}

#[tokio::test]
async fn list_follows_tokens() {
    let app = app();
    let client = client(&app);
    for i in 0..3 {
        client
            .create(ObjectType::Product, json!({ "id": format!("p{i}") }))
            .await
            .expect("create");
    }

    let first = client
        .list(ObjectType::Product, &ListParams::default().limit(2))
        .await
        .expect("list");
    assert_eq!(first.items.len(), 2);
    let rest = client
        .list(ObjectType::Product, &ListParams::default().limit(2).after(first.next))
        .await
        .expect("list rest");
    assert_eq!(rest.items.len(), 1);
    assert_eq!(rest.next, None);
}

#[tokio::test]
async fn editor_tracks_keys_and_diffs() {
    let app = app();
    let client = client(&app);
    let mut editor = LineEditor::load(seeded_order(&client).await);
    assert_eq!(editor.keys(), vec!["L1", "L2"]);
    assert!(!editor.is_dirty());

    let new_key = editor.add_line(Line::new().set("itemId", "C").set("qty", 2).set("uom", "box"));
    assert!(new_key.starts_with("tmp-"));
    assert!(editor.update_field("L1", "qty", 3));
    assert!(editor.update_field(&new_key, "qty", 6));
    assert!(editor.remove_line("L2").is_some());
    assert!(!editor.update_field("L2", "qty", 1));
    assert_eq!(editor.keys(), vec!["L1".to_string(), new_key.clone()]);
    assert_eq!(editor.original_lines().len(), 2);

    let ops = editor.diff();
    assert_eq!(ops.len(), 3);
    assert_eq!(ops[0], PatchOp::Remove { id: "L2".into() });
    assert_eq!(ops[1].id(), Some("L1"));
    assert_eq!(ops[2].id(), None);
}

#[tokio::test]
async fn submit_sends_diff_and_reloads() {
    let app = app();
    let client = client(&app);
    let mut editor = LineEditor::load(seeded_order(&client).await);

    editor.update_field("L2", "qty", 5);
    editor.add_line(Line::new().set("itemId", "Z").set("qty", 1).set("uom", "ea"));

    let result = editor
        .submit(&client, ObjectType::SalesOrder, "so1")
        .await
        .expect("submit")
        .expect("sent");
    assert_eq!(result.lines.len(), 3);
    assert!(result.lines.iter().all(|l| l.server_id().is_some()));

    assert!(!editor.is_dirty());
    assert_eq!(editor.original_lines(), &result.lines[..]);
    assert_eq!(order_lines(&result.order), result.lines);

    let stored = client.get(ObjectType::SalesOrder, "so1").await.expect("get");
    assert_eq!(order_lines(&stored)[1].field("qty"), Some(&json!(5)));
}

#[tokio::test]
async fn empty_diff_skips_the_request() {
    let app = app();
    let client = client(&app);
    let mut editor = LineEditor::load(seeded_order(&client).await);
    let mut events = app.handle().subscribe();

    // qty 4 -> "4" is not a change under string comparison
    editor.update_field("L2", "qty", "4");
    let result = editor
        .submit(&client, ObjectType::SalesOrder, "so1")
        .await
        .expect("submit");
    assert!(result.is_none());

    assert!(
        client
            .patch_lines(ObjectType::SalesOrder, "so1", Vec::new())
            .await
            .expect("empty ops")
            .is_none()
    );
    assert!(matches!(
        events.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));
}

#[test]
fn blank_ids_still_address_each_line() {
    let lines: Vec<Line> = serde_json::from_value(json!([
        { "id": "", "cid": "tmp-a", "itemId": "A" },
        { "id": "", "cid": "tmp-b", "itemId": "B" },
    ]))
    .expect("lines");
    let mut editor = LineEditor::load(lines);
    assert_eq!(editor.keys(), vec!["tmp-a".to_string(), "tmp-b".to_string()]);

    assert!(editor.update_field("tmp-b", "qty", 2));
    assert_eq!(editor.line("tmp-b").and_then(|l| l.field("qty")), Some(&json!(2)));
    assert_eq!(editor.line("tmp-a").and_then(|l| l.field("qty")), None);
    assert!(editor.remove_line("tmp-a").is_some());
    assert_eq!(editor.keys(), vec!["tmp-b".to_string()]);
}
