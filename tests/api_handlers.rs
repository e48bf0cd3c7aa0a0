use serde_json::{Value, json};

use tenant_objects::{
    api::{ApiRequest, ApiResponse, App, Method},
    config::ServiceConfig,
    core::store::ObjectStore,
    runtime::handle::spawn_service,
};

fn app_with(config: ServiceConfig) -> App {
    let handle = spawn_service(ObjectStore::new(), None, config.runtime.clone());
    App::new(handle, config)
}

fn app() -> App {
    app_with(ServiceConfig::default())
}

fn req(method: Method, path: &str) -> ApiRequest {
    ApiRequest::new(method, path).header("x-tenant-id", "T1")
}

async fn call(app: &App, request: ApiRequest) -> ApiResponse {
    app.dispatch(request).await
}

async fn create(app: &App, ty: &str, body: Value) -> Value {
    let resp = call(app, req(Method::Post, &format!("/objects/{ty}")).json_body(body)).await;
    assert_eq!(resp.status, 201, "{}", resp.body);
    resp.body
}

fn item_ids(body: &Value) -> Vec<String> {
    body["items"]
        .as_array()
        .expect("items")
        .iter()
        .map(|i| i["id"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn crud_round_trip() {
    let app = app();
    let created = create(&app, "product", json!({ "id": "p1", "name": "Widget" })).await;
    assert_eq!(created["tenantId"], json!("T1"));
    assert_eq!(created["type"], json!("product"));

    let got = call(&app, req(Method::Get, "/objects/product/p1")).await;
    assert_eq!(got.status, 200);
    assert_eq!(got.body["name"], json!("Widget"));

    let updated = call(
        &app,
        req(Method::Put, "/objects/product/p1").json_body(json!({ "name": "Gadget", "id": "other" })),
    )
    .await;
    assert_eq!(updated.status, 200);
    assert_eq!(updated.body["name"], json!("Gadget"));
    assert_eq!(updated.body["id"], json!("p1"));

    let dup = call(
        &app,
        req(Method::Post, "/objects/product").json_body(json!({ "id": "p1" })),
    )
    .await;
    assert_eq!(dup.status, 409);

    let deleted = call(&app, req(Method::Delete, "/objects/product/p1")).await;
    assert_eq!(deleted.status, 200);
    assert_eq!(deleted.body, json!({ "id": "p1", "deleted": true }));

    let gone = call(&app, req(Method::Get, "/objects/product/p1")).await;
    assert_eq!(gone.status, 404);
    assert!(gone.body["message"].is_string());
}

#[tokio::test]
async fn request_validation_errors() {
    let app = app();

    let no_tenant = call(&app, ApiRequest::new(Method::Get, "/objects/product")).await;
    assert_eq!(no_tenant.status, 400);

    let bad_type = call(&app, req(Method::Get, "/objects/widget")).await;
    assert_eq!(bad_type.status, 400);

    let no_route = call(&app, req(Method::Get, "/things")).await;
    assert_eq!(no_route.status, 404);

    let bad_body = call(&app, req(Method::Post, "/objects/product").json_body(json!([1]))).await;
    assert_eq!(bad_body.status, 400);
}

#[tokio::test]
async fn tenants_are_isolated() {
    let app = app();
    create(&app, "event", json!({ "id": "e1" })).await;

    let other = call(
        &app,
        ApiRequest::new(Method::Get, "/objects/event/e1").header("X-Tenant-Id", "T2"),
    )
    .await;
    assert_eq!(other.status, 404);

    let list = call(
        &app,
        ApiRequest::new(Method::Get, "/objects/event").header("x-tenant-id", "T2"),
    )
    .await;
    assert_eq!(list.body, json!({ "items": [], "next": null }));
}

#[tokio::test]
async fn list_pages_with_opaque_tokens() {
    let app = app();
    for i in 0..5 {
        create(&app, "product", json!({ "id": format!("p{i}") })).await;
    }

    let mut seen = Vec::new();
    let mut next: Option<String> = None;
    loop {
        let mut request = req(Method::Get, "/objects/product").query_param("limit", "2");
        if let Some(token) = &next {
            request = request.query_param("next", token.clone());
        }
        let resp = call(&app, request).await;
        assert_eq!(resp.status, 200);
        let ids = item_ids(&resp.body);
        assert!(ids.len() <= 2);
        seen.extend(ids);
        match &resp.body["next"] {
            Value::String(token) => next = Some(token.clone()),
            Value::Null => break,
            other => panic!("unexpected next: {other}"),
        }
    }
    assert_eq!(seen, vec!["p0", "p1", "p2", "p3", "p4"]);

    let corrupted = call(
        &app,
        req(Method::Get, "/objects/product")
            .query_param("limit", "2")
            .query_param("next", "%%%garbage"),
    )
    .await;
    assert_eq!(corrupted.status, 200);
    assert_eq!(item_ids(&corrupted.body), vec!["p0", "p1"]);
}

#[tokio::test]
async fn limit_is_clamped_and_defaulted() {
    let app = app_with(ServiceConfig {
        default_limit: 2,
        max_limit: 3,
        ..ServiceConfig::default()
    });
    for i in 0..6 {
        create(&app, "view", json!({ "id": format!("v{i}") })).await;
    }

    let big = call(&app, req(Method::Get, "/objects/view").query_param("limit", "500")).await;
    assert_eq!(item_ids(&big.body).len(), 3);

    let junk = call(&app, req(Method::Get, "/objects/view").query_param("limit", "abc")).await;
    assert_eq!(item_ids(&junk.body).len(), 2);

    let zero = call(&app, req(Method::Get, "/objects/view").query_param("limit", "0")).await;
    assert_eq!(item_ids(&zero.body).len(), 2);
}

#[tokio::test]
async fn list_filters_by_status_and_text() {
    let app = app();
    create(&app, "product", json!({ "id": "a", "status": "active", "name": "Blue Mug" })).await;
    create(&app, "product", json!({ "id": "b", "status": "archived", "name": "Red Mug" })).await;
    create(&app, "product", json!({ "id": "c", "status": "active", "name": "Plate" })).await;

    let active = call(&app, req(Method::Get, "/objects/product").query_param("status", "active")).await;
    assert_eq!(item_ids(&active.body), vec!["a", "c"]);

    let mugs = call(&app, req(Method::Get, "/objects/product").query_param("q", "mug")).await;
    assert_eq!(item_ids(&mugs.body), vec!["a", "b"]);

    let both = call(
        &app,
        req(Method::Get, "/objects/product")
            .query_param("q", "MUG")
            .query_param("status", "archived,deleted"),
    )
    .await;
    assert_eq!(item_ids(&both.body), vec!["b"]);
}

async fn seed_registrations(app: &App) {
    let rows = [
        json!({ "id": "r1", "eventId": "ev1", "name": "Ada", "status": "confirmed" }),
        json!({ "id": "r2", "eventId": "ev1", "name": "Bob", "status": "confirmed", "paymentStatus": "pending" }),
        json!({ "id": "r3", "eventId": "ev1", "name": "Cy", "status": "cancelled" }),
        json!({ "id": "r4", "eventId": "ev1", "name": "Di", "status": "confirmed", "checkedInAt": 1700000000000u64 }),
        json!({ "id": "r5", "eventId": "ev1", "name": "Ed", "waiverRequired": true, "waiverSigned": false }),
        json!({ "id": "r6", "eventId": "ev2", "name": "Fay" }),
    ];
    for row in rows {
        create(app, "registration", row).await;
    }
}

#[tokio::test]
async fn worklist_filters() {
    let app = app();
    seed_registrations(&app).await;
    let path = "/events/ev1/checkin-worklist";

    let all = call(&app, req(Method::Get, path)).await;
    assert_eq!(all.status, 200);
    assert_eq!(item_ids(&all.body), vec!["r1", "r2", "r3", "r4", "r5"]);
    assert_eq!(all.body["items"][1]["blockerCodes"], json!(["payment_due"]));
    assert_eq!(all.body["items"][0]["ready"], json!(true));

    let ready = call(&app, req(Method::Get, path).query_param("ready", "yes")).await;
    assert_eq!(item_ids(&ready.body), vec!["r1"]);

    let checked_in = call(&app, req(Method::Get, path).query_param("checkedIn", "1")).await;
    assert_eq!(item_ids(&checked_in.body), vec!["r4"]);

    let not_checked_in = call(&app, req(Method::Get, path).query_param("checkedIn", "FALSE")).await;
    assert_eq!(item_ids(&not_checked_in.body), vec!["r1", "r2", "r3", "r5"]);

    let blocked = call(
        &app,
        req(Method::Get, path).query_param("blockerCode", "cancelled,waiver_missing"),
    )
    .await;
    assert_eq!(item_ids(&blocked.body), vec!["r3", "r5"]);

    let search = call(&app, req(Method::Get, path).query_param("q", "bo")).await;
    assert_eq!(item_ids(&search.body), vec!["r2"]);
}

#[tokio::test]
async fn invalid_boolean_is_a_client_error() {
    let app = app();
    seed_registrations(&app).await;

    let resp = call(
        &app,
        req(Method::Get, "/events/ev1/checkin-worklist").query_param("checkedIn", "maybe"),
    )
    .await;
    assert_eq!(resp.status, 400);
    let message = resp.body["message"].as_str().expect("message");
    assert!(message.contains("checkedIn"), "{message}");
}

#[tokio::test]
async fn worklist_pages_through_selective_filter() {
    let app = app_with(ServiceConfig {
        filter_page_size: 2,
        max_filter_pages: 2,
        ..ServiceConfig::default()
    });
    for i in 0..8 {
        let status = if i == 7 { "vip" } else { "confirmed" };
        create(
            &app,
            "registration",
            json!({ "id": format!("r{i}"), "eventId": "ev1", "status": status }),
        )
        .await;
    }

    let path = "/events/ev1/checkin-worklist";
    let mut request = req(Method::Get, path).query_param("status", "vip");
    let mut pages = 0;
    let found = loop {
        pages += 1;
        let resp = call(&app, request.clone()).await;
        assert_eq!(resp.status, 200);
        let ids = item_ids(&resp.body);
        if !ids.is_empty() {
            break ids;
        }
        let token = resp.body["next"].as_str().expect("partial page keeps a cursor").to_string();
        request = req(Method::Get, path)
            .query_param("status", "vip")
            .query_param("next", token);
    };
    assert_eq!(found, vec!["r7"]);
    assert_eq!(pages, 2);
}

#[tokio::test]
async fn patch_lines_endpoint() {
    let app = app();
    create(
        &app,
        "salesOrder",
        json!({ "id": "so1", "lines": [
            { "id": "L1", "itemId": "A", "qty": 1, "uom": "ea" },
            { "id": "L2", "itemId": "B", "qty": 1, "uom": "ea" },
        ] }),
    )
    .await;
    let path = "/objects/salesOrder/so1/lines";

    let resp = call(
        &app,
        req(Method::Patch, path).json_body(json!({ "ops": [
            { "op": "remove", "id": "L2" },
            { "op": "upsert", "id": "L1", "patch": { "qty": 5 } },
            { "op": "upsert", "cid": "tmp-9", "patch": { "itemId": "C", "qty": 2, "uom": "box" } },
        ] })),
    )
    .await;
    assert_eq!(resp.status, 200, "{}", resp.body);
    let lines = resp.body["lines"].as_array().expect("lines");
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["qty"], json!(5));
    assert_eq!(resp.body["created"][0]["cid"], json!("tmp-9"));
    assert_eq!(resp.body["created"][0]["id"], lines[1]["id"]);
    assert_eq!(resp.body["order"]["lines"], resp.body["lines"]);

    let empty = call(&app, req(Method::Patch, path).json_body(json!({ "ops": [] }))).await;
    assert_eq!(empty.status, 200);
    assert_eq!(empty.body["lines"], resp.body["lines"]);

    let unknown = call(
        &app,
        req(Method::Patch, path).json_body(json!({ "ops": [{ "op": "remove", "id": "L404" }] })),
    )
    .await;
    assert_eq!(unknown.status, 400);

    let malformed = call(
        &app,
        req(Method::Patch, path).json_body(json!({ "ops": [{ "op": "explode" }] })),
    )
    .await;
    assert_eq!(malformed.status, 400);

    create(&app, "product", json!({ "id": "p1" })).await;
    let not_order = call(
        &app,
        req(Method::Patch, "/objects/product/p1/lines").json_body(json!({ "ops": [] })),
    )
    .await;
    assert_eq!(not_order.status, 400);

    let missing = call(
        &app,
        req(Method::Patch, "/objects/salesOrder/nope/lines")
            .json_body(json!({ "ops": [{ "op": "remove", "id": "L1" }] })),
    )
    .await;
    assert_eq!(missing.status, 404);
}
