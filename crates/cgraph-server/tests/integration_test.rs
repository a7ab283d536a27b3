//! End-to-end integration tests for the concept graph HTTP API.
//!
//! Tests exercise the full stack: HTTP request -> axum router -> handler ->
//! GraphService -> sync engine -> SQLite store -> HTTP response.
//!
//! Each test creates a fresh AppState backed by an in-memory database and
//! sends requests with `tower::ServiceExt::oneshot`, without starting a
//! network server.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::json;
use tower::ServiceExt;

use cgraph_server::router::build_router;
use cgraph_server::service::GraphService;
use cgraph_server::state::AppState;
use cgraph_sync::{DanglingPolicy, SyncOptions};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

fn test_app() -> Router {
    let state = AppState::in_memory().expect("failed to create in-memory AppState");
    build_router(state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap_or(json!(null));
    (status, json)
}

/// Sends a POST request with a JSON body and returns (status, json).
async fn post_json(
    app: &Router,
    path: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    send(app, request).await
}

/// Sends a GET request and returns (status, json).
async fn get_json(app: &Router, path: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder().uri(path).body(Body::empty()).unwrap();
    send(app, request).await
}

/// Creates an entry and returns its durable id.
async fn create(app: &Router, entry: serde_json::Value) -> i64 {
    let (status, body) = post_json(app, "/entries", entry).await;
    assert_eq!(status, StatusCode::OK, "save entry failed: {:?}", body);
    body["id"].as_i64().unwrap()
}

/// A framework with one concept; returns (framework, concept).
async fn seed(app: &Router) -> (i64, i64) {
    let framework = create(app, json!({"table": "framework", "name": "Physics"})).await;
    let concept = create(
        app,
        json!({"table": "concept", "name": "force", "framework": framework}),
    )
    .await;
    (framework, concept)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_ok() {
    let app = test_app();
    let (status, body) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "status": "ok"}));
}

#[tokio::test]
async fn save_entry_without_table_is_rejected() {
    let app = test_app();
    let (status, body) = post_json(&app, "/entries", json!({"name": "Physics"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["code"], json!("BAD_REQUEST"));

    let (_, graph) = get_json(&app, "/graph").await;
    assert_eq!(graph["frameworks"], json!({}));
}

#[tokio::test]
async fn malformed_json_gets_the_error_envelope() {
    let app = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/relations")
        .header("content-type", "application/json")
        .body(Body::from("{\"nodes\": ["))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn new_entries_report_their_old_id() {
    let app = test_app();
    let (status, body) = post_json(
        &app,
        "/entries",
        json!({"table": "framework", "id": "-4", "name": "Physics"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["id"].as_i64().unwrap();
    let entry = &body["entries"]["framework"][id.to_string()];
    assert_eq!(entry["name"], json!("Physics"));
    assert_eq!(entry["oldId"], json!(-4));
    assert_eq!(body["idMap"]["framework"]["-4"], json!(id));
}

#[tokio::test]
async fn relation_save_renumbers_and_links_nodes() {
    let app = test_app();
    let (framework, concept) = seed(&app).await;

    let (status, body) = post_json(
        &app,
        "/relations",
        json!({
            "id": -1,
            "framework": framework,
            "nodes": [
                {"id": -1, "concept": concept, "value": {"n": 1}, "head": -2, "reference": null},
                {"id": -2, "concept": concept, "head": null, "reference": null}
            ],
            "predicates": [{"node": -1, "predicate_group": 0}]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "save relation failed: {:?}", body);
    assert_eq!(body["success"], json!(true));

    let law = body["law"].as_i64().unwrap();
    let first = body["idMap"]["node"]["-1"].as_i64().unwrap();
    let second = body["idMap"]["node"]["-2"].as_i64().unwrap();
    let nodes = &body["entries"]["node"];
    assert_eq!(nodes[first.to_string()]["head"], json!(second));
    assert_eq!(nodes[first.to_string()]["oldId"], json!(-1));
    assert_eq!(nodes[second.to_string()]["oldId"], json!(-2));
    let law_entry = &body["entries"]["law"][law.to_string()];
    assert_eq!(law_entry["oldId"], json!(-1));
    assert_eq!(law_entry["name"], json!("New Law"));
    assert_eq!(law_entry["predicates"]["0"][first.to_string()], json!(true));
    assert_eq!(body["dangling"], json!([]));
}

#[tokio::test]
async fn omitted_nodes_are_collected_over_http() {
    let app = test_app();
    let (_, concept) = seed(&app).await;
    let (_, body) = post_json(
        &app,
        "/relations",
        json!({
            "id": -1,
            "nodes": [
                {"id": -1, "concept": concept, "head": -2},
                {"id": -2, "concept": concept}
            ]
        }),
    )
    .await;
    let law = body["law"].as_i64().unwrap();
    let first = body["idMap"]["node"]["-1"].as_i64().unwrap();
    let second = body["idMap"]["node"]["-2"].as_i64().unwrap();

    let (status, body) = post_json(
        &app,
        "/relations",
        json!({
            "id": law,
            "revision": 1,
            "nodes": [{"id": first, "concept": concept, "head": second}]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], json!([second]));
    assert_eq!(body["entries"]["node"][first.to_string()]["head"], json!(null));
    assert_eq!(body["dangling"][0]["field"], json!("head"));
    assert_eq!(body["revision"], json!(2));
}

#[tokio::test]
async fn stale_revision_is_a_conflict() {
    let app = test_app();
    let (_, concept) = seed(&app).await;
    let (_, body) = post_json(
        &app,
        "/relations",
        json!({"id": -1, "nodes": [{"id": -1, "concept": concept}]}),
    )
    .await;
    let law = body["law"].as_i64().unwrap();

    let (status, body) = post_json(
        &app,
        "/relations",
        json!({"id": law, "revision": 0, "nodes": []}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], json!("CONFLICT"));
}

#[tokio::test]
async fn unknown_records_are_not_found() {
    let app = test_app();
    let (status, body) = post_json(&app, "/relations", json!({"id": 77, "nodes": []})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));

    let (status, _) = get_json(&app, "/graph?law=12").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, concept) = seed(&app).await;
    let (status, body) = post_json(
        &app,
        "/relations",
        json!({"id": -1, "nodes": [{"id": -1, "concept": concept + 100}]}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{:?}", body);
}

#[tokio::test]
async fn loading_a_framework_includes_eager_dependencies() {
    let app = test_app();
    let (math, number) = {
        let math = create(&app, json!({"table": "framework", "name": "Math"})).await;
        let number = create(
            &app,
            json!({"table": "concept", "name": "number", "framework": math}),
        )
        .await;
        (math, number)
    };
    let (_, body) = post_json(
        &app,
        "/relations",
        json!({"id": -1, "framework": math, "nodes": [{"id": -1, "concept": number}]}),
    )
    .await;
    let math_law = body["law"].as_i64().unwrap();
    let math_node = body["idMap"]["node"]["-1"].as_i64().unwrap();

    let physics = create(
        &app,
        json!({
            "table": "framework",
            "name": "Physics",
            "dependencies": {math.to_string(): true}
        }),
    )
    .await;
    // Mutual dependency must not loop.
    create(
        &app,
        json!({
            "table": "framework",
            "id": math,
            "dependencies": {physics.to_string(): false}
        }),
    )
    .await;

    let (status, graph) = get_json(&app, &format!("/graph?framework={}", physics)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(graph["success"], json!(true));
    assert_eq!(graph["frameworks"][physics.to_string()]["loaded"], json!(true));
    assert_eq!(graph["frameworks"][math.to_string()]["loaded"], json!(true));
    assert!(graph["concepts"].get(number.to_string()).is_some());
    assert!(graph["laws"].get(math_law.to_string()).is_some());
    assert!(graph["nodes"].get(math_node.to_string()).is_some());
    assert_eq!(graph["nextNodeId"], json!(math_node + 1));
}

#[tokio::test]
async fn empty_root_selector_loads_general() {
    let app = test_app();
    let general = create(&app, json!({"table": "framework", "name": "General"})).await;
    create(&app, json!({"table": "framework", "name": "Other"})).await;

    let (status, graph) = get_json(&app, "/graph?framework=&law=").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(graph["frameworks"][general.to_string()]["loaded"], json!(true));
    assert_eq!(graph["frameworks"].as_object().unwrap().len(), 2);

    let (status, body) = get_json(&app, "/graph?framework=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn sequences_reset_between_saves() {
    let app = test_app();
    for name in ["a", "b", "c"] {
        create(&app, json!({"table": "framework", "name": name})).await;
    }
    let (status, _) = post_json(
        &app,
        "/entries",
        json!({"table": "framework", "id": 3, "deleted": true}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(&app, "/admin/sequences/framework/reset", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "table": "framework", "nextId": 3}));

    let (status, body) = post_json(&app, "/admin/sequences/painting/reset", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn reject_policy_turns_dangling_pointers_into_errors() {
    let service = GraphService::in_memory(SyncOptions {
        dangling: DanglingPolicy::Reject,
    })
    .unwrap();
    let app = build_router(AppState::from_service(service));
    let (_, concept) = seed(&app).await;

    let (status, body) = post_json(
        &app,
        "/relations",
        json!({"id": -1, "nodes": [{"id": -1, "concept": concept, "head": -5}]}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("dangling"));
}
