//! End-to-end tests driving the router in-process.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use nodepress_core::id::DocId;
use nodepress_core::mail::{LogTransport, Mailer};
use nodepress_server::routes::build_router;
use nodepress_server::state::AppState;
use nodepress_storage::MemoryBackend;

fn app() -> Router {
    let mailer = Mailer::new(Arc::new(LogTransport), "http://localhost:3000", "np@localhost");
    let state = AppState::new(Arc::new(MemoryBackend::new()), mailer);
    build_router(Arc::new(state))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn create_menu(app: &Router, title: &str, parent: Option<&str>) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/v1/menus",
        Some(json!({ "title": title, "parentId": parent })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().expect("id").to_owned()
}

#[tokio::test]
async fn menu_tree_lifecycle() {
    let app = app();
    let t1 = create_menu(&app, "T1", None).await;
    let t2 = create_menu(&app, "T2", Some(&t1)).await;
    let t3 = create_menu(&app, "T3", Some(&t2)).await;

    let (status, chain) = call(&app, Method::GET, &format!("/v1/menus/{t3}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<_> = chain
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["T1", "T2", "T3"]);

    let (status, moved) = call(
        &app,
        Method::PUT,
        &format!("/v1/menus/{t2}/parent"),
        Some(json!({ "parentId": null })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["ancestors"], json!([]));
    assert!(moved.get("parentId").is_none());

    let (_, subtree) = call(&app, Method::GET, &format!("/v1/menus/{t2}/descendants"), None).await;
    assert_eq!(subtree.as_array().unwrap().len(), 2);
    assert_eq!(subtree[1]["ancestors"], json!([t2]));

    let (status, deleted) = call(&app, Method::DELETE, &format!("/v1/menus/{t2}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted, json!({ "deleted": 2 }));

    let (_, remaining) = call(&app, Method::GET, "/v1/menus", None).await;
    assert_eq!(remaining.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn menu_listing_reads_query_string() {
    let app = app();
    for title in ["b", "a", "c"] {
        create_menu(&app, title, None).await;
    }

    let (status, page) = call(
        &app,
        Method::GET,
        "/v1/menus?sort.by=title&sort.order=-1&pageSize=2&page=2",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page.as_array().unwrap().len(), 1);
    assert_eq!(page[0]["title"], "a");

    let (_, found) = call(
        &app,
        Method::POST,
        "/v1/menus/search",
        Some(json!({ "title": "C", "pageSize": "oops" })),
    )
    .await;
    assert_eq!(found.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn menu_errors_map_to_statuses() {
    let app = app();

    let (status, _) = call(&app, Method::GET, "/v1/menus/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(&app, Method::GET, &format!("/v1/menus/{}", DocId::new()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = call(
        &app,
        Method::POST,
        "/v1/menus",
        Some(json!({ "title": "", "parentId": "xyz" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_failed");
    assert!(body["fields"]["title"].is_string());
    assert!(body["fields"]["parentId"].is_string());

    let root = create_menu(&app, "root", None).await;
    let child = create_menu(&app, "child", Some(&root)).await;
    let (status, _) = call(
        &app,
        Method::PUT,
        &format!("/v1/menus/{root}/parent"),
        Some(json!({ "parentId": child })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        Method::PUT,
        &format!("/v1/menus/{child}/parent"),
        Some(json!({ "parentId": DocId::new() })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn posts_public_listing_hides_hidden_posts() {
    let app = app();
    let (status, shown) = call(
        &app,
        Method::POST,
        "/v1/posts",
        Some(json!({ "title": "Shown", "content": "body" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, hidden) = call(
        &app,
        Method::POST,
        "/v1/posts",
        Some(json!({ "title": "Hidden", "content": "body", "display": false })),
    )
    .await;

    let (_, public) = call(&app, Method::GET, "/v1/posts?display=false", None).await;
    assert_eq!(public.as_array().unwrap().len(), 1);
    assert_eq!(public[0]["id"], shown["id"]);

    let (_, all) = call(&app, Method::POST, "/v1/posts/search", Some(json!({}))).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (_, modified) = call(
        &app,
        Method::PUT,
        "/v1/posts/display",
        Some(json!({ "ids": [hidden["id"]], "display": true })),
    )
    .await;
    assert_eq!(modified, json!({ "modified": 1 }));

    let (status, _) = call(
        &app,
        Method::POST,
        "/v1/posts",
        Some(json!({ "title": "No body" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn users_never_expose_passwords() {
    let app = app();
    let draft = json!({ "name": "Ada", "email": "ada@example.com", "password": "s3cret" });

    let (status, created) = call(&app, Method::POST, "/v1/users", Some(draft.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(created.get("password").is_none());

    let (status, body) = call(&app, Method::POST, "/v1/users", Some(draft)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let id = created["id"].as_str().unwrap();
    let (_, modified) = call(
        &app,
        Method::PUT,
        "/v1/users/active",
        Some(json!({ "ids": [id], "active": true })),
    )
    .await;
    assert_eq!(modified, json!({ "modified": 1 }));

    let (_, listed) = call(&app, Method::GET, "/v1/users?isActive=true", None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert!(listed[0].get("password").is_none());

    let (status, _) = call(&app, Method::DELETE, &format!("/v1/users/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, Method::GET, &format!("/v1/users/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn user_update_validates_and_reports_missing_accounts() {
    let app = app();
    let (_, created) = call(
        &app,
        Method::POST,
        "/v1/users",
        Some(json!({ "name": "Ada", "email": "ada@example.com", "password": "s3cret" })),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let (status, updated) = call(
        &app,
        Method::PUT,
        &format!("/v1/users/{id}"),
        Some(json!({ "role": "admin", "isConfirmed": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["role"], "admin");
    assert_eq!(updated["isConfirmed"], true);
    assert_eq!(updated["name"], "ada");
    assert!(updated.get("password").is_none());

    let (status, body) = call(
        &app,
        Method::PUT,
        &format!("/v1/users/{id}"),
        Some(json!({ "name": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["name"].is_string());

    let (status, _) = call(
        &app,
        Method::PUT,
        &format!("/v1/users/{}", DocId::new()),
        Some(json!({ "isActive": true })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn settings_and_setup_status() {
    let app = app();

    let (_, status) = call(&app, Method::GET, "/v1/setup/status", None).await;
    assert_eq!(status, json!({ "configured": false }));

    let (_, defaults) = call(&app, Method::GET, "/v1/settings", None).await;
    assert_eq!(defaults["title"], "Site Title");

    let (code, body) = call(
        &app,
        Method::PUT,
        "/v1/settings",
        Some(json!({ "title": "t".repeat(101) })),
    )
    .await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["title"].is_string());

    let (code, saved) = call(
        &app,
        Method::PUT,
        "/v1/settings",
        Some(json!({ "title": "My Blog" })),
    )
    .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(saved["title"], "My Blog");

    let (_, status) = call(&app, Method::GET, "/v1/setup/status", None).await;
    assert_eq!(status, json!({ "configured": true }));
}
