//! Integration tests for the Catalog Service API

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use catalog_service::{
    create_router,
    memory::{InMemoryDocumentStore, InMemoryObjectStore},
    AppState, CatalogSnapshot, CatalogStore,
};
use market_common::RawRecord;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt; // for `oneshot`

const BOUNDARY: &str = "catalog-test-boundary";

struct TestApp {
    router: Router,
    documents: Arc<InMemoryDocumentStore>,
    objects: Arc<InMemoryObjectStore>,
    admin: Arc<CatalogStore>,
    storefront: Arc<CatalogStore>,
}

impl TestApp {
    async fn new(seed: Vec<RawRecord>) -> Self {
        let documents = Arc::new(InMemoryDocumentStore::with_records(seed));
        let objects = Arc::new(InMemoryObjectStore::new("https://storage.test/market"));

        let state = AppState::connect(documents.clone(), objects.clone()).await;
        let admin = state.admin.catalog().clone();
        let storefront = state.storefront.catalog().clone();

        let app = Self {
            router: create_router(state),
            documents,
            objects,
            admin,
            storefront,
        };
        app.settle(|s| s.revision >= 1).await;
        app
    }

    /// Wait until both screens' catalogs satisfy `done`.
    async fn settle(&self, done: impl Fn(&CatalogSnapshot) -> bool) {
        for catalog in [&self.admin, &self.storefront] {
            let mut rx = catalog.watch();
            tokio::time::timeout(Duration::from_secs(1), rx.wait_for(&done))
                .await
                .expect("catalog did not settle")
                .expect("catalog closed");
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };

        (status, json)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn post_empty(&self, uri: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .uri(uri)
                .method("POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}

fn record(id: &str, value: Value) -> RawRecord {
    match value {
        Value::Object(map) => RawRecord::new(id, map),
        _ => panic!("expected an object"),
    }
}

/// `count` entries, `app-1` oldest; every third one featured.
fn seeded(count: usize) -> Vec<RawRecord> {
    (1..=count)
        .map(|i| {
            record(
                &format!("app-{i}"),
                json!({
                    "name": format!("App {i}"),
                    "description": "Useful tool",
                    "category": if i % 2 == 0 { "games" } else { "tools" },
                    "downloadUrl": format!("https://example.com/{i}.apk"),
                    "downloads": i * 3,
                    "featured": i % 3 == 0,
                    "createdAt": format!("2025-01-{:02}T00:00:00.000Z", i),
                }),
            )
        })
        .collect()
}

fn multipart_request(
    method: &str,
    uri: &str,
    fields: &[(&str, &str)],
    icon: Option<(&str, &[u8])>,
) -> Request<Body> {
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }

    if let Some((file_name, bytes)) = icon {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"icon\"; filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .uri(uri)
        .method(method)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

const FORM: &[(&str, &str)] = &[
    ("name", "Space Game"),
    ("category", "games"),
    ("description", "Shoot the asteroids"),
    ("downloadUrl", "https://example.com/space.apk"),
    ("rating", "4.5"),
    ("downloads", ""),
    ("featured", "on"),
];

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new(vec![]).await;

    let (status, json) = app.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "catalog-service");
}

#[tokio::test]
async fn test_create_app_with_icon() {
    let app = TestApp::new(vec![]).await;

    let (status, json) = app
        .send(multipart_request(
            "POST",
            "/api/admin/apps",
            FORM,
            Some(("space.png", b"\x89PNG")),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    let id = json["id"].as_str().unwrap().to_string();

    app.settle(|s| s.find(&id).is_some()).await;

    let (status, json) = app.get(&format!("/api/apps/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["app"]["name"], "Space Game");
    assert_eq!(json["app"]["rating"], 4.5);
    assert_eq!(json["app"]["downloads"], 0);
    assert_eq!(json["app"]["featured"], true);
    let icon_url = json["app"]["iconUrl"].as_str().unwrap();
    assert!(icon_url.ends_with("-space.png"));
    assert!(app.objects.contains(icon_url));
}

#[tokio::test]
async fn test_create_fails_when_upload_fails() {
    let app = TestApp::new(vec![]).await;
    app.objects.set_fail_uploads(true);

    let (status, json) = app
        .send(multipart_request(
            "POST",
            "/api/admin/apps",
            FORM,
            Some(("space.png", b"\x89PNG")),
        ))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().unwrap().contains("upload"));
    assert!(app.documents.is_empty());
}

#[tokio::test]
async fn test_form_numbers_use_leading_digits() {
    let app = TestApp::new(vec![]).await;
    let fields = [
        ("name", "Hand typed"),
        ("rating", "4abc"),
        ("downloads", "5.7"),
    ];

    let (status, json) = app
        .send(multipart_request("POST", "/api/admin/apps", &fields, None))
        .await;
    assert_eq!(status, StatusCode::OK);

    let stored = app.documents.get(json["id"].as_str().unwrap()).unwrap();
    assert_eq!(stored["rating"], 4.0);
    assert_eq!(stored["downloads"], 5);
    assert_eq!(stored["featured"], false);
}

#[tokio::test]
async fn test_update_app_keeps_icon() {
    let app = TestApp::new(vec![record(
        "app-1",
        json!({
            "name": "Before",
            "iconUrl": "https://storage.test/market/app-icons/1-before.png",
            "createdAt": "2025-01-01T00:00:00.000Z"
        }),
    )])
    .await;

    let (status, _) = app
        .send(multipart_request("PUT", "/api/admin/apps/app-1", FORM, None))
        .await;
    assert_eq!(status, StatusCode::OK);

    let stored = app.documents.get("app-1").unwrap();
    assert_eq!(stored["name"], "Space Game");
    assert_eq!(
        stored["iconUrl"],
        "https://storage.test/market/app-icons/1-before.png"
    );
    assert_eq!(stored["createdAt"], "2025-01-01T00:00:00.000Z");
}

#[tokio::test]
async fn test_admin_pagination() {
    let app = TestApp::new(seeded(25)).await;

    let (status, json) = app.get("/api/admin/apps").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["page"], 1);
    assert_eq!(json["totalPages"], 3);
    assert_eq!(json["total"], 25);
    assert_eq!(json["items"].as_array().unwrap().len(), 10);
    // Admin live query is newest first
    assert_eq!(json["items"][0]["id"], "app-25");

    let (_, json) = app.get("/api/admin/apps?page=3").await;
    assert_eq!(json["page"], 3);
    assert_eq!(json["items"].as_array().unwrap().len(), 5);

    let (_, json) = app.get("/api/admin/apps?page=4").await;
    assert_eq!(json["page"], 3);
    assert!(json.get("total_pages").is_none());
    assert!(json["items"][0].get("download_url").is_none());
    assert!(json["items"][0]["downloadUrl"].is_string());
}

#[tokio::test]
async fn test_admin_filter_and_summary() {
    let app = TestApp::new(seeded(25)).await;

    let (_, json) = app.get("/api/admin/apps?category=games&q=app%202").await;

    // games are the even ids; "app 2" matches 2, 20, 22, 24
    assert_eq!(json["total"], 4);
    assert_eq!(json["catalogSize"], 25);
    assert_eq!(json["items"][0]["summary"], "Useful tool");
}

#[tokio::test]
async fn test_admin_stats() {
    let app = TestApp::new(seeded(4)).await;

    let (status, json) = app.get("/api/admin/stats").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["totalApps"], 4);
    assert_eq!(json["totalDownloads"], 30);
    assert_eq!(json["recent"][0]["id"], "app-4");
}

#[tokio::test]
async fn test_storefront_shelves() {
    let app = TestApp::new(seeded(30)).await;

    let (status, json) = app.get("/api/apps").await;
    assert_eq!(status, StatusCode::OK);

    let featured = json["featured"].as_array().unwrap();
    assert_eq!(featured.len(), 8);
    assert!(featured.iter().all(|e| e["featured"] == true));

    let newest = json["newest"].as_array().unwrap();
    assert_eq!(newest.len(), 8);
    assert_eq!(newest[0]["id"], "app-30");

    let top = json["top"].as_array().unwrap();
    assert_eq!(top.len(), 8);
    assert_eq!(top[0]["downloads"], 90);
    assert!(json.get("syncError").is_none());
}

#[tokio::test]
async fn test_search_and_category() {
    let mut seed = seeded(5);
    seed.push(record(
        "chess",
        json!({ "name": "Chess", "description": "Classic board GAME", "category": "board" }),
    ));
    let app = TestApp::new(seed).await;

    let (_, json) = app.get("/api/apps/search?q=game").await;
    // the two "games" category entries plus chess
    assert_eq!(json["total"], 3);

    let (_, json) = app.get("/api/apps/search?q=").await;
    assert_eq!(json["total"], 6);

    let (_, json) = app.get("/api/apps/category/games").await;
    assert_eq!(json["total"], 2);

    let (_, json) = app.get("/api/apps/category/all").await;
    assert_eq!(json["total"], 6);
}

#[tokio::test]
async fn test_download_increments_counter() {
    let app = TestApp::new(vec![record(
        "app-1",
        json!({ "name": "Counter", "downloads": 4, "downloadUrl": "https://example.com/c.apk" }),
    )])
    .await;

    let (status, json) = app.post_empty("/api/apps/app-1/download").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["downloads"], 5);
    assert_eq!(json["downloadUrl"], "https://example.com/c.apk");

    app.settle(|s| s.find("app-1").is_some_and(|e| e.downloads == 5))
        .await;
    let (_, json) = app.get("/api/apps/app-1").await;
    assert_eq!(json["app"]["downloads"], 5);
}

#[tokio::test]
async fn test_unknown_app_is_not_found() {
    let app = TestApp::new(vec![]).await;

    let (status, json) = app.get("/api/apps/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].is_string());

    let (status, _) = app.post_empty("/api/apps/nope/download").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_toggle_featured() {
    let app = TestApp::new(vec![record("app-1", json!({ "name": "Promo" }))]).await;

    let (status, json) = app
        .send(
            Request::builder()
                .uri("/api/admin/apps/app-1/featured")
                .method("POST")
                .header("content-type", "application/json")
                .body(Body::from(json!({ "featured": true }).to_string()))
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    app.settle(|s| s.find("app-1").is_some_and(|e| e.featured))
        .await;
    let (_, json) = app.get("/api/apps").await;
    assert_eq!(json["featured"][0]["id"], "app-1");
}

#[tokio::test]
async fn test_delete_survives_icon_failure() {
    let app = TestApp::new(vec![record(
        "app-1",
        json!({ "name": "Gone", "iconUrl": "https://storage.test/market/app-icons/1-gone.png" }),
    )])
    .await;
    app.objects.set_fail_deletes(true);

    let (status, _) = app
        .send(
            Request::builder()
                .uri("/api/admin/apps/app-1")
                .method("DELETE")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    app.settle(|s| s.find("app-1").is_none()).await;
    let (status, _) = app.get("/api/apps/app-1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_subscription_error_keeps_catalog() {
    let app = TestApp::new(seeded(3)).await;

    app.documents.break_subscriptions("connection reset");
    app.settle(|s| s.sync_error.is_some()).await;

    let (status, json) = app.get("/api/apps/search").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 3);
    assert!(json["syncError"]
        .as_str()
        .unwrap()
        .contains("connection reset"));
}
