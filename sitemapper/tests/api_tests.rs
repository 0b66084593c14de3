// Tests for the sitemap HTTP API, driven through the router with oneshot

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use chrono::{TimeZone, Utc};
use flate2::read::GzDecoder;
use serde_json::{Value, json};
use sitemapper::server::{AppState, router};
use sitemapper_core::crawl::CrawlOptions;
use sitemapper_core::data::{Database, SharedDatabase, shared};
use sitemapper_core::model::DiscoveredUrl;
use std::io::Read;
use tower::util::ServiceExt;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

fn test_state() -> (SharedDatabase, Router) {
    let db = shared(Database::in_memory().unwrap());
    let options = CrawlOptions {
        timeout_secs: 2,
        ..CrawlOptions::default()
    };
    let app = router(AppState::new(db.clone(), options));
    (db, app)
}

fn seed(db: &SharedDatabase, url: &str, status: u16) {
    let checked_at = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
    let record = DiscoveredUrl::from_fetch("shop.com", url, status, checked_at);
    db.lock().unwrap().upsert_url(&record).unwrap();
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn generate_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/sitemap/generate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn gunzip(bytes: &[u8]) -> String {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = String::new();
    decoder.read_to_string(&mut out).unwrap();
    out
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body.to_owned(), "text/html"),
        )
        .mount(server)
        .await;
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_check_works() {
    let (_db, app) = test_state();

    let (status, body) = get(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "healthy" }));
}

// ============================================================================
// POST /api/sitemap/generate
// ============================================================================

#[tokio::test]
async fn test_generate_requires_domain() {
    let (_db, app) = test_state();

    let response = app.oneshot(generate_request(json!({}))).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["error"].as_str().unwrap().contains("Domain is required"));
}

async fn assert_json_bad_request(response: axum::response::Response) {
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("Validation error"));
}

#[tokio::test]
async fn test_generate_rejects_malformed_json() {
    let (_db, app) = test_state();
    let request = Request::builder()
        .method("POST")
        .uri("/api/sitemap/generate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"domain\": "))
        .unwrap();

    assert_json_bad_request(app.oneshot(request).await.unwrap()).await;
}

#[tokio::test]
async fn test_generate_rejects_missing_content_type() {
    let (_db, app) = test_state();
    let request = Request::builder()
        .method("POST")
        .uri("/api/sitemap/generate")
        .body(Body::from(json!({ "domain": "shop.com" }).to_string()))
        .unwrap();

    assert_json_bad_request(app.oneshot(request).await.unwrap()).await;
}

#[tokio::test]
async fn test_generate_rejects_wrongly_typed_domain() {
    let (_db, app) = test_state();

    let response = app.oneshot(generate_request(json!({ "domain": 42 }))).await.unwrap();

    assert_json_bad_request(response).await;
}

#[tokio::test]
async fn test_generate_with_crawl_returns_gzipped_sitemap() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/product/1">p</a><a href="/gone">g</a>"#).await;
    mount_page(&server, "/product/1", r#"<a href="/">home</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let (db, app) = test_state();
    let response = app
        .oneshot(generate_request(json!({ "domain": server.uri(), "crawl": true })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/xml"
    );
    assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let xml = gunzip(&body);
    assert!(xml.contains(&format!("<loc>{}/</loc>", server.uri())));
    assert!(xml.contains(&format!("<loc>{}/product/1</loc>", server.uri())));
    assert!(!xml.contains("/gone"));

    assert_eq!(db.lock().unwrap().count_urls("127.0.0.1").unwrap(), 3);
}

#[tokio::test]
async fn test_generate_respects_max_urls() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/a">a</a><a href="/b">b</a>"#).await;
    mount_page(&server, "/a", "").await;
    mount_page(&server, "/b", "").await;

    let (db, app) = test_state();
    let response = app
        .oneshot(generate_request(
            json!({ "domain": server.uri(), "crawl": true, "maxUrls": 1 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(db.lock().unwrap().count_urls("127.0.0.1").unwrap(), 1);
}

#[tokio::test]
async fn test_generate_from_stored_records_without_crawl() {
    let (db, app) = test_state();
    seed(&db, "https://shop.com/", 200);
    seed(&db, "https://shop.com/broken", 500);

    let response = app
        .oneshot(generate_request(json!({ "domain": "shop.com" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let xml = gunzip(&body);
    assert!(xml.contains("<loc>https://shop.com/</loc>"));
    assert!(xml.contains("<priority>1.0</priority>"));
    assert!(!xml.contains("broken"));
}

#[tokio::test]
async fn test_generate_unreachable_root_is_bad_gateway() {
    let (db, app) = test_state();

    let response = app
        .oneshot(generate_request(
            json!({ "domain": "http://127.0.0.1:1", "crawl": true }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(db.lock().unwrap().count_urls("127.0.0.1").unwrap(), 0);
}

// ============================================================================
// GET /api/sitemap/{domain}/urls
// ============================================================================

#[tokio::test]
async fn test_list_urls_paginates() {
    let (db, app) = test_state();
    seed(&db, "https://shop.com/", 200);
    seed(&db, "https://shop.com/product/1", 200);
    seed(&db, "https://shop.com/about", 200);

    let (status, body) = get(app, "/api/sitemap/shop.com/urls?page=1&limit=2").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["urls"].as_array().unwrap().len(), 2);
    assert_eq!(body["urls"][0]["url"], "https://shop.com/");
    assert_eq!(body["urls"][0]["httpStatus"], 200);
    assert_eq!(body["urls"][1]["changeFrequency"], "weekly");
    assert_eq!(
        body["pagination"],
        json!({ "total": 3, "pages": 2, "currentPage": 1, "limit": 2 })
    );
}

#[tokio::test]
async fn test_list_urls_filters_by_status() {
    let (db, app) = test_state();
    seed(&db, "https://shop.com/", 200);
    seed(&db, "https://shop.com/gone", 404);

    let (status, body) = get(app, "/api/sitemap/shop.com/urls?status=404").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["urls"][0]["url"], "https://shop.com/gone");
}

#[tokio::test]
async fn test_list_urls_rejects_bad_paging() {
    for uri in [
        "/api/sitemap/shop.com/urls?page=0",
        "/api/sitemap/shop.com/urls?limit=0",
        "/api/sitemap/shop.com/urls?limit=1001",
        "/api/sitemap/shop.com/urls?page=abc",
        "/api/sitemap/shop.com/urls?status=abc",
    ] {
        let (_db, app) = test_state();
        let (status, body) = get(app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert!(body["error"].is_string());
    }
}

// ============================================================================
// GET /api/sitemap/{domain}/stats
// ============================================================================

#[tokio::test]
async fn test_stats() {
    let (db, app) = test_state();
    seed(&db, "https://shop.com/", 200);
    seed(&db, "https://shop.com/blog/post", 200);
    seed(&db, "https://shop.com/gone", 404);

    let (status, body) = get(app, "/api/sitemap/SHOP.com/stats").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["ok"], 2);
    assert_eq!(body["broken"], 1);
    assert!(body["lastCrawled"].is_string());
}

#[tokio::test]
async fn test_stats_for_unknown_domain() {
    let (_db, app) = test_state();

    let (status, body) = get(app, "/api/sitemap/unknown.com/stats").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
    assert!(body["lastCrawled"].is_null());
}
