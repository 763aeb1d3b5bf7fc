#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use readstack::catalog::CatalogClient;
use readstack::config::Config;
use readstack::db;
use readstack::routes;
use readstack::state::AppState;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

/// Build the real router against a fresh temp-dir database.
/// The TempDir must stay alive for the duration of the test.
pub fn test_app() -> (Router, TempDir) {
    let tmp = TempDir::new().unwrap();
    let pool = db::create_pool(&tmp.path().join("test.db")).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");

    let config = Config::default();
    let state = AppState {
        db: pool,
        catalog: CatalogClient::new(&config.catalog),
        config,
    };
    (routes::app(state), tmp)
}

/// Drive one request through the router and decode the JSON body.
pub async fn request(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Sign up a user and log in. Returns (bearer token, user id).
pub async fn signup_and_login(app: &Router, username: &str) -> (String, i64) {
    let (status, _) = request(
        app,
        Method::POST,
        "/api/auth/signup",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "hunter2",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = request(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username_or_email": username, "password": "hunter2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let token = body["token"].as_str().unwrap().to_string();
    let user_id = body["user"]["id"].as_i64().unwrap();
    (token, user_id)
}

/// Save a book and return its local id.
pub async fn seed_book(app: &Router, catalog_id: &str) -> i64 {
    let (status, body) = request(
        app,
        Method::POST,
        "/api/books",
        None,
        Some(json!({ "catalog_id": catalog_id, "title": "Dune", "authors": ["Frank Herbert"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["book"]["id"].as_i64().unwrap()
}

/// Create a post and return its id.
pub async fn seed_post(app: &Router, token: &str, book_id: i64, content: &str) -> i64 {
    let (status, body) = request(
        app,
        Method::POST,
        "/api/posts",
        Some(token),
        Some(json!({ "book_id": book_id, "content": content })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["post"]["id"].as_i64().unwrap()
}
