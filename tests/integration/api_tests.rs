//! API integration tests
//!
//! The in-process tests drive the router over the in-memory repository.
//! The `#[ignore]`d ones target a running server backed by PostgreSQL.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use library_server::{
    api,
    config::{AppConfig, ClientCredential, StorageConfig},
    models::Rights,
    repository::Repository,
    services::{auth::hash_secret, Services},
    AppState,
};

const WRITER_ID: &str = "front-desk";
const WRITER_SECRET: &str = "desk-secret";
const READER_ID: &str = "opac";
const READER_SECRET: &str = "opac-secret";

fn temp_root(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "library-api-{}-{}-{}",
        label,
        std::process::id(),
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ))
}

async fn test_app(label: &str) -> Router {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = "integration-secret".to_string();
    config.auth.clients = vec![
        ClientCredential {
            client_id: WRITER_ID.to_string(),
            secret_hash: hash_secret(WRITER_SECRET).unwrap(),
            rights: Rights::Write,
        },
        ClientCredential {
            client_id: READER_ID.to_string(),
            secret_hash: hash_secret(READER_SECRET).unwrap(),
            rights: Rights::Read,
        },
    ];
    config.storage = StorageConfig {
        root_path: temp_root(label).to_string_lossy().into_owned(),
        static_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/static").to_string(),
        public_url: "http://books.test".to_string(),
        ..StorageConfig::default()
    };

    let services = Services::new(Repository::in_memory(), &config)
        .await
        .expect("services");
    api::create_router(AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    })
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn token(app: &Router, client_id: &str, secret: &str) -> String {
    let (status, body) = send(
        app,
        json_request(
            Method::POST,
            "/api/v1/auth/token",
            None,
            json!({ "client_id": client_id, "client_secret": secret }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    body["token"].as_str().expect("token").to_string()
}

async fn create_category(app: &Router, token: &str, code: &str) {
    let (status, _) = send(
        app,
        json_request(
            Method::POST,
            "/api/v1/categories",
            Some(token),
            json!({ "code": code, "name": format!("Category {}", code) }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

async fn create_book(app: &Router, token: &str, body: Value) -> (StatusCode, Value) {
    send(app, json_request(Method::POST, "/api/v1/books", Some(token), body)).await
}

#[tokio::test]
async fn test_health_check() {
    let app = test_app("health").await;

    let (status, body) = send(&app, get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, get("/api/v1/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_token_rejects_bad_secret() {
    let app = test_app("bad-secret").await;

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/auth/token",
            None,
            json!({ "client_id": WRITER_ID, "client_secret": "wrong" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 2);
}

#[tokio::test]
async fn test_write_requires_token_and_rights() {
    let app = test_app("rights").await;
    let book = json!({ "code": "BK-1", "title": "Dune" });

    let (status, _) = send(
        &app,
        json_request(Method::POST, "/api/v1/books", None, book.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let reader = token(&app, READER_ID, READER_SECRET).await;
    let (status, _) = create_book(&app, &reader, book.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = create_book(&app, "not-a-token", book).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_and_get_book() {
    let app = test_app("create").await;
    let writer = token(&app, WRITER_ID, WRITER_SECRET).await;
    create_category(&app, &writer, "SF").await;

    let (status, body) = create_book(
        &app,
        &writer,
        json!({
            "code": "BK-1",
            "title": "Dune",
            "author": "Frank Herbert",
            "total_stock": 3,
            "category_code": ["SF"]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["stock"], 3);
    assert_eq!(body["categories"][0]["code"], "SF");
    assert_eq!(
        body["cover_image_url"],
        "http://books.test/static/no_image.jpg"
    );

    let (status, body) = send(&app, get("/api/v1/books/BK-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Dune");

    let (status, body) = send(&app, get("/api/v1/books/NOPE")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 4);
}

#[tokio::test]
async fn test_create_book_conflicts() {
    let app = test_app("conflicts").await;
    let writer = token(&app, WRITER_ID, WRITER_SECRET).await;

    let (status, _) = create_book(&app, &writer, json!({ "code": "BK-1", "title": "Dune" })).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) =
        create_book(&app, &writer, json!({ "code": "BK-1", "title": "Dune again" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 6);

    let (status, body) = create_book(
        &app,
        &writer,
        json!({ "code": "BK-2", "title": "Solaris", "category_code": ["MISSING"] }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].as_str().unwrap().contains("MISSING"));

    // Failed creation leaves nothing behind
    let (status, _) = send(&app, get("/api/v1/books/BK-2")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = create_book(&app, &writer, json!({ "code": "BK-3", "title": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_validate_and_lookup_codes() {
    let app = test_app("validate").await;
    let writer = token(&app, WRITER_ID, WRITER_SECRET).await;
    for code in ["A", "B"] {
        let (status, _) = create_book(&app, &writer, json!({ "code": code, "title": code })).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/books/validate",
            None,
            json!({ "codes": ["A", "B", "C"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Book not found: C");

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/books/lookup",
            None,
            json!({ "codes": ["A", "B", "C"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_borrow_and_adjust_stock() {
    let app = test_app("stock").await;
    let writer = token(&app, WRITER_ID, WRITER_SECRET).await;
    let (status, _) = create_book(
        &app,
        &writer,
        json!({ "code": "BK-1", "title": "Dune", "total_stock": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let borrow = || {
        json_request(
            Method::POST,
            "/api/v1/books/BK-1/borrow",
            Some(&writer),
            Value::Null,
        )
    };

    let (status, body) = send(&app, borrow()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stock"], 0);

    let (status, body) = send(&app, borrow()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], 10);

    let stock = |action: &str, quantity: i32| {
        json_request(
            Method::PATCH,
            "/api/v1/books/BK-1/stock",
            Some(&writer),
            json!({ "action": action, "quantity": quantity }),
        )
    };

    let (status, body) = send(&app, stock("add", 5)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stock"], 5);

    let (status, body) = send(&app, stock("subtract", 2)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stock"], 3);

    let (status, _) = send(&app, stock("subtract", 4)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(&app, stock("set", 7)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stock"], 7);

    let (status, _) = send(&app, stock("set", -1)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_and_remove_categories() {
    let app = test_app("update").await;
    let writer = token(&app, WRITER_ID, WRITER_SECRET).await;
    create_category(&app, &writer, "SF").await;
    create_category(&app, &writer, "CLASSIC").await;
    let (status, _) = create_book(
        &app,
        &writer,
        json!({ "code": "BK-1", "title": "Dune", "category_code": ["SF"] }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        json_request(
            Method::PUT,
            "/api/v1/books/BK-1",
            Some(&writer),
            json!({ "title": "Dune Messiah", "category_code": ["CLASSIC"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Dune Messiah");
    assert_eq!(body["categories"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["categories"][0]["code"], "CLASSIC");

    let (status, body) = send(
        &app,
        json_request(
            Method::DELETE,
            "/api/v1/books/BK-1/categories",
            Some(&writer),
            Value::Null,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["categories"], json!([]));

    let (status, body) = send(&app, get("/api/v1/categories/CLASSIC/books")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);

    let (status, _) = send(&app, get("/api/v1/categories/UNKNOWN/books")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pagination_and_search() {
    let app = test_app("pages").await;
    let writer = token(&app, WRITER_ID, WRITER_SECRET).await;
    for (code, title) in [
        ("B1", "The Hobbit"),
        ("B2", "Dune"),
        ("B3", "The Silmarillion"),
        ("B4", "Solaris"),
        ("B5", "Hobbit Tales"),
    ] {
        let (status, _) = create_book(&app, &writer, json!({ "code": code, "title": title })).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(&app, get("/api/v1/books?page=1&size=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 5);
    assert_eq!(body["total_pages"], 3);
    assert_eq!(body["page"], 1);
    assert_eq!(body["items"].as_array().map(Vec::len), Some(2));

    let (status, body) = send(&app, get("/api/v1/books/search?q=%20HOBBIT%20")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    let (status, _) = send(&app, get("/api/v1/books?size=0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_cover() {
    let app = test_app("cover").await;
    let writer = token(&app, WRITER_ID, WRITER_SECRET).await;
    let (status, _) = create_book(&app, &writer, json!({ "code": "BK-1", "title": "Dune" })).await;
    assert_eq!(status, StatusCode::CREATED);

    let boundary = "X-LIBRARY-BOUNDARY";
    let multipart = |field: &str| {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"cover.png\"\r\n\
             Content-Type: image/png\r\n\r\nPNGDATA\r\n--{b}--\r\n",
            b = boundary,
            f = field
        );
        Request::builder()
            .method(Method::POST)
            .uri("/api/v1/books/BK-1/cover")
            .header(header::AUTHORIZATION, format!("Bearer {}", writer))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap()
    };

    let (status, body) = send(&app, multipart("file")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cover_image"], "/BK-1.png");
    assert_eq!(body["cover_image_url"], "http://books.test/images/BK-1.png");

    let response = app
        .clone()
        .oneshot(get("/images/BK-1.png"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"PNGDATA");

    let (status, _) = send(&app, multipart("other")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_placeholder_cover_is_served() {
    let app = test_app("placeholder").await;
    let writer = token(&app, WRITER_ID, WRITER_SECRET).await;
    let (status, body) = create_book(&app, &writer, json!({ "code": "BK-1", "title": "Dune" })).await;
    assert_eq!(status, StatusCode::CREATED);

    let url = body["cover_image_url"].as_str().expect("cover url").to_string();
    let path = url.strip_prefix("http://books.test").expect("public url prefix");
    assert_eq!(path, "/static/no_image.jpg");

    let response = app.clone().oneshot(get(path)).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        Some("image/jpeg")
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..2], &[0xff, 0xd8]);
}

#[tokio::test]
async fn test_delete_category_and_book() {
    let app = test_app("delete").await;
    let writer = token(&app, WRITER_ID, WRITER_SECRET).await;
    create_category(&app, &writer, "SF").await;
    let (status, _) = create_book(
        &app,
        &writer,
        json!({ "code": "BK-1", "title": "Dune", "category_code": ["SF"] }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let delete = |uri: &str| json_request(Method::DELETE, uri, Some(&writer), Value::Null);

    let (status, _) = send(&app, delete("/api/v1/categories/SF")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, get("/api/v1/books/BK-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["categories"], json!([]));

    let (status, _) = send(&app, delete("/api/v1/books/BK-1")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, delete("/api/v1/books/BK-1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

mod live {
    use reqwest::Client;
    use serde_json::{json, Value};

    const BASE_URL: &str = "http://localhost:8080/api/v1";

    #[tokio::test]
    #[ignore] // Run with: cargo test -- --ignored
    async fn test_health_check() {
        let client = Client::new();

        let response = client
            .get(format!("{}/health", BASE_URL))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());

        let body: Value = response.json().await.expect("Failed to parse response");
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    #[ignore]
    async fn test_list_books() {
        let client = Client::new();

        let response = client
            .get(format!("{}/books?page=0&size=5", BASE_URL))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());

        let body: Value = response.json().await.expect("Failed to parse response");
        assert!(body["items"].is_array());
        assert!(body["total"].is_number());
    }

    #[tokio::test]
    #[ignore]
    async fn test_token_with_unknown_client() {
        let client = Client::new();

        let response = client
            .post(format!("{}/auth/token", BASE_URL))
            .json(&json!({ "client_id": "nobody", "client_secret": "nothing" }))
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(response.status().as_u16(), 401);
    }
}
