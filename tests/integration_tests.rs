use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use linkgate::config::Config;
use linkgate::counter::MemoryCounterStore;
use linkgate::handlers::AppState;
use linkgate::keys;
use linkgate::rate_gate::RateGate;
use linkgate::registry::Registry;
use linkgate::server::create_app;
use linkgate::store::{LinkRecord, MemoryLinkStore};

fn test_config() -> Config {
    Config {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        store_url: "https://store.test".to_string(),
        store_hidden_path: "links".to_string(),
        hash_salt: "test-salt".to_string(),
        admin_key: "test-admin-key".to_string(),
        redis_url: String::new(),
        rate_limit_interval_secs: 1,
        max_daily_writes: 20,
        window_purge_days: 1,
        store_timeout_ms: 6000,
        store_entries_limit: 50,
        short_key_length: 14,
        max_url_length: 100,
        log_level: "info".to_string(),
    }
}

fn test_app(config: Config, store: Arc<MemoryLinkStore>) -> Router {
    let rate_gate = RateGate::new(
        Arc::new(MemoryCounterStore::new()),
        config.rate_limit_interval(),
        config.max_daily_writes,
        config.quota_window(),
    );
    let registry = Registry::new(store, config.store_entries_limit);
    create_app(AppState {
        config: Arc::new(config),
        registry,
        rate_gate,
    })
}

fn get(path: &str, ip: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(path)
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .unwrap()
}

fn post_url(body: &Value, ip: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/post-url")
        .header(header::HOST, "s.test")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", ip)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn admin(method: &str, path: &str, ip: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_missing_credentials_fail_closed() {
    let mut config = test_config();
    config.hash_salt = String::new();
    let app = test_app(config, Arc::new(MemoryLinkStore::new()));

    let response = app.oneshot(get("/urls?apiKey=test-admin-key", "1.1.1.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_preflight_bypasses_admission() {
    let mut config = test_config();
    config.hash_salt = String::new();
    let app = test_app(config, Arc::new(MemoryLinkStore::new()));

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/post-url")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(response
        .headers()
        .contains_key("access-control-allow-methods"));
}

#[tokio::test]
async fn test_post_verify_redirect_flow() {
    let app = test_app(test_config(), Arc::new(MemoryLinkStore::new()));

    let response = app
        .clone()
        .oneshot(post_url(&json!({"long_url": "https://example.com/page"}), "10.0.0.1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let link = body["link"].as_str().unwrap().to_string();
    let key = link.split("/url/").nth(1).unwrap().to_string();
    assert_eq!(key, keys::derive_key("https://example.com/page", 14));

    // Unverified links answer with a temporary redirect.
    let response = app
        .clone()
        .oneshot(get(&format!("/url/{}", key), "10.0.0.2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[header::LOCATION],
        "https://example.com/page"
    );

    let response = app
        .clone()
        .oneshot(admin(
            "PATCH",
            &format!("/verify/{}?apiKey=test-admin-key", key),
            "10.0.0.3",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["success"].is_string());

    // A second verification is an idempotent no-op.
    let response = app
        .clone()
        .oneshot(admin(
            "PATCH",
            &format!("/verify/{}?apiKey=test-admin-key", key),
            "10.0.0.4",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["warning"].is_string());

    // Verified links become permanently cacheable.
    let response = app
        .oneshot(get(&format!("/url/{}", key), "10.0.0.5"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
}

#[tokio::test]
async fn test_dedup_returns_existing_link() {
    let app = test_app(test_config(), Arc::new(MemoryLinkStore::new()));
    let payload = json!({"long_url": "https://example.com/same"});

    let response = app
        .clone()
        .oneshot(post_url(&payload, "10.1.0.1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let first = body_json(response).await;

    let response = app.oneshot(post_url(&payload, "10.1.0.2")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let second = body_json(response).await;
    assert_eq!(first["link"], second["link"]);
}

#[tokio::test]
async fn test_collision_rejected_without_overwrite() {
    let store = Arc::new(MemoryLinkStore::new());
    let colliding_key = keys::derive_key("https://example.com/a", 14);
    use linkgate::store::LinkStore;
    store
        .put(
            &colliding_key,
            &LinkRecord::new("https://other.example.com/".to_string()),
        )
        .await
        .unwrap();

    let app = test_app(test_config(), store.clone());
    let response = app
        .oneshot(post_url(&json!({"long_url": "https://example.com/a"}), "10.2.0.1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("collision"));

    let kept = store.get(&colliding_key).await.unwrap().unwrap();
    assert_eq!(kept.long_url, "https://other.example.com/");
}

#[tokio::test]
async fn test_capacity_gate() {
    let store = Arc::new(MemoryLinkStore::new());
    use linkgate::store::LinkStore;
    for i in 0..50 {
        let url = format!("https://example.com/{}", i);
        store
            .put(&keys::derive_key(&url, 14), &LinkRecord::new(url))
            .await
            .unwrap();
    }

    let app = test_app(test_config(), store.clone());
    let response = app
        .oneshot(post_url(&json!({"long_url": "https://example.com/one-more"}), "10.3.0.1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INSUFFICIENT_STORAGE);
    assert_eq!(store.get_all().await.unwrap().len(), 50);
}

#[tokio::test]
async fn test_store_write_outage_answers_500() {
    use async_trait::async_trait;
    use linkgate::error::ApiError;
    use linkgate::store::LinkStore;
    use std::collections::HashMap;

    // Reads succeed (empty registry), writes never land.
    struct WriteDeadStore;

    #[async_trait]
    impl LinkStore for WriteDeadStore {
        async fn get(&self, _key: &str) -> Result<Option<LinkRecord>, ApiError> {
            Ok(None)
        }

        async fn get_all(&self) -> Result<HashMap<String, LinkRecord>, ApiError> {
            Ok(HashMap::new())
        }

        async fn put(&self, _key: &str, _record: &LinkRecord) -> Result<LinkRecord, ApiError> {
            Err(ApiError::Upstream("store unreachable".to_string()))
        }

        async fn set_verified(&self, _key: &str) -> Result<(), ApiError> {
            Err(ApiError::Upstream("store unreachable".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<(), ApiError> {
            Err(ApiError::Upstream("store unreachable".to_string()))
        }
    }

    let config = test_config();
    let rate_gate = RateGate::new(
        Arc::new(MemoryCounterStore::new()),
        config.rate_limit_interval(),
        config.max_daily_writes,
        config.quota_window(),
    );
    let registry = Registry::new(Arc::new(WriteDeadStore), config.store_entries_limit);
    let app = create_app(AppState {
        config: Arc::new(config),
        registry,
        rate_gate,
    });

    let response = app
        .oneshot(post_url(&json!({"long_url": "https://example.com/x"}), "10.10.0.1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("upstream"));
}

#[tokio::test]
async fn test_daily_quota_blocks_third_write() {
    let mut config = test_config();
    config.max_daily_writes = 2;
    let app = test_app(config, Arc::new(MemoryLinkStore::new()));

    // Same identity throughout; space the requests past the interval
    // throttle so only the quota is under test.
    for i in 0..3 {
        if i > 0 {
            tokio::time::sleep(Duration::from_millis(1_050)).await;
        }
        let payload = json!({"long_url": format!("https://example.com/q{}", i)});
        let response = app
            .clone()
            .oneshot(post_url(&payload, "10.4.0.1"))
            .await
            .unwrap();
        if i < 2 {
            assert_eq!(response.status(), StatusCode::CREATED);
        } else {
            assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
            let body = body_json(response).await;
            assert!(body["warning"].is_string());
        }
    }
}

#[tokio::test]
async fn test_interval_throttle_blocks_burst() {
    let app = test_app(test_config(), Arc::new(MemoryLinkStore::new()));

    let response = app
        .clone()
        .oneshot(get("/url/abcdef", "10.5.0.1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(get("/url/abcdef", "10.5.0.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_admin_key_required() {
    let app = test_app(test_config(), Arc::new(MemoryLinkStore::new()));

    let response = app
        .clone()
        .oneshot(get("/urls?apiKey=wrong", "10.6.0.1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(get("/urls", "10.6.0.2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Correct key on an empty registry explains itself with a 200.
    let response = app
        .oneshot(get("/urls?apiKey=test-admin-key", "10.6.0.3"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["success"].is_string());
}

#[tokio::test]
async fn test_post_body_validation() {
    let app = test_app(test_config(), Arc::new(MemoryLinkStore::new()));

    let cases = vec![
        json!({}),
        json!({"long_url": "https://example.com", "extra": true}),
        json!({"long_url": "not a url"}),
        json!({"long_url": "https://localhost/x"}),
        json!({"long_url": format!("https://example.com/{}", "a".repeat(120))}),
    ];

    for (i, payload) in cases.into_iter().enumerate() {
        let ip = format!("10.7.0.{}", i + 1);
        let response = app
            .clone()
            .oneshot(post_url(&payload, &ip))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "case {}", i);
    }
}

#[tokio::test]
async fn test_malformed_id_and_unknown_endpoint() {
    let app = test_app(test_config(), Arc::new(MemoryLinkStore::new()));

    let response = app
        .clone()
        .oneshot(get("/url/ab", "10.8.0.1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.oneshot(get("/nowhere", "10.8.0.2")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_then_delete_again() {
    let store = Arc::new(MemoryLinkStore::new());
    use linkgate::store::LinkStore;
    let key = keys::derive_key("https://example.com/doomed", 14);
    store
        .put(&key, &LinkRecord::new("https://example.com/doomed".to_string()))
        .await
        .unwrap();

    let app = test_app(test_config(), store);

    let response = app
        .clone()
        .oneshot(admin(
            "DELETE",
            &format!("/delete/{}?apiKey=test-admin-key", key),
            "10.9.0.1",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(admin(
            "DELETE",
            &format!("/delete/{}?apiKey=test-admin-key", key),
            "10.9.0.2",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
