//! End-to-end routing through the gate middleware and the breaker.

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use search_gate::admin::{setup_admin_router, AdminState};
use search_gate::config::CircuitBreakerConfig;
use search_gate::http::X_REQUEST_ID;
use search_gate::{CircuitBreaker, CircuitState};

mod common;
use common::{json_body, test_app, LimiterMode, GOOD_TOKEN};

fn search_request(query: &str, token: Option<&str>) -> Request<Body> {
    let uri = match token {
        Some(t) => format!("/search?q={query}&token={t}"),
        None => format!("/search?q={query}"),
    };
    Request::get(uri).body(Body::empty()).unwrap()
}

fn inference_request(model: &str) -> Request<Body> {
    Request::post("/inference")
        .header(header::AUTHORIZATION, format!("Bearer {GOOD_TOKEN}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({ "model": model, "messages": [] }).to_string(),
        ))
        .unwrap()
}

#[tokio::test]
async fn test_health_is_open_and_tagged() {
    let app = test_app(CircuitBreaker::default());
    let resp = app
        .router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key(X_REQUEST_ID));
    assert_eq!(app.verifier.calls(), 0);
}

#[tokio::test]
async fn test_missing_token_rejected_before_upstream() {
    let app = test_app(CircuitBreaker::default());
    let resp = app.router.oneshot(search_request("rust", None)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(resp).await,
        serde_json::json!({
            "isAuthorized": false,
            "statusCode": 400,
            "error": "Missing token."
        })
    );
    assert_eq!(app.search.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_token_rejected() {
    let app = test_app(CircuitBreaker::default());
    let resp = app
        .router
        .oneshot(search_request("rust", Some("bad")))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["error"], "Invalid token.");
}

#[tokio::test]
async fn test_authorized_search() {
    let app = test_app(CircuitBreaker::default());
    let resp = app
        .router
        .clone()
        .oneshot(search_request("rust", Some(GOOD_TOKEN)))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["query"], "rust");
    assert_eq!(body["results"][0]["title"], "About rust");

    let resp = app
        .router
        .oneshot(search_request("tokio", Some(GOOD_TOKEN)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(app.verifier.calls(), 1);
}

#[tokio::test]
async fn test_empty_query_is_bad_request() {
    let app = test_app(CircuitBreaker::default());
    let resp = app
        .router
        .oneshot(search_request("", Some(GOOD_TOKEN)))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["error"], "Missing query.");
}

#[tokio::test]
async fn test_rate_limited() {
    let app = test_app(CircuitBreaker::default());
    app.limiter.set(LimiterMode::Exceeded);

    let resp = app
        .router
        .oneshot(search_request("rust", Some(GOOD_TOKEN)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json_body(resp).await["error"], "Too many requests.");
}

#[tokio::test]
async fn test_gate_fault_is_internal_error() {
    let app = test_app(CircuitBreaker::default());
    app.limiter.set(LimiterMode::Broken);

    let resp = app
        .router
        .oneshot(search_request("rust", Some(GOOD_TOKEN)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(resp).await["error"], "Access check failed.");
}

#[tokio::test]
async fn test_upstream_failures_open_search_circuit() {
    let app = test_app(CircuitBreaker::new(CircuitBreakerConfig {
        failure_threshold: 2,
        reset_timeout_ms: 60_000,
        success_threshold: 1,
    }));
    app.search.failing.store(true, Ordering::SeqCst);

    for _ in 0..2 {
        let resp = app
            .router
            .clone()
            .oneshot(search_request("rust", Some(GOOD_TOKEN)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
    assert_eq!(app.state.breaker.get_state("search"), CircuitState::Open);

    let resp = app
        .router
        .oneshot(search_request("rust", Some(GOOD_TOKEN)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(resp.headers()[header::RETRY_AFTER], "60");
    assert_eq!(
        json_body(resp).await["error"],
        "Service temporarily unavailable."
    );
    assert_eq!(app.search.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_inference_circuits_are_per_model() {
    let app = test_app(CircuitBreaker::new(CircuitBreakerConfig {
        failure_threshold: 1,
        reset_timeout_ms: 60_000,
        success_threshold: 1,
    }));

    // A hung upstream hits the deadline and counts as a failure.
    app.inference.slow.store(true, Ordering::SeqCst);
    let resp = app
        .router
        .clone()
        .oneshot(inference_request("model-a"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(app.state.breaker.get_state("model-a"), CircuitState::Open);

    app.inference.slow.store(false, Ordering::SeqCst);
    let resp = app
        .router
        .clone()
        .oneshot(inference_request("model-b"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["model"], "model-b");

    let resp = app
        .router
        .oneshot(inference_request("model-a"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_client_rejections_do_not_open_the_circuit() {
    let app = test_app(CircuitBreaker::new(CircuitBreakerConfig {
        failure_threshold: 1,
        reset_timeout_ms: 60_000,
        success_threshold: 1,
    }));
    app.inference.rejecting.store(true, Ordering::SeqCst);

    for _ in 0..5 {
        let resp = app
            .router
            .clone()
            .oneshot(inference_request("llama"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(resp).await["error"]["message"],
            "messages is required"
        );
    }
    assert_eq!(app.state.breaker.get_state("llama"), CircuitState::Closed);

    app.inference.rejecting.store(false, Ordering::SeqCst);
    let resp = app
        .router
        .oneshot(inference_request("llama"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_arbitrary_model_names_leave_no_circuits_behind() {
    let app = test_app(CircuitBreaker::default());
    app.inference.rejecting.store(true, Ordering::SeqCst);

    for i in 0..200 {
        let resp = app
            .router
            .clone()
            .oneshot(inference_request(&format!("junk-{i}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    app.inference.rejecting.store(false, Ordering::SeqCst);
    for i in 0..200 {
        let resp = app
            .router
            .clone()
            .oneshot(inference_request(&format!("other-{i}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    assert!(app.state.breaker.is_empty());
}

#[tokio::test]
async fn test_configured_models_reject_unknown_names() {
    let mut app = test_app(CircuitBreaker::default());
    app.state.models = Arc::new(HashSet::from(["llama".to_string()]));
    let router = search_gate::http::build_router(app.state.clone(), Duration::from_secs(30));

    let resp = router
        .clone()
        .oneshot(inference_request("junk"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["error"], "Unknown model.");
    assert_eq!(app.inference.calls.load(Ordering::SeqCst), 0);

    let resp = router.oneshot(inference_request(" llama ")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_trimmed_model_is_forwarded() {
    let app = test_app(CircuitBreaker::default());
    let resp = app
        .router
        .oneshot(inference_request("  llama \t"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        app.inference.last_model.lock().unwrap().as_deref(),
        Some("llama")
    );
}

#[tokio::test]
async fn test_gate_disabled_is_passthrough() {
    let mut app = test_app(CircuitBreaker::default());
    app.state.gate_enabled = false;
    let router = search_gate::http::build_router(app.state.clone(), Duration::from_secs(30));

    let resp = router.oneshot(search_request("rust", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(app.verifier.calls(), 0);
}

#[tokio::test]
async fn test_admin_requires_key_and_reports_circuits() {
    let app = test_app(CircuitBreaker::new(CircuitBreakerConfig {
        failure_threshold: 1,
        reset_timeout_ms: 60_000,
        success_threshold: 1,
    }));
    let _ = app
        .state
        .breaker
        .execute("search", || async { Err::<(), _>("down") })
        .await;
    let admin = setup_admin_router(AdminState::new("admin-key", &app.state));

    let resp = admin
        .clone()
        .oneshot(Request::get("/admin/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = admin
        .clone()
        .oneshot(
            Request::get("/admin/status")
                .header(header::AUTHORIZATION, "Bearer admin-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let status = json_body(resp).await;
    assert_eq!(status["status"], "degraded");
    assert_eq!(status["open_circuits"], 1);

    let resp = admin
        .clone()
        .oneshot(
            Request::get("/admin/circuits")
                .header(header::AUTHORIZATION, "Bearer admin-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let circuits = json_body(resp).await;
    assert_eq!(circuits[0]["key"], "search");
    assert_eq!(circuits[0]["state"], "OPEN");

    let resp = admin
        .oneshot(
            Request::post("/admin/circuits/search/reset")
                .header(header::AUTHORIZATION, "Bearer admin-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.state.breaker.get_state("search"), CircuitState::Closed);
}

#[tokio::test]
async fn test_admin_status_separates_open_and_half_open() {
    let app = test_app(CircuitBreaker::new(CircuitBreakerConfig {
        failure_threshold: 1,
        reset_timeout_ms: 100,
        success_threshold: 1,
    }));
    let _ = app
        .state
        .breaker
        .execute("older", || async { Err::<(), _>("down") })
        .await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    let _ = app
        .state
        .breaker
        .execute("newer", || async { Err::<(), _>("down") })
        .await;

    let admin = setup_admin_router(AdminState::new("admin-key", &app.state));
    let resp = admin
        .oneshot(
            Request::get("/admin/status")
                .header(header::AUTHORIZATION, "Bearer admin-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = json_body(resp).await;

    assert_eq!(status["tracked_circuits"], 2);
    assert_eq!(status["open_circuits"], 1);
    assert_eq!(status["half_open_circuits"], 1);
    assert_eq!(status["status"], "degraded");
}
