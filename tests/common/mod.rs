//! Shared stubs and builders for integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;

use search_gate::http::{build_router, AppState};
use search_gate::security::{
    AccessGate, RateLimitError, RateLimiter, TokenVerifier, VerifyError,
};
use search_gate::upstream::{
    ClientRejection, InferenceBackend, InferenceRequest, SearchProvider, SearchResult,
    UpstreamError,
};
use search_gate::CircuitBreaker;

pub const GOOD_TOKEN: &str = "good-token";

/// Accepts exactly one token and counts every verification.
#[derive(Default)]
pub struct CountingVerifier {
    pub calls: AtomicU32,
    pub broken: AtomicBool,
}

impl CountingVerifier {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenVerifier for CountingVerifier {
    async fn verify(&self, token: &str, _expected_hash: &str) -> Result<bool, VerifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.broken.load(Ordering::SeqCst) {
            return Err(VerifyError::MalformedHash("stub failure".into()));
        }
        Ok(token == GOOD_TOKEN)
    }
}

/// What [`StubLimiter`] answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimiterMode {
    Allow,
    Exceeded,
    Broken,
}

/// Rate limiter with a switchable answer and a call counter.
pub struct StubLimiter {
    pub mode: Mutex<LimiterMode>,
    pub calls: AtomicU32,
}

impl StubLimiter {
    pub fn new(mode: LimiterMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            calls: AtomicU32::new(0),
        }
    }

    pub fn set(&self, mode: LimiterMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateLimiter for StubLimiter {
    async fn consume(&self, _key: &str) -> Result<(), RateLimitError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mode = *self.mode.lock().unwrap();
        match mode {
            LimiterMode::Allow => Ok(()),
            LimiterMode::Exceeded => Err(RateLimitError::LimitExceeded {
                retry_after: Duration::from_secs(5),
            }),
            LimiterMode::Broken => Err(RateLimitError::Backend("store offline".into())),
        }
    }
}

/// Search upstream that fails on demand.
#[derive(Default)]
pub struct StubSearch {
    pub calls: AtomicU32,
    pub failing: AtomicBool,
}

#[async_trait]
impl SearchProvider for StubSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(UpstreamError::Status(500));
        }
        Ok(vec![SearchResult {
            title: format!("About {query}"),
            url: "https://example.com".into(),
            content: String::new(),
        }])
    }
}

/// Inference upstream that echoes the model. Hangs when `slow`, answers
/// 400 when `rejecting`.
#[derive(Default)]
pub struct StubInference {
    pub calls: AtomicU32,
    pub slow: AtomicBool,
    pub rejecting: AtomicBool,
    pub last_model: Mutex<Option<String>>,
}

#[async_trait]
impl InferenceBackend for StubInference {
    async fn complete(
        &self,
        request: &InferenceRequest,
    ) -> Result<serde_json::Value, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_model.lock().unwrap() = Some(request.model.clone());
        if self.slow.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(UpstreamError::Rejected(ClientRejection {
                status: 400,
                body: r#"{"error":{"message":"messages is required"}}"#.into(),
            }));
        }
        Ok(serde_json::json!({ "model": request.model, "choices": [] }))
    }
}

/// Everything a router test needs to poke at.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub verifier: Arc<CountingVerifier>,
    pub limiter: Arc<StubLimiter>,
    pub search: Arc<StubSearch>,
    pub inference: Arc<StubInference>,
}

pub fn test_app(breaker: CircuitBreaker) -> TestApp {
    let verifier = Arc::new(CountingVerifier::default());
    let limiter = Arc::new(StubLimiter::new(LimiterMode::Allow));
    let search = Arc::new(StubSearch::default());
    let inference = Arc::new(StubInference::default());

    let state = AppState {
        gate: Arc::new(AccessGate::new(verifier.clone(), limiter.clone(), "$stub$hash")),
        gate_enabled: true,
        breaker: Arc::new(breaker),
        search: search.clone(),
        inference: inference.clone(),
        models: Arc::new(HashSet::new()),
        upstream_timeout: Duration::from_millis(200),
    };

    TestApp {
        router: build_router(state.clone(), Duration::from_secs(30)),
        state,
        verifier,
        limiter,
        search,
        inference,
    }
}

pub async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
