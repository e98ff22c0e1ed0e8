//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, access gate)
//! - Own the process-wide gate, limiter and circuit breaker
//! - Serve until the shutdown coordinator fires

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GateConfig;
use crate::http::handlers;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::shutdown;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::security::access_gate::AccessGate;
use crate::security::middleware::access_gate_middleware;
use crate::security::rate_limit::FixedWindowLimiter;
use crate::security::token::Argon2Verifier;
use crate::upstream::{HttpInferenceBackend, HttpSearchProvider, InferenceBackend, SearchProvider};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AccessGate>,
    /// When false, protected routes are open.
    pub gate_enabled: bool,
    pub breaker: Arc<CircuitBreaker>,
    pub search: Arc<dyn SearchProvider>,
    pub inference: Arc<dyn InferenceBackend>,
    /// Accepted inference models; empty accepts any.
    pub models: Arc<HashSet<String>>,
    pub upstream_timeout: Duration,
}

/// HTTP server for the search gate.
pub struct HttpServer {
    router: Router,
    state: AppState,
    limiter: Arc<FixedWindowLimiter>,
}

impl HttpServer {
    /// Create a server with HTTP upstreams from `config`.
    pub fn new(config: GateConfig) -> Self {
        let client = reqwest::Client::new();
        let search = Arc::new(HttpSearchProvider::new(
            client.clone(),
            &config.upstream.search_url,
        ));
        let inference = Arc::new(HttpInferenceBackend::new(client, &config.upstream));
        Self::with_upstreams(config, search, inference)
    }

    /// Create a server with caller-supplied upstreams.
    pub fn with_upstreams(
        config: GateConfig,
        search: Arc<dyn SearchProvider>,
        inference: Arc<dyn InferenceBackend>,
    ) -> Self {
        let limiter = Arc::new(FixedWindowLimiter::from_config(&config.rate_limit));
        let gate = Arc::new(AccessGate::new(
            Arc::new(Argon2Verifier),
            limiter.clone(),
            config.access.token_hash.clone(),
        ));

        let state = AppState {
            gate,
            gate_enabled: config.access.enabled,
            breaker: Arc::new(CircuitBreaker::new(config.circuit_breaker)),
            search,
            inference,
            models: Arc::new(
                config
                    .upstream
                    .models
                    .iter()
                    .map(|m| m.trim().to_string())
                    .collect(),
            ),
            upstream_timeout: Duration::from_secs(config.upstream.timeout_secs),
        };

        let router = build_router(
            state.clone(),
            Duration::from_secs(config.timeouts.request_secs),
        );
        Self {
            router,
            state,
            limiter,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let limiter = self.limiter.clone();
        let purge_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            limiter.run_purge(purge_shutdown).await;
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let protected = Router::new()
        .route("/search", get(handlers::search))
        .route("/inference", post(handlers::inference))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            access_gate_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(protected)
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(set_request_id_layer())
}
