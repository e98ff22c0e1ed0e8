//! Upstream services behind the gate.
//!
//! # Data Flow
//! ```text
//! Admitted request
//!     → handler picks a circuit key ("search" or the model name)
//!     → CircuitBreaker::execute(key, with_deadline(upstream call))
//!         → search.rs (SearXNG-compatible JSON search)
//!         → inference.rs (OpenAI-compatible chat completions)
//! ```
//!
//! # Design Decisions
//! - Providers are traits so handlers and tests can swap implementations
//! - Providers never retry; the breaker and the client decide what's next
//! - Only transport errors, timeouts, 5xx, 408 and 429 count against a
//!   circuit. Other 4xx answers are the caller's fault and are relayed.

pub mod inference;
pub mod search;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::error::Elapsed;

pub use inference::{HttpInferenceBackend, InferenceRequest};
pub use search::{HttpSearchProvider, SearchResult};

/// Errors from an upstream call.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("upstream timed out")]
    Timeout(#[from] Elapsed),

    #[error("upstream rejected the request with status {}", .0.status)]
    Rejected(ClientRejection),
}

/// A 4xx answer caused by the request itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRejection {
    pub status: u16,
    /// Upstream response body, relayed as-is.
    pub body: String,
}

/// Move client rejections out of the error channel, so a breaker wrapping
/// the call records them as successes.
pub fn relay_rejections<T>(
    result: Result<T, UpstreamError>,
) -> Result<Result<T, ClientRejection>, UpstreamError> {
    match result {
        Ok(value) => Ok(Ok(value)),
        Err(UpstreamError::Rejected(rejection)) => Ok(Err(rejection)),
        Err(e) => Err(e),
    }
}

/// Pass through a successful response and classify everything else.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if is_client_fault(status) {
        let body = response.text().await.unwrap_or_default();
        return Err(UpstreamError::Rejected(ClientRejection {
            status: status.as_u16(),
            body,
        }));
    }
    Err(UpstreamError::Status(status.as_u16()))
}

fn is_client_fault(status: StatusCode) -> bool {
    status.is_client_error()
        && status != StatusCode::REQUEST_TIMEOUT
        && status != StatusCode::TOO_MANY_REQUESTS
}

/// Web search collaborator.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, UpstreamError>;
}

/// AI inference collaborator.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn complete(&self, request: &InferenceRequest)
        -> Result<serde_json::Value, UpstreamError>;
}

/// Search response returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
}
