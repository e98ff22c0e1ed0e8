//! Search Gate Library
//!
//! Request admission (token verification + per-token rate limiting) and
//! per-key circuit breaking in front of search and AI inference upstreams.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;
pub mod upstream;

pub use config::GateConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use resilience::{CircuitBreaker, CircuitBreakerError, CircuitState};
pub use security::{AccessGate, AuthorizationResult, Rejection};
