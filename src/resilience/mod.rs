//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to an upstream (search provider, inference backend):
//!     → circuit_breaker.rs (fail fast if the key's circuit is open)
//!     → timeouts.rs (enforce the upstream deadline)
//!     → outcome recorded against the key; errors handed back unchanged
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - No internal retries; callers decide how to degrade on an open circuit
//! - Circuit breaker prevents cascading failures

pub mod circuit_breaker;
pub mod timeouts;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerError, CircuitMetrics, CircuitSnapshot, CircuitState,
};
