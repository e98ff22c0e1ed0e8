//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Request to a protected route:
//!     → middleware.rs (extract token from query or bearer header)
//!     → access_gate.rs (missing? cached? verify, then consume quota)
//!         → token.rs (Argon2 verification on cache miss)
//!         → rate_limit.rs (fixed window per token)
//!     → Pass to handler
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any admission check failure
//! - Expensive verification happens once per token per process
//! - Collaborator faults are 500s, never "invalid token"

pub mod access_gate;
pub mod middleware;
pub mod rate_limit;
pub mod token;

pub use access_gate::{AccessGate, AuthorizationResult, GateError, Rejection};
pub use rate_limit::{FixedWindowLimiter, RateLimitError, RateLimiter};
pub use token::{hash_token, Argon2Verifier, TokenVerifier, VerifyError};
