//! Token verification and rate limiting for protected endpoints.
//!
//! # Decision Sequence
//! ```text
//! token absent/empty            → 400 "Missing token."
//! token in verified cache       → skip hash verification
//! otherwise verify against hash → 401 "Invalid token." on mismatch,
//!                                 cache the token on match
//! consume one unit of quota     → 429 "Too many requests." when spent
//! ```
//!
//! Verifier and limiter faults are returned as [`GateError`], never as an
//! invalid-token rejection.

use std::sync::Arc;

use axum::http::StatusCode;
use dashmap::DashSet;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use thiserror::Error;

use crate::observability::metrics;
use crate::security::rate_limit::{RateLimitError, RateLimiter};
use crate::security::token::{fingerprint, TokenVerifier, VerifyError};

/// Why a request was refused admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingToken,
    InvalidToken,
    RateLimited,
}

impl Rejection {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Rejection::MissingToken => StatusCode::BAD_REQUEST,
            Rejection::InvalidToken => StatusCode::UNAUTHORIZED,
            Rejection::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Rejection::MissingToken => "Missing token.",
            Rejection::InvalidToken => "Invalid token.",
            Rejection::RateLimited => "Too many requests.",
        }
    }

    /// Metric label.
    pub fn outcome(&self) -> &'static str {
        match self {
            Rejection::MissingToken => "missing_token",
            Rejection::InvalidToken => "invalid_token",
            Rejection::RateLimited => "rate_limited",
        }
    }
}

/// Admission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationResult {
    Authorized,
    Rejected(Rejection),
}

impl AuthorizationResult {
    pub fn is_authorized(&self) -> bool {
        matches!(self, AuthorizationResult::Authorized)
    }
}

impl Serialize for AuthorizationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AuthorizationResult::Authorized => {
                let mut s = serializer.serialize_struct("AuthorizationResult", 1)?;
                s.serialize_field("isAuthorized", &true)?;
                s.end()
            }
            AuthorizationResult::Rejected(rejection) => {
                let mut s = serializer.serialize_struct("AuthorizationResult", 3)?;
                s.serialize_field("isAuthorized", &false)?;
                s.serialize_field("statusCode", &rejection.status_code().as_u16())?;
                s.serialize_field("error", rejection.message())?;
                s.end()
            }
        }
    }
}

/// The gate could not reach a decision.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("token verification failed: {0}")]
    Verifier(#[from] VerifyError),

    #[error("rate limiter failed: {0}")]
    RateLimiter(String),
}

/// Admission check for protected endpoints.
pub struct AccessGate {
    verifier: Arc<dyn TokenVerifier>,
    limiter: Arc<dyn RateLimiter>,
    expected_hash: String,
    /// Tokens that already passed verification; kept for the process lifetime.
    verified: DashSet<String>,
}

impl AccessGate {
    pub fn new(
        verifier: Arc<dyn TokenVerifier>,
        limiter: Arc<dyn RateLimiter>,
        expected_hash: impl Into<String>,
    ) -> Self {
        Self {
            verifier,
            limiter,
            expected_hash: expected_hash.into(),
            verified: DashSet::new(),
        }
    }

    /// Decide whether a request carrying `token` may proceed.
    pub async fn verify_token_and_rate_limit(
        &self,
        token: Option<&str>,
    ) -> Result<AuthorizationResult, GateError> {
        let token = match token {
            Some(t) if !t.is_empty() => t,
            _ => return Ok(self.reject(Rejection::MissingToken)),
        };

        let cached = self.verified.contains(token);
        metrics::record_token_verification(cached);

        if !cached {
            if !self.verifier.verify(token, &self.expected_hash).await? {
                tracing::debug!(token = %fingerprint(token), "Token failed verification");
                return Ok(self.reject(Rejection::InvalidToken));
            }
            self.verified.insert(token.to_string());
            tracing::debug!(token = %fingerprint(token), "Token verified and cached");
        }

        match self.limiter.consume(token).await {
            Ok(()) => {
                metrics::record_admission("authorized");
                Ok(AuthorizationResult::Authorized)
            }
            Err(RateLimitError::LimitExceeded { retry_after }) => {
                tracing::warn!(token = %fingerprint(token), ?retry_after, "Rate limit exceeded");
                Ok(self.reject(Rejection::RateLimited))
            }
            Err(RateLimitError::Backend(e)) => Err(GateError::RateLimiter(e)),
        }
    }

    /// Whether `token` is in the verified cache.
    pub fn is_verified(&self, token: &str) -> bool {
        self.verified.contains(token)
    }

    /// Size of the verified-token cache.
    pub fn verified_count(&self) -> usize {
        self.verified.len()
    }

    fn reject(&self, rejection: Rejection) -> AuthorizationResult {
        metrics::record_admission(rejection.outcome());
        AuthorizationResult::Rejected(rejection)
    }
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate")
            .field("verified", &self.verified.len())
            .finish_non_exhaustive()
    }
}
