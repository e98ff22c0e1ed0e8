//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placeholder admin key; validation rejects it when the admin API is on.
pub const ADMIN_KEY_PLACEHOLDER: &str = "CHANGE_ME_IN_PRODUCTION";

/// Root configuration for the search gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Circuit breaker thresholds shared by all upstream keys.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Token verification settings.
    pub access: AccessConfig,

    /// Per-token request quota.
    pub rate_limit: RateLimitConfig,

    /// Search and inference upstreams.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,

    /// Time an open circuit waits before allowing a trial call, in milliseconds.
    pub reset_timeout_ms: u64,

    /// Consecutive trial successes needed to close a half-open circuit.
    pub success_threshold: u32,
}

impl CircuitBreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
            success_threshold: 3,
        }
    }
}

/// Access token configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Require a verified token on protected routes.
    pub enabled: bool,

    /// Argon2 PHC string the presented token is verified against.
    pub token_hash: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token_hash: String::new(),
        }
    }
}

/// Rate limiting configuration (fixed window per token).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests allowed per window.
    pub points: u32,

    /// Window length in seconds.
    pub duration_secs: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            points: 2,
            duration_secs: 10,
        }
    }
}

/// Upstream services called by the protected handlers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the search backend (SearXNG-compatible JSON API).
    pub search_url: String,

    /// Base URL of an OpenAI-compatible inference API.
    pub inference_url: String,

    /// Optional bearer key sent to the inference API.
    pub inference_api_key: Option<String>,

    /// Deadline for a single upstream call in seconds.
    pub timeout_secs: u64,

    /// Model names `/inference` accepts. Each one gets its own circuit.
    /// Empty accepts any model.
    pub models: Vec<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            search_url: "http://127.0.0.1:8888".to_string(),
            inference_url: "http://127.0.0.1:11434/v1".to_string(),
            inference_api_key: None,
            timeout_secs: 30,
            models: Vec::new(),
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: ADMIN_KEY_PLACEHOLDER.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
