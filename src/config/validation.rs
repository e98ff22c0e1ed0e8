//! Configuration validation.
//!
//! Serde handles syntax; this checks value ranges and cross-field rules.
//! Every problem is reported, not just the first.

use std::fmt;
use std::net::SocketAddr;

use argon2::PasswordHash;

use crate::config::schema::{GateConfig, ADMIN_KEY_PLACEHOLDER};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not a socket address", config.listener.bind_address),
        ));
    }

    let breaker = &config.circuit_breaker;
    if breaker.failure_threshold == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.failure_threshold",
            "must be at least 1",
        ));
    }
    if breaker.success_threshold == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.success_threshold",
            "must be at least 1",
        ));
    }
    if breaker.reset_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.reset_timeout_ms",
            "must be greater than 0",
        ));
    }

    if config.rate_limit.points == 0 {
        errors.push(ValidationError::new("rate_limit.points", "must be at least 1"));
    }
    if config.rate_limit.duration_secs == 0 {
        errors.push(ValidationError::new(
            "rate_limit.duration_secs",
            "must be greater than 0",
        ));
    }

    if config.access.enabled {
        if config.access.token_hash.is_empty() {
            errors.push(ValidationError::new(
                "access.token_hash",
                "required when access checks are enabled",
            ));
        } else if let Err(e) = PasswordHash::new(&config.access.token_hash) {
            errors.push(ValidationError::new(
                "access.token_hash",
                format!("not a valid PHC hash string ({e})"),
            ));
        }
    }

    if config.upstream.timeout_secs == 0 {
        errors.push(ValidationError::new(
            "upstream.timeout_secs",
            "must be greater than 0",
        ));
    }

    // The inbound timeout drops the handler future, so it must leave room
    // for the upstream deadline to fire and reach the breaker first.
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new(
            "timeouts.request_secs",
            "must be greater than 0",
        ));
    } else if config.timeouts.request_secs <= config.upstream.timeout_secs {
        errors.push(ValidationError::new(
            "timeouts.request_secs",
            format!(
                "must exceed upstream.timeout_secs ({})",
                config.upstream.timeout_secs
            ),
        ));
    }

    if config.upstream.models.iter().any(|m| m.trim().is_empty()) {
        errors.push(ValidationError::new(
            "upstream.models",
            "model names must not be empty",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "`{}` is not a socket address",
                config.observability.metrics_address
            ),
        ));
    }

    if config.admin.enabled {
        if config.admin.api_key.is_empty() || config.admin.api_key == ADMIN_KEY_PLACEHOLDER {
            errors.push(ValidationError::new(
                "admin.api_key",
                "must be set to a real key when the admin API is enabled",
            ));
        }
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "admin.bind_address",
                format!("`{}` is not a socket address", config.admin.bind_address),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
