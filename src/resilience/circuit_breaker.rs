//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: upstream assumed down, calls fail fast
//! - Half-Open: trial calls test whether the upstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= failure_threshold
//! Open → Half-Open: first call after reset_timeout since the last failure
//! Half-Open → Closed: success_threshold consecutive trial successes
//! Half-Open → Open: any trial failure
//! ```
//!
//! # Design Decisions
//! - Per-key circuit (model or backend name), one registry per process
//! - Open → Half-Open is evaluated lazily on access; no timers
//! - Only keys with failure history are stored; a success that leaves a key
//!   closed drops its entry
//! - The wrapped operation's error is handed back untouched

use std::future::Future;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

/// Circuit state for a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure/success history for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitMetrics {
    /// Consecutive failures since the last reset.
    pub failures: u32,
    /// Successes accumulated while half-open.
    pub successes: u32,
    /// Time of the most recent failure.
    pub last_failure: Option<Instant>,
    pub state: CircuitState,
}

impl Default for CircuitMetrics {
    fn default() -> Self {
        Self {
            failures: 0,
            successes: 0,
            last_failure: None,
            state: CircuitState::Closed,
        }
    }
}

/// Serializable view of one circuit, for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub key: String,
    pub state: CircuitState,
    pub failures: u32,
    pub successes: u32,
    pub since_last_failure_ms: Option<u64>,
}

/// Errors returned by [`CircuitBreaker::execute`].
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The call was rejected without invoking the operation.
    #[error("circuit open for `{key}` (retry in {retry_after:?})")]
    Open { key: String, retry_after: Duration },

    /// The operation ran and failed; the error is passed through as-is.
    #[error("{0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitBreakerError::Open { .. })
    }

    /// The operation's own error, if the operation ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            CircuitBreakerError::Open { .. } => None,
        }
    }
}

/// Per-key circuit breaker registry.
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    circuits: DashMap<String, CircuitMetrics>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            circuits: DashMap::new(),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Run `operation` under the circuit for `key`.
    ///
    /// Fails with [`CircuitBreakerError::Open`] without calling `operation`
    /// while the circuit is open. Otherwise the outcome is recorded and
    /// returned, with failures wrapped in [`CircuitBreakerError::Inner`].
    pub async fn execute<F, Fut, T, E>(
        &self,
        key: &str,
        operation: F,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Err(retry_after) = self.admit(key) {
            metrics::record_circuit_rejection(key);
            tracing::debug!(key = %key, ?retry_after, "Circuit open, rejecting call");
            return Err(CircuitBreakerError::Open {
                key: key.to_string(),
                retry_after,
            });
        }

        match operation().await {
            Ok(value) => {
                self.record_success(key);
                Ok(value)
            }
            Err(e) => {
                self.record_failure(key);
                Err(CircuitBreakerError::Inner(e))
            }
        }
    }

    /// Current state of `key`. Never-seen keys are closed.
    pub fn get_state(&self, key: &str) -> CircuitState {
        self.metrics(key).state
    }

    /// Snapshot of `key`'s counters with its effective state.
    pub fn metrics(&self, key: &str) -> CircuitMetrics {
        let now = Instant::now();
        self.circuits
            .get(key)
            .map(|m| CircuitMetrics {
                state: self.effective_state(&m, now),
                ..*m
            })
            .unwrap_or_default()
    }

    /// All tracked circuits, sorted by key.
    pub fn snapshot(&self) -> Vec<CircuitSnapshot> {
        let now = Instant::now();
        let mut circuits: Vec<_> = self
            .circuits
            .iter()
            .map(|entry| {
                let m = entry.value();
                CircuitSnapshot {
                    key: entry.key().clone(),
                    state: self.effective_state(m, now),
                    failures: m.failures,
                    successes: m.successes,
                    since_last_failure_ms: m
                        .last_failure
                        .map(|t| now.saturating_duration_since(t).as_millis() as u64),
                }
            })
            .collect();
        circuits.sort_by(|a, b| a.key.cmp(&b.key));
        circuits
    }

    /// Forget `key`, returning it to an implicit closed circuit.
    pub fn reset(&self, key: &str) -> bool {
        let removed = self.circuits.remove(key).is_some();
        if removed {
            tracing::info!(key = %key, "Circuit reset");
        }
        removed
    }

    /// Number of keys with recorded history.
    pub fn len(&self) -> usize {
        self.circuits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.circuits.is_empty()
    }

    fn effective_state(&self, m: &CircuitMetrics, now: Instant) -> CircuitState {
        match m.state {
            CircuitState::Open if self.remaining_open(m, now).is_none() => CircuitState::HalfOpen,
            state => state,
        }
    }

    /// Time left before an open circuit admits a trial call.
    fn remaining_open(&self, m: &CircuitMetrics, now: Instant) -> Option<Duration> {
        let reset_timeout = self.config.reset_timeout();
        let elapsed = m
            .last_failure
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or(reset_timeout);
        reset_timeout.checked_sub(elapsed).filter(|d| !d.is_zero())
    }

    /// Decide whether a call may proceed, moving Open → Half-Open once the
    /// reset timeout has elapsed. `Err` carries the remaining open time.
    fn admit(&self, key: &str) -> Result<(), Duration> {
        let Some(mut m) = self.circuits.get_mut(key) else {
            return Ok(());
        };

        if m.state == CircuitState::Open {
            if let Some(remaining) = self.remaining_open(&m, Instant::now()) {
                return Err(remaining);
            }
            m.state = CircuitState::HalfOpen;
            m.successes = 0;
            tracing::info!(key = %key, "Circuit half-open, allowing trial call");
            metrics::record_circuit_transition(key, CircuitState::HalfOpen);
        }
        Ok(())
    }

    fn record_success(&self, key: &str) {
        // Absent keys are closed with zero counters already.
        let Some(mut m) = self.circuits.get_mut(key) else {
            return;
        };

        let healthy = match m.state {
            CircuitState::HalfOpen => {
                m.successes += 1;
                if m.successes >= self.config.success_threshold {
                    *m = CircuitMetrics::default();
                    tracing::info!(key = %key, "Circuit closed");
                    metrics::record_circuit_transition(key, CircuitState::Closed);
                    true
                } else {
                    false
                }
            }
            CircuitState::Closed => {
                *m = CircuitMetrics::default();
                true
            }
            CircuitState::Open => {
                m.failures = 0;
                false
            }
        };
        drop(m);

        // A healthy key is indistinguishable from an absent one. The guard is
        // released first, so re-check in case a failure landed in between.
        if healthy {
            self.circuits
                .remove_if(key, |_, m| *m == CircuitMetrics::default());
        }
    }

    fn record_failure(&self, key: &str) {
        let now = Instant::now();
        let mut m = self.circuits.entry(key.to_string()).or_default();

        m.failures = m.failures.saturating_add(1);
        m.successes = 0;
        m.last_failure = Some(now);

        let previous = m.state;
        if previous == CircuitState::HalfOpen || m.failures >= self.config.failure_threshold {
            m.state = CircuitState::Open;
            if previous != CircuitState::Open {
                tracing::warn!(
                    key = %key,
                    failures = m.failures,
                    reset_timeout_ms = self.config.reset_timeout_ms,
                    "Circuit opened"
                );
                metrics::record_circuit_transition(key, CircuitState::Open);
            }
        }
    }
}
