//! Per-token request quota with fixed windows.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::config::RateLimitConfig;

/// Errors from a rate limiter.
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// Quota for the key is spent.
    #[error("rate limit exceeded (retry in {retry_after:?})")]
    LimitExceeded { retry_after: Duration },

    /// The limiter could not decide.
    #[error("rate limiter failure: {0}")]
    Backend(String),
}

/// Windowed quota keyed by an opaque string.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Consume one unit of `key`'s quota.
    async fn consume(&self, key: &str) -> Result<(), RateLimitError>;
}

/// Consumption within one window.
#[derive(Debug)]
struct Window {
    started: Instant,
    consumed: u32,
}

/// In-memory fixed-window limiter.
///
/// A key's window opens on its first request and allows `points` requests
/// until `window` has elapsed, after which the count starts over.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    windows: Mutex<HashMap<String, Window>>,
    points: u32,
    window: Duration,
}

impl FixedWindowLimiter {
    pub fn new(points: u32, window: Duration) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            points,
            window,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.points, config.window())
    }

    fn try_consume(&self, key: &str, now: Instant) -> Result<(), RateLimitError> {
        let mut windows = self
            .windows
            .lock()
            .map_err(|_| RateLimitError::Backend("rate limiter mutex poisoned".into()))?;

        let window = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            consumed: 0,
        });

        let elapsed = now.saturating_duration_since(window.started);
        if elapsed >= self.window {
            window.started = now;
            window.consumed = 0;
        }

        if window.consumed < self.points {
            window.consumed += 1;
            Ok(())
        } else {
            Err(RateLimitError::LimitExceeded {
                retry_after: self.window.saturating_sub(elapsed),
            })
        }
    }

    /// Drop windows that have fully elapsed. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let Ok(mut windows) = self.windows.lock() else {
            return 0;
        };
        let before = windows.len();
        windows.retain(|_, w| now.saturating_duration_since(w.started) < self.window);
        before - windows.len()
    }

    /// Number of keys currently tracked.
    pub fn tracked(&self) -> usize {
        self.windows.lock().map(|w| w.len()).unwrap_or(0)
    }

    /// Periodically purge expired windows until shutdown.
    pub async fn run_purge(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.window);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.purge_expired();
                    if removed > 0 {
                        tracing::debug!(removed, "Purged expired rate limit windows");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Rate limit purge loop stopping");
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl RateLimiter for FixedWindowLimiter {
    async fn consume(&self, key: &str) -> Result<(), RateLimitError> {
        self.try_consume(key, Instant::now())
    }
}
