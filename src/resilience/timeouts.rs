//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap upstream calls with a deadline
//! - Turn an elapsed deadline into an ordinary error value
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - The deadline is applied inside the breaker-wrapped operation; a
//!   timed-out call counts as a circuit failure

use std::future::Future;
use std::time::Duration;

use tokio::time::error::Elapsed;

/// Run `fut` with a deadline. An elapsed deadline becomes `E::from(Elapsed)`.
pub async fn with_deadline<F, T, E>(deadline: Duration, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<Elapsed>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(elapsed) => Err(E::from(elapsed)),
    }
}
