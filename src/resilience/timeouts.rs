//! Timeout enforcement.
//!
//! # Responsibilities
//! - Race a protected call against its configured deadline
//! - Attribute the timeout to the dependency that exceeded it
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the losing future is dropped
//! - Timeout errors are distinct from protected-call errors

use std::future::Future;
use std::time::Duration;

use crate::resilience::BreakerError;

/// Run `fut`, bounded by `deadline` when one is configured.
pub async fn with_deadline<T, E, Fut>(
    service: &str,
    deadline: Option<Duration>,
    fut: Fut,
) -> Result<T, BreakerError<E>>
where
    Fut: Future<Output = Result<T, E>>,
{
    let Some(deadline) = deadline else {
        return fut.await.map_err(BreakerError::Failed);
    };

    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result.map_err(BreakerError::Failed),
        Err(_) => Err(BreakerError::Timeout {
            service: service.to_string(),
            timeout_ms: deadline.as_millis() as u64,
        }),
    }
}
