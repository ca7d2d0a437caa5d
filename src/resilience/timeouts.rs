//! Per-call deadlines.

use std::future::Future;
use std::time::Duration;

use crate::error::TransportError;

/// Run `fut` under `deadline`; elapsing maps to [`TransportError::Timeout`].
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(deadline.as_millis() as u64)),
    }
}
