// In crates/api-client/src/retry.rs

use crate::types::RetryPolicy;
use crate::{Error, Result};
use std::future::Future;

/// Runs `call` until it succeeds, fails with a permanent error, or the policy
/// runs out of retries.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, operation: &'static str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.max_retries + 1;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) if attempt >= attempts => {
                return Err(Error::RetriesExhausted {
                    operation,
                    attempts,
                    last: e.to_string(),
                });
            }
            Err(e) => {
                tracing::warn!(operation, attempt, error = %e, "Bridge call failed. Retrying...");
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}
