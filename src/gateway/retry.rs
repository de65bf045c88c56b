//! Exponential backoff retry wrapper for transient Gateway failures (§7).

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::EngineError;

/// Retries `op` up to `max_attempts` times while it returns a transient
/// `EngineError`. The first attempt counts toward `max_attempts`. Backoff is
/// `base * 2^attempt` plus up to 50% jitter, capped at `cap`.
pub async fn with_retry<T, F, Fut>(max_attempts: u32, base: Duration, cap: Duration, mut op: F) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < max_attempts => {
                let delay = backoff_delay(attempt, base, cap);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let exp = base.saturating_mul(1u32 << attempt.min(16));
    let exp = exp.min(cap);
    let jitter_frac: f64 = rand::thread_rng().gen_range(0.0..0.5);
    exp.mul_f64(1.0 + jitter_frac).min(cap.mul_f64(1.5))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_inner = calls.clone();
        let result: Result<u32, EngineError> = with_retry(3, Duration::from_millis(1), Duration::from_millis(5), move || {
            let calls = calls_inner.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(EngineError::Unavailable("flaky".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_inner = calls.clone();
        let result: Result<u32, EngineError> = with_retry(5, Duration::from_millis(1), Duration::from_millis(5), move || {
            let calls = calls_inner.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(EngineError::Invalid("bad shape".into()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_attempts_and_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_inner = calls.clone();
        let result: Result<u32, EngineError> = with_retry(3, Duration::from_millis(1), Duration::from_millis(5), move || {
            let calls = calls_inner.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(EngineError::Throttled("quota".into()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
