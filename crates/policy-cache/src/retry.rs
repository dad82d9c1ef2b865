use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Retry an async operation up to `max_attempts` times, sleeping
/// `base_delay * attempt` between tries. The last error is returned.
pub async fn retry_async<F, Fut, T, E>(
    label: &str,
    mut op: F,
    max_attempts: usize,
    base_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= max_attempts => return Err(err),
            Err(err) => {
                warn!(label, attempt, max_attempts, %err, "attempt failed, retrying");
                tokio::time::sleep(base_delay * attempt as u32).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), String> = retry_async(
            "test",
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("down".to_string())
            },
            3,
            Duration::from_millis(10),
        )
        .await;
        assert_eq!(result.unwrap_err(), "down");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn returns_first_success() {
        let calls = AtomicUsize::new(0);
        let result: Result<usize, String> = retry_async(
            "test",
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 2 {
                    Err("flaky".to_string())
                } else {
                    Ok(n)
                }
            },
            3,
            Duration::from_millis(10),
        )
        .await;
        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let calls = AtomicUsize::new(0);
        let _: Result<(), String> = retry_async(
            "test",
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("nope".to_string())
            },
            0,
            Duration::ZERO,
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
