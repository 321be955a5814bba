use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation timed out after {timeout_ms} ms")]
pub struct Elapsed {
    pub timeout_ms: u64,
}

/// Bounds `operation` by `timeout_ms` milliseconds; `0` means unbounded.
///
/// On expiry the operation future is dropped, which cancels it at its next
/// suspension point and frees whatever it held. The timer is dropped with the
/// returned future on both paths.
pub async fn with_timeout<F>(operation: F, timeout_ms: u64) -> Result<F::Output, Elapsed>
where
    F: Future,
{
    if timeout_ms == 0 {
        return Ok(operation.await);
    }
    tokio::time::timeout(Duration::from_millis(timeout_ms), operation)
        .await
        .map_err(|_| Elapsed { timeout_ms })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn fast_operation_wins() {
        let out = with_timeout(async { 7 }, 50).await;
        assert_eq!(out, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_operation_times_out_with_duration() {
        let out = with_timeout(tokio::time::sleep(Duration::from_secs(60)), 250).await;
        assert_eq!(out, Err(Elapsed { timeout_ms: 250 }));
        assert_eq!(out.unwrap_err().to_string(), "operation timed out after 250 ms");
    }

    #[tokio::test(start_paused = true)]
    async fn zero_disables_the_bound() {
        let out = with_timeout(
            async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "done"
            },
            0,
        )
        .await;
        assert_eq!(out, Ok("done"));
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_operation_is_dropped() {
        struct Flag(Arc<AtomicBool>);
        impl Drop for Flag {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let guard = Flag(Arc::clone(&dropped));
        let out = with_timeout(
            async move {
                let _guard = guard;
                tokio::time::sleep(Duration::from_secs(10)).await;
            },
            10,
        )
        .await;
        assert!(out.is_err());
        assert!(dropped.load(Ordering::SeqCst));
    }
}
