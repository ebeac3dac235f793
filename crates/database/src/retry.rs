//! Bounded retries for uploads.

use crate::error::Result;
use std::future::Future;
use tracing::warn;

/// Archive uploads are attempted this many times in total.
pub(crate) const UPLOAD_ATTEMPTS: usize = 2;

/// Run `op` until it succeeds, fails with a non-retryable error, or has been
/// tried `attempts` times. The last error is returned unchanged.
pub(crate) async fn retry<T, F, Fut>(attempts: usize, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts && err.is_retryable() => {
                warn!(what, attempt, error = ?err, "attempt failed, retrying");
                attempt += 1;
            },
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn flaky(calls: &AtomicUsize, failures: usize, kind: fn() -> ErrorKind) -> Result<usize> {
        let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= failures {
            exn::bail!(kind());
        }
        Ok(call)
    }

    #[tokio::test]
    async fn test_retries_transient_failure() {
        let calls = AtomicUsize::new(0);
        let result = retry(UPLOAD_ATTEMPTS, "upload", || flaky(&calls, 1, || ErrorKind::Backend("down".into()))).await;
        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_attempts() {
        let calls = AtomicUsize::new(0);
        let err = retry(UPLOAD_ATTEMPTS, "upload", || flaky(&calls, 5, || ErrorKind::Backend("down".into())))
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Backend(_)));
        assert_eq!(calls.load(Ordering::SeqCst), UPLOAD_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_does_not_retry_fatal_errors() {
        let calls = AtomicUsize::new(0);
        let err = retry(UPLOAD_ATTEMPTS, "upload", || flaky(&calls, 5, || ErrorKind::Authorization("no".into())))
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Authorization(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
