//! Caller-driven cancellation for blocking I/O.
//!
//! Core operations never impose their own deadline. Callers pass a
//! [`CancellationToken`]; when it fires, the in-flight future is dropped, which
//! closes any open stream or connection it owned.

use std::future::Future;

pub use tokio_util::sync::CancellationToken;

/// Marker returned when the caller's token fired first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Run `fut` unless `token` is cancelled first.
///
/// An already-cancelled token wins without polling `fut` at all.
pub async fn run_cancellable<T, E, F>(token: &CancellationToken, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<Cancelled>,
{
    tokio::select! {
        biased;
        () = token.cancelled() => Err(Cancelled.into()),
        result = fut => result,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Cancelled,
    }

    impl From<Cancelled> for TestError {
        fn from(_: Cancelled) -> Self {
            Self::Cancelled
        }
    }

    #[tokio::test]
    async fn test_completes_when_not_cancelled() {
        let token = CancellationToken::new();
        let result: Result<u32, TestError> = run_cancellable(&token, async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_precancelled_token_never_polls_future() {
        let token = CancellationToken::new();
        token.cancel();
        let polled = Arc::new(AtomicBool::new(false));
        let flag = polled.clone();

        let result: Result<(), TestError> = run_cancellable(&token, async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await;

        assert_eq!(result, Err(TestError::Cancelled));
        assert!(!polled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancel_during_pending_future() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result: Result<(), TestError> = run_cancellable(&token, async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        })
        .await;

        assert_eq!(result, Err(TestError::Cancelled));
    }
}
