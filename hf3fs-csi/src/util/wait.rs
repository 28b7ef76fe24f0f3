//! Bounded polling with cancellation.

use std::time::Duration;

use hf3fs_csi_shared::errors::CsiError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Default interval between readiness checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default bound on how long to wait for readiness.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(60);

/// How often and for how long [`poll_until`] checks its predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

/// Why [`poll_until`] stopped without the predicate becoming true.
#[derive(Debug)]
pub enum WaitError {
    /// The timeout elapsed. Carries the most recent predicate error, if the
    /// last check failed rather than returning `false`.
    TimedOut {
        elapsed: Duration,
        last_error: Option<CsiError>,
    },
    /// The cancellation token fired.
    Cancelled,
}

/// Check `predicate` every `policy.interval` until it returns `Ok(true)`.
///
/// Predicate errors are not fatal; they count as "not ready yet" and the most
/// recent one is reported on timeout. The predicate is always evaluated at
/// least once unless `cancel` is already cancelled.
pub async fn poll_until<P>(
    mut predicate: P,
    policy: WaitPolicy,
    cancel: &CancellationToken,
) -> Result<(), WaitError>
where
    P: FnMut() -> Result<bool, CsiError>,
{
    let start = Instant::now();
    let deadline = start + policy.timeout;

    loop {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled);
        }

        let last_error = match predicate() {
            Ok(true) => return Ok(()),
            Ok(false) => None,
            Err(e) => {
                tracing::trace!(error = %e, "Readiness check failed, will retry");
                Some(e)
            }
        };

        let now = Instant::now();
        if now >= deadline {
            return Err(WaitError::TimedOut {
                elapsed: now - start,
                last_error,
            });
        }

        let nap = policy.interval.min(deadline - now);
        tokio::select! {
            _ = cancel.cancelled() => return Err(WaitError::Cancelled),
            _ = tokio::time::sleep(nap) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ready_immediately() {
        let cancel = CancellationToken::new();
        let mut calls = 0;
        let result = poll_until(
            || {
                calls += 1;
                Ok(true)
            },
            WaitPolicy::default(),
            &cancel,
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_several_polls() {
        let cancel = CancellationToken::new();
        let mut calls = 0;
        let result = poll_until(
            || {
                calls += 1;
                Ok(calls >= 4)
            },
            WaitPolicy::default(),
            &cancel,
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(calls, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let cancel = CancellationToken::new();
        let policy = WaitPolicy {
            interval: Duration::from_millis(500),
            timeout: Duration::from_secs(5),
        };
        let mut calls = 0;
        let result = poll_until(
            || {
                calls += 1;
                Ok(false)
            },
            policy,
            &cancel,
        )
        .await;

        match result {
            Err(WaitError::TimedOut {
                elapsed,
                last_error,
            }) => {
                assert!(elapsed >= Duration::from_secs(5));
                assert!(last_error.is_none());
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        // One check at t=0 and one per interval up to and including the deadline
        assert_eq!(calls, 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_last_error() {
        let cancel = CancellationToken::new();
        let policy = WaitPolicy {
            interval: Duration::from_millis(100),
            timeout: Duration::from_millis(300),
        };
        let result = poll_until(
            || Err(CsiError::MountTable("mountinfo unreadable".into())),
            policy,
            &cancel,
        )
        .await;

        match result {
            Err(WaitError::TimedOut {
                last_error: Some(e),
                ..
            }) => assert!(e.to_string().contains("mountinfo unreadable")),
            other => panic!("expected timeout with error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled_skips_predicate() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut calls = 0;
        let result = poll_until(
            || {
                calls += 1;
                Ok(true)
            },
            WaitPolicy::default(),
            &cancel,
        )
        .await;
        assert!(matches!(result, Err(WaitError::Cancelled)));
        assert_eq!(calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_wait() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1200)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let result = poll_until(|| Ok(false), WaitPolicy::default(), &cancel).await;
        assert!(matches!(result, Err(WaitError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(2), "should stop promptly");
    }
}
