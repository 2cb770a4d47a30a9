//! Cancellable background loops
//!
//! Every long-running loop (heartbeat, effect, low-battery re-alert) owns a
//! cancellation token. Loops check it at each frame and while sleeping; the
//! owner cancels and waits a bounded time for the task to finish.

use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// How long a caller waits for a cancelled loop to exit
pub const STOP_WAIT_BUDGET: Duration = Duration::from_millis(1000);

/// A spawned loop together with its cancellation token
///
/// Dropping the handle cancels the loop without waiting.
#[derive(Debug)]
pub struct BackgroundLoop {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl BackgroundLoop {
    /// Spawn `body` on `runtime`, handing it the loop's cancellation token
    pub fn spawn<F, Fut>(runtime: &Handle, body: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let task = runtime.spawn(body(token.clone()));
        Self {
            token,
            task: Some(task),
        }
    }

    /// Request cancellation without waiting
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the loop body has returned
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Cancel and wait up to [`STOP_WAIT_BUDGET`] for the loop to exit
    ///
    /// Returns `false` if the loop was still running when the budget ran out.
    pub async fn stop(mut self) -> bool {
        self.token.cancel();

        let Some(task) = self.task.take() else {
            return true;
        };

        match tokio::time::timeout(STOP_WAIT_BUDGET, task).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("Background loop ended abnormally: {}", e);
                true
            }
            Err(_) => {
                warn!(
                    "Background loop did not stop within {} ms",
                    STOP_WAIT_BUDGET.as_millis()
                );
                false
            }
        }
    }
}

impl Drop for BackgroundLoop {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Sleep for `duration` unless cancelled first
///
/// Returns `false` if the token was cancelled.
pub async fn sleep_or_cancel(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_stop_waits_for_loop_exit() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();

        let background = BackgroundLoop::spawn(&Handle::current(), move |token| async move {
            while sleep_or_cancel(&token, Duration::from_millis(10)).await {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(55)).await;
        assert!(background.stop().await);

        let after_stop = ticks.load(Ordering::SeqCst);
        assert_eq!(after_stop, 5);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), after_stop, "no ticks after stop");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_gives_up_after_budget() {
        // Ignores its token entirely
        let background = BackgroundLoop::spawn(&Handle::current(), |_token| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        assert!(!background.stop().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let token_seen = Arc::new(parking_lot::Mutex::new(None));
        let slot = token_seen.clone();

        let background = BackgroundLoop::spawn(&Handle::current(), move |token| {
            *slot.lock() = Some(token.clone());
            async move { token.cancelled().await }
        });
        drop(background);

        let token = token_seen.lock().clone().unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_or_cancel() {
        let token = CancellationToken::new();
        assert!(sleep_or_cancel(&token, Duration::from_millis(5)).await);

        token.cancel();
        assert!(!sleep_or_cancel(&token, Duration::from_secs(5)).await);
    }
}
