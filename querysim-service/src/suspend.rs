//! Suspend-for-duration primitives provided by the host runtime.
//!
//! The I/O phase of a simulated query must genuinely occupy whatever execution context runs it,
//! so the simulator delegates waiting to a [`Suspend`] implementation chosen by the host:
//!
//! - [`TokioSuspend`] yields to the tokio timer, freeing the worker thread for other tasks.
//! - [`ThreadSuspend`] blocks the calling OS thread, making it unavailable for other work.
//!
//! Both observe a [`CancellationToken`] and fail with [`Error::Cancelled`] once it fires.

use std::future::Future;
use std::thread;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Upper bound on how long [`ThreadSuspend`] sleeps before checking for cancellation.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Suspends the caller for a given duration.
pub trait Suspend {
    /// Resolves after `duration`, or with [`Error::Cancelled`] if the host cancels the wait.
    ///
    /// A zero duration resolves immediately.
    fn suspend(&self, duration: Duration) -> impl Future<Output = Result<()>> + Send;
}

/// Suspends the current task on the tokio timer.
#[derive(Clone, Debug, Default)]
pub struct TokioSuspend {
    cancel: CancellationToken,
}

impl TokioSuspend {
    /// Creates a suspension primitive that is interrupted by `cancel`.
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }
}

impl Suspend for TokioSuspend {
    fn suspend(&self, duration: Duration) -> impl Future<Output = Result<()>> + Send {
        async move {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if duration.is_zero() {
                return Ok(());
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(Error::Cancelled),
                _ = tokio::time::sleep(duration) => Ok(()),
            }
        }
    }
}

/// Blocks the calling OS thread.
///
/// The returned future completes within its first poll, so it is meant to be driven on a thread
/// that may block, for example with `futures::executor::block_on` inside a dedicated thread or
/// `tokio::task::spawn_blocking`.
#[derive(Clone, Debug, Default)]
pub struct ThreadSuspend {
    cancel: CancellationToken,
}

impl ThreadSuspend {
    /// Creates a suspension primitive that is interrupted by `cancel`.
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    fn block_for(&self, duration: Duration) -> Result<()> {
        let deadline = Instant::now() + duration;
        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }

            thread::sleep((deadline - now).min(CANCEL_POLL_INTERVAL));
        }
    }
}

impl Suspend for ThreadSuspend {
    fn suspend(&self, duration: Duration) -> impl Future<Output = Result<()>> + Send {
        async move { self.block_for(duration) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn tokio_suspend_waits() {
        let start = tokio::time::Instant::now();
        TokioSuspend::default()
            .suspend(Duration::from_millis(50))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_suspend_observes_cancellation() {
        let cancel = CancellationToken::new();
        let suspend = TokioSuspend::new(cancel.clone());

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let start = tokio::time::Instant::now();
        let result = suspend.suspend(Duration::from_secs(10)).await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert!(start.elapsed() < Duration::from_millis(70));
    }

    #[tokio::test]
    async fn tokio_suspend_rejects_already_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = TokioSuspend::new(cancel).suspend(Duration::ZERO).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn thread_suspend_blocks() {
        let start = Instant::now();
        futures::executor::block_on(ThreadSuspend::default().suspend(Duration::from_millis(30)))
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn thread_suspend_observes_cancellation() {
        let cancel = CancellationToken::new();
        let suspend = ThreadSuspend::new(cancel.clone());

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            cancel.cancel();
            Instant::now()
        });

        let result = futures::executor::block_on(suspend.suspend(Duration::from_secs(10)));
        let returned = Instant::now();
        let cancelled = canceller.join().unwrap();

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(returned.duration_since(cancelled) < Duration::from_millis(50));
    }
}
