//! Request-scoped cancellation and deadlines
//!
//! Every async trait method takes a Context as its first parameter so that
//! long running API calls can stop retrying once Terraform gives up.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    deadline: Option<Instant>,
    done_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
}

impl Context {
    pub fn new() -> Self {
        let (done_tx, done_rx) = watch::channel(false);
        Self {
            inner: Arc::new(ContextInner {
                deadline: None,
                done_tx,
                done_rx,
            }),
        }
    }

    /// Derives a context that is cancelled once `timeout` elapses.
    /// Must be called from within a tokio runtime.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        let (done_tx, done_rx) = watch::channel(self.is_cancelled());

        let timer_tx = done_tx.clone();
        let mut parent = self.done();
        tokio::spawn(async move {
            let parent_cancelled = async move {
                // A dropped parent can no longer cancel us
                if parent.wait_for(|done| *done).await.is_err() {
                    std::future::pending::<()>().await;
                }
            };
            tokio::select! {
                _ = tokio::time::sleep_until(deadline.into()) => {}
                _ = parent_cancelled => {}
            }
            let _ = timer_tx.send(true);
        });

        Self {
            inner: Arc::new(ContextInner {
                deadline: Some(deadline),
                done_tx,
                done_rx,
            }),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.done_rx.borrow()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn done(&self) -> watch::Receiver<bool> {
        self.inner.done_rx.clone()
    }

    /// Resolves once the context is cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.done();
        let _ = rx.wait_for(|done| *done).await;
    }

    pub fn cancel(&self) {
        let _ = self.inner.done_tx.send(true);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn context_timeout_cancels() {
        let ctx = Context::new().with_timeout(Duration::from_millis(50));
        assert!(!ctx.is_cancelled());

        sleep(Duration::from_millis(120)).await;

        assert!(ctx.is_cancelled());
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }

    #[tokio::test]
    async fn context_manual_cancel() {
        let ctx = Context::new();
        assert!(!ctx.is_cancelled());

        let clone = ctx.clone();
        ctx.cancel();

        assert!(clone.is_cancelled());
        tokio::time::timeout(Duration::from_millis(100), clone.cancelled())
            .await
            .expect("cancelled() should resolve");
    }

    #[tokio::test]
    async fn child_context_follows_parent_cancellation() {
        let parent = Context::new();
        let child = parent.clone().with_timeout(Duration::from_secs(30));

        parent.cancel();
        tokio::time::timeout(Duration::from_millis(200), child.cancelled())
            .await
            .expect("child should be cancelled with its parent");
    }

    #[tokio::test]
    async fn context_deadline() {
        let ctx = Context::new();
        assert!(ctx.deadline().is_none());
        assert!(ctx.remaining().is_none());

        let ctx = ctx.with_timeout(Duration::from_secs(1));
        assert!(ctx.deadline().is_some());
    }
}
