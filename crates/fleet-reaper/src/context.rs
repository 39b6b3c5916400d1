//! Sweep context — cancellation and deadline propagation.
//!
//! A `SweepContext` is cloned into every judgment task of a sweep. It
//! resolves [`cancelled`](SweepContext::cancelled) when the shutdown
//! signal fires or the deadline passes, whichever comes first.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct SweepContext {
    /// Shutdown signal; `true` means cancelled.
    cancel: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

impl SweepContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context cancelled when `shutdown` flips to `true`.
    pub fn with_cancel(shutdown: watch::Receiver<bool>) -> Self {
        Self {
            cancel: Some(shutdown),
            deadline: None,
        }
    }

    /// Bound the context by a timeout measured from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Bound the context by an absolute deadline. An earlier existing
    /// deadline wins.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the context is already cancelled or past its deadline.
    pub fn is_cancelled(&self) -> bool {
        let signalled = self.cancel.as_ref().is_some_and(|rx| *rx.borrow());
        let expired = self.deadline.is_some_and(|d| Instant::now() >= d);
        signalled || expired
    }

    /// Resolves once the context is cancelled. Pending forever for a
    /// background context, or when the shutdown sender is dropped without
    /// signalling.
    pub async fn cancelled(&self) {
        let signal = async {
            let Some(rx) = &self.cancel else {
                return std::future::pending::<()>().await;
            };
            let mut rx = rx.clone();
            loop {
                if *rx.borrow_and_update() {
                    return;
                }
                if rx.changed().await.is_err() {
                    return std::future::pending::<()>().await;
                }
            }
        };

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = signal => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => signal.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn background_is_never_cancelled() {
        let ctx = SweepContext::background();
        assert!(!ctx.is_cancelled());

        let waited = tokio::time::timeout(Duration::from_millis(20), ctx.cancelled()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn shutdown_signal_cancels() {
        let (tx, rx) = watch::channel(false);
        let ctx = SweepContext::with_cancel(rx);
        assert!(!ctx.is_cancelled());

        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.cancelled().await })
        };
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancellation should propagate")
            .unwrap();
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn already_signalled_resolves_immediately() {
        let (_tx, rx) = watch::channel(true);
        let ctx = SweepContext::with_cancel(rx);

        tokio::time::timeout(Duration::from_millis(100), ctx.cancelled())
            .await
            .expect("already cancelled");
    }

    #[tokio::test]
    async fn dropped_sender_does_not_cancel() {
        let (tx, rx) = watch::channel(false);
        let ctx = SweepContext::with_cancel(rx);
        drop(tx);

        let waited = tokio::time::timeout(Duration::from_millis(20), ctx.cancelled()).await;
        assert!(waited.is_err());
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test]
    async fn deadline_cancels() {
        let ctx = SweepContext::background().with_timeout(Duration::from_millis(10));

        tokio::time::timeout(Duration::from_secs(1), ctx.cancelled())
            .await
            .expect("deadline should fire");
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn earlier_deadline_wins() {
        let now = Instant::now();
        let ctx = SweepContext::background()
            .with_deadline(now + Duration::from_secs(5))
            .with_deadline(now + Duration::from_secs(60));
        assert_eq!(ctx.deadline(), Some(now + Duration::from_secs(5)));
    }
}
