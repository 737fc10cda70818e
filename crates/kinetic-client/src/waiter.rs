//! One-shot readiness gate.
//!
//! Used to park callers until the drive's first unsolicited status message
//! arrives (which carries the connection ID). The transition to signaled is
//! terminal and idempotent; spurious wakeups are retried until the deadline.

use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use tokio::{sync::Notify, time};

/// One-shot gate with states `{Unsignaled, Signaled}` and a timed wait.
#[derive(Debug, Default)]
pub(crate) struct ReadyWaiter {
    signaled: AtomicBool,
    notify: Notify,
}

impl ReadyWaiter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Transition to signaled and wake all current and future waiters.
    /// Idempotent.
    pub(crate) fn signal(&self) {
        self.signaled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub(crate) fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::SeqCst)
    }

    /// Wait until signaled or until `timeout` elapses. Returns whether the
    /// gate is signaled.
    pub(crate) async fn wait(&self, timeout: Duration) -> bool {
        let deadline = time::Instant::now() + timeout;

        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before re-checking the flag so a concurrent signal()
            // between the check and the await cannot be missed.
            notified.as_mut().enable();

            if self.is_signaled() {
                return true;
            }

            if time::timeout_at(deadline, notified).await.is_err() {
                return self.is_signaled();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn signal_before_wait_returns_immediately() {
        let waiter = ReadyWaiter::new();
        waiter.signal();
        assert!(waiter.wait(Duration::from_millis(1)).await);
    }

    #[tokio::test]
    async fn signal_wakes_a_parked_waiter() {
        let waiter = Arc::new(ReadyWaiter::new());

        let parked = {
            let waiter = Arc::clone(&waiter);
            tokio::spawn(async move { waiter.wait(Duration::from_secs(5)).await })
        };

        tokio::task::yield_now().await;
        waiter.signal();

        assert!(parked.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_unsignaled() {
        let waiter = ReadyWaiter::new();
        assert!(!waiter.wait(Duration::from_millis(100)).await);
        assert!(!waiter.is_signaled());
    }

    #[tokio::test]
    async fn signal_is_idempotent() {
        let waiter = ReadyWaiter::new();
        waiter.signal();
        waiter.signal();
        assert!(waiter.is_signaled());
        assert!(waiter.wait(Duration::from_millis(1)).await);
    }
}
