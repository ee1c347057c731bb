//! Async driver wrapping a handler in a [`RateLimiter`].

use std::future;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::limiter::{RateLimiter, RatePolicy};

/// A rate-limited handler.
///
/// Calls are forwarded to a background task that owns the limiter and the
/// handler. Dropping the handle (or calling [`cancel`](Self::cancel)) stops
/// the task; a pending trailing call is discarded, never fired.
#[derive(Debug)]
pub struct Throttled<A> {
    tx: mpsc::UnboundedSender<A>,
    cancel: CancellationToken,
    policy: RatePolicy,
}

/// Wrap `handler` so it runs at the rate `policy` allows.
///
/// Must be called from within a tokio runtime.
pub fn wrap<A, F>(handler: F, policy: RatePolicy) -> Throttled<A>
where
    A: Send + 'static,
    F: FnMut(A) + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    tokio::spawn(drive(handler, RateLimiter::new(policy), rx, cancel.clone()));
    Throttled { tx, cancel, policy }
}

impl<A> Throttled<A> {
    /// Invoke the wrapped handler, subject to the rate policy.
    ///
    /// Returns `false` if the handle has been cancelled.
    pub fn call(&self, args: A) -> bool {
        !self.cancel.is_cancelled() && self.tx.send(args).is_ok()
    }

    /// Stop the handler; any pending call is dropped.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn policy(&self) -> RatePolicy {
        self.policy
    }
}

impl<A> Drop for Throttled<A> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Current time on tokio's clock, which tests can pause and advance.
fn clock_now() -> Instant {
    tokio::time::Instant::now().into_std()
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => future::pending().await,
    }
}

async fn drive<A, F>(
    mut handler: F,
    mut limiter: RateLimiter<A>,
    mut rx: mpsc::UnboundedReceiver<A>,
    cancel: CancellationToken,
) where
    F: FnMut(A),
{
    loop {
        let deadline = limiter.next_due();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Some(args) => {
                    if let Some(args) = limiter.offer(args, clock_now()) {
                        handler(args);
                    }
                }
                None => break,
            },
            _ = sleep_until(deadline) => {
                if let Some(args) = limiter.poll_due(clock_now()) {
                    handler(args);
                }
            }
        }
    }

    if limiter.cancel() {
        tracing::trace!("Throttled handler stopped with a pending call, discarded");
    }
}
