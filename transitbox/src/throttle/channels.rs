//! Named throttled channels for high-frequency renderer events.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use super::handle::{wrap, Throttled};
use super::limiter::RatePolicy;

/// Handle identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// One registered (event, handler, policy) triple.
struct ThrottledChannel<A> {
    event: String,
    handler: Throttled<A>,
}

/// Fan-out of named events to rate-limited handlers.
///
/// Each subscription owns its own limiter, so a slow consumer with a long
/// interval never delays a consumer subscribed with a shorter one.
pub struct EventThrottler<A> {
    channels: Mutex<HashMap<SubscriptionId, ThrottledChannel<A>>>,
    next_id: AtomicU64,
}

impl<A> fmt::Debug for EventThrottler<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventThrottler")
            .field("channels", &self.channels.lock().len())
            .finish_non_exhaustive()
    }
}

impl<A> Default for EventThrottler<A> {
    fn default() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<A> EventThrottler<A>
where
    A: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event` under `policy`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe<F>(&self, event: &str, policy: RatePolicy, handler: F) -> SubscriptionId
    where
        F: FnMut(A) + Send + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let channel = ThrottledChannel {
            event: event.to_string(),
            handler: wrap(handler, policy),
        };
        self.channels.lock().insert(id, channel);
        debug!(subscription = %id, event, ?policy, "Throttled channel registered");
        id
    }

    /// Remove a subscription. A pending call is dropped without firing.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.channels.lock().remove(&id);
        match removed {
            Some(channel) => {
                channel.handler.cancel();
                debug!(subscription = %id, event = %channel.event, "Throttled channel removed");
                true
            }
            None => false,
        }
    }

    /// Deliver an event to every channel subscribed to it.
    ///
    /// Returns the number of channels the event was offered to.
    pub fn emit(&self, event: &str, args: A) -> usize {
        let channels = self.channels.lock();
        let mut delivered = 0;
        for channel in channels.values().filter(|c| c.event == event) {
            if channel.handler.call(args.clone()) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of live subscriptions.
    pub fn channel_count(&self) -> usize {
        self.channels.lock().len()
    }

    /// Keep only the subscriptions for which `keep(id, event)` holds.
    ///
    /// Removed subscriptions drop their pending call without firing. Returns
    /// the number removed.
    pub fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(SubscriptionId, &str) -> bool,
    {
        let removed: Vec<_> = {
            let mut channels = self.channels.lock();
            let doomed: Vec<SubscriptionId> = channels
                .iter()
                .filter(|(id, channel)| !keep(**id, channel.event.as_str()))
                .map(|(id, _)| *id)
                .collect();
            doomed
                .into_iter()
                .filter_map(|id| channels.remove(&id))
                .collect()
        };
        for channel in &removed {
            channel.handler.cancel();
        }
        removed.len()
    }

    /// Remove every subscription.
    pub fn clear(&self) {
        self.retain(|_, _| false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_emit_routes_by_event_name() {
        let throttler = EventThrottler::<u32>::new();
        let moves = Arc::new(Mutex::new(Vec::new()));
        let zooms = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&moves);
        throttler.subscribe("move", RatePolicy::throttle(Duration::from_millis(100)), move |v| {
            sink.lock().push(v)
        });
        let sink = Arc::clone(&zooms);
        throttler.subscribe("zoom", RatePolicy::throttle(Duration::from_millis(100)), move |v| {
            sink.lock().push(v)
        });

        assert_eq!(throttler.emit("move", 7), 1);
        assert_eq!(throttler.emit("rotate", 8), 0);
        settle().await;

        assert_eq!(*moves.lock(), vec![7]);
        assert!(zooms.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_limiters_per_subscription() {
        let throttler = EventThrottler::<u32>::new();
        let fast = Arc::new(Mutex::new(Vec::new()));
        let slow = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&fast);
        throttler.subscribe("move", RatePolicy::throttle(Duration::from_millis(50)), move |v| {
            sink.lock().push(v)
        });
        let sink = Arc::clone(&slow);
        throttler.subscribe("move", RatePolicy::throttle(Duration::from_millis(500)), move |v| {
            sink.lock().push(v)
        });

        for i in 0..10 {
            throttler.emit("move", i);
            settle().await;
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        settle().await;

        let fast = fast.lock().clone();
        let slow = slow.lock().clone();
        assert!(fast.len() > slow.len());
        assert_eq!(fast.last(), Some(&9));
        assert_eq!(slow, vec![0, 9]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_clears_pending_call() {
        let throttler = EventThrottler::<u32>::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let id = throttler.subscribe("move", RatePolicy::throttle(Duration::from_millis(100)), move |v| {
            sink.lock().push(v)
        });

        throttler.emit("move", 1);
        settle().await;
        throttler.emit("move", 2);
        settle().await;

        assert!(throttler.unsubscribe(id));
        assert!(!throttler.unsubscribe(id));
        assert_eq!(throttler.channel_count(), 0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(*calls.lock(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retain_keeps_selected_subscriptions() {
        let throttler = EventThrottler::<u32>::new();
        let kept = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&kept);
        let keep = throttler.subscribe("move", RatePolicy::throttle(Duration::from_millis(100)), move |v| {
            sink.lock().push(v)
        });
        throttler.subscribe("move", RatePolicy::throttle(Duration::from_millis(100)), |_| {});
        throttler.subscribe("moveend", RatePolicy::debounce(Duration::from_millis(100)), |_| {});

        assert_eq!(throttler.retain(|id, _| id == keep), 2);
        assert_eq!(throttler.channel_count(), 1);

        assert_eq!(throttler.emit("move", 3), 1);
        settle().await;
        assert_eq!(*kept.lock(), vec![3]);

        throttler.clear();
        assert_eq!(throttler.channel_count(), 0);
    }
}
