//! Clock-driven rate limiter state machine.
//!
//! The limiter never looks at a clock itself: callers pass `now` in, which
//! keeps the policy deterministic under test and lets the async driver use
//! tokio's (pausable) clock.
//!
//! # Throttle
//!
//! ```text
//!            call, idle window elapsed            call within interval
//!   Ready ------------------------------> fire ------------------------> Pending(args)
//!     ^                                                                   |   | call: replace args
//!     |                         due (last_fired + interval)               |   v
//!     +----------------------------- fire latest args <-------------------+
//! ```
//!
//! # Debounce
//!
//! Every call replaces the pending arguments and pushes the deadline to
//! `now + wait`; the handler fires once the calls stop.

use std::time::{Duration, Instant};

/// Stand-in for deadlines that overflow `Instant`, about 30 years out.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `from + delay`, saturating to a far-future instant instead of panicking.
fn deadline(from: Instant, delay: Duration) -> Instant {
    from.checked_add(delay)
        .or_else(|| from.checked_add(FAR_FUTURE))
        .unwrap_or(from)
}

/// Rate-limiting policy for a wrapped handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatePolicy {
    /// Leading call plus at most one coalesced trailing call per interval.
    Throttle { interval: Duration },
    /// Single call `wait` after the last invocation, no leading call.
    Debounce { wait: Duration },
}

impl RatePolicy {
    pub fn throttle(interval: Duration) -> Self {
        RatePolicy::Throttle { interval }
    }

    pub fn debounce(wait: Duration) -> Self {
        RatePolicy::Debounce { wait }
    }
}

#[derive(Debug)]
struct Pending<A> {
    args: A,
    due: Instant,
}

/// Rate limiter holding at most one pending call.
#[derive(Debug)]
pub struct RateLimiter<A> {
    policy: RatePolicy,
    last_fired: Option<Instant>,
    pending: Option<Pending<A>>,
}

impl<A> RateLimiter<A> {
    /// Create a limiter with no call history.
    pub fn new(policy: RatePolicy) -> Self {
        Self {
            policy,
            last_fired: None,
            pending: None,
        }
    }

    /// Offer a call at time `now`.
    ///
    /// Returns the arguments to execute immediately, or `None` if the call was
    /// deferred (its arguments replace any earlier pending ones).
    pub fn offer(&mut self, args: A, now: Instant) -> Option<A> {
        match self.policy {
            RatePolicy::Throttle { interval } => {
                let window_open = match self.last_fired {
                    Some(last) => now.saturating_duration_since(last) >= interval,
                    None => true,
                };

                if window_open {
                    // Newer arguments supersede a pending call that is already due.
                    self.pending = None;
                    self.last_fired = Some(now);
                    return Some(args);
                }

                let due = match &self.pending {
                    Some(pending) => pending.due,
                    None => self.last_fired.map_or(now, |last| deadline(last, interval)),
                };
                self.pending = Some(Pending { args, due });
                None
            }
            RatePolicy::Debounce { wait } => {
                self.pending = Some(Pending {
                    args,
                    due: deadline(now, wait),
                });
                None
            }
        }
    }

    /// Take the pending call if it is due at `now`.
    pub fn poll_due(&mut self, now: Instant) -> Option<A> {
        match &self.pending {
            Some(pending) if pending.due <= now => {
                let pending = self.pending.take()?;
                self.last_fired = Some(now);
                Some(pending.args)
            }
            _ => None,
        }
    }

    /// When the pending call becomes due, if there is one.
    pub fn next_due(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.due)
    }

    /// Whether a call is waiting.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop the pending call without executing it. Returns whether one existed.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// When the handler last executed.
    pub fn last_fired(&self) -> Option<Instant> {
        self.last_fired
    }

    pub fn policy(&self) -> RatePolicy {
        self.policy
    }
}
