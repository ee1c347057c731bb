//! Event rate limiting.
//!
//! Renderer camera events fire at frame rate while the camera moves. Work
//! hung off those events (rebuilding layers, recomputing what the view
//! shows) must be bounded, but the final state of a movement must never be
//! lost.
//!
//! - [`RateLimiter`]: deterministic throttle/debounce state machine
//! - [`wrap`] / [`Throttled`]: a handler driven by a limiter on a tokio task
//! - [`EventThrottler`]: named channels, one limiter per subscription

mod channels;
mod handle;
mod limiter;

pub use channels::{EventThrottler, SubscriptionId};
pub use handle::{wrap, Throttled};
pub use limiter::{RateLimiter, RatePolicy};
