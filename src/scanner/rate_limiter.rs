//! Rate limiting for port scans.
//!
//! Token bucket pacing of connection attempts, so a scan does not flood
//! the target's connection tracking.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

/// A rate limiter for controlling scan speed.
///
/// Uses a token bucket algorithm to enforce a maximum
/// connection-attempts-per-second limit.
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<GovLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl RateLimiter {
    /// Create a limiter allowing `rate` probes per second.
    ///
    /// Returns `None` for a rate of 0, meaning unlimited.
    pub fn new(rate: u32) -> Option<Self> {
        let rate = NonZeroU32::new(rate)?;
        let limiter = GovLimiter::direct(Quota::per_second(rate));

        Some(Self {
            limiter: Arc::new(limiter),
        })
    }

    /// Wait until the rate limit allows another probe.
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }

    /// Try to acquire a token without waiting.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}
