//! Fixed-window rate limiting.

use chrono::{DateTime, Duration, Utc};
use opsgate_error::{OpsgateResult, RateLimitError};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Bucket identity: client address, session hint, and route.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_new::new)]
pub struct RateKey {
    /// Client IP address
    #[new(into)]
    ip: String,
    /// Session hint supplied by the client
    #[new(into)]
    session: String,
    /// Route being admitted
    #[new(into)]
    route: String,
}

#[derive(Debug)]
struct RateBucket {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// Fixed-window admission counter.
///
/// Exceeding `max` requests inside the window rejects with a
/// retry-after hint computed from the bucket's reset time. The bucket
/// table is pruned lazily once it grows past a size threshold.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    max: u32,
    window: Duration,
    prune_threshold: usize,
    buckets: HashMap<RateKey, RateBucket>,
}

impl FixedWindowLimiter {
    /// Default size past which expired buckets are pruned.
    pub const PRUNE_THRESHOLD: usize = 4096;

    /// Create a limiter admitting `max` requests per `window_ms`.
    pub fn new(max: u32, window_ms: i64) -> Self {
        Self {
            max,
            window: Duration::milliseconds(window_ms),
            prune_threshold: Self::PRUNE_THRESHOLD,
            buckets: HashMap::new(),
        }
    }

    /// Admit or reject a request at the current time.
    pub fn check(&mut self, key: RateKey) -> OpsgateResult<()> {
        self.check_at(key, Utc::now())
    }

    /// Admit or reject a request at an explicit time.
    #[instrument(skip(self, key))]
    pub fn check_at(&mut self, key: RateKey, now: DateTime<Utc>) -> OpsgateResult<()> {
        if self.buckets.len() > self.prune_threshold {
            self.buckets.retain(|_, b| b.reset_at > now);
            debug!(remaining = self.buckets.len(), "Pruned expired rate buckets");
        }

        let bucket = self.buckets.entry(key).or_insert(RateBucket {
            count: 0,
            reset_at: now + self.window,
        });
        if now > bucket.reset_at {
            bucket.count = 0;
            bucket.reset_at = now + self.window;
        }
        bucket.count += 1;

        if bucket.count > self.max {
            let retry_after = (bucket.reset_at - now).num_seconds().max(0) as u64;
            debug!(retry_after, "Rate limit exceeded");
            return Err(RateLimitError::new(
                format!("rate limit of {} requests exceeded", self.max),
                retry_after,
            )
            .into());
        }
        Ok(())
    }

    /// Current request count for a key, if a bucket exists.
    pub fn count(&self, key: &RateKey) -> Option<u32> {
        self.buckets.get(key).map(|b| b.count)
    }

    /// Number of live buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether no buckets are live.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// The stricter limiter wrapping invite-token redemption: a fixed
/// 10 requests per 60 seconds keyed by client and session only, to
/// blunt token-guessing attempts.
pub fn invite_redemption_limiter() -> FixedWindowLimiter {
    FixedWindowLimiter::new(10, 60_000)
}
