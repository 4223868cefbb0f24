//! rate_limiter - token bucket enforcing a bits-per-second ceiling

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket for one direction of one bearer.  The bucket capacity is the rate itself,
/// so an idle limiter admits at most one second's worth of traffic in a burst.
/// A rate of 0 means unlimited.
#[derive(Debug)]
pub struct RateLimiter {
    rate_bps: AtomicU32,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(rate_bps: u32) -> Self {
        RateLimiter {
            rate_bps: AtomicU32::new(rate_bps),
            bucket: Mutex::new(Bucket {
                tokens: rate_bps as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn rate(&self) -> u32 {
        self.rate_bps.load(Ordering::Relaxed)
    }

    /// Try to take `size_bits` tokens.  All or nothing: on failure the balance is left alone.
    pub fn consume(&self, size_bits: u64) -> bool {
        self.consume_at(size_bits, Instant::now())
    }

    pub(crate) fn consume_at(&self, size_bits: u64, now: Instant) -> bool {
        // Unlimited limiters never touch the lock.
        if self.rate() == 0 {
            return true;
        }

        self.consume_locked(size_bits, now)
    }

    fn consume_locked(&self, size_bits: u64, now: Instant) -> bool {
        let mut bucket = self.bucket.lock();

        // Re-read under the lock so that accounting uses the same rate that set_rate() stored
        // alongside the token reset.  The rate may have dropped to unlimited since the fast path.
        let rate_bps = self.rate();
        if rate_bps == 0 {
            return true;
        }
        let rate = rate_bps as f64;
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        bucket.last_refill = bucket.last_refill.max(now);
        bucket.tokens = (bucket.tokens + rate * elapsed.as_secs_f64()).min(rate);

        let size_bits = size_bits as f64;
        if bucket.tokens >= size_bits {
            bucket.tokens -= size_bits;
            true
        } else {
            false
        }
    }

    /// Change the ceiling.  The bucket is refilled to the new rate, whatever the old balance was.
    pub fn set_rate(&self, rate_bps: u32) {
        self.set_rate_at(rate_bps, Instant::now())
    }

    pub(crate) fn set_rate_at(&self, rate_bps: u32, now: Instant) {
        let mut bucket = self.bucket.lock();
        self.rate_bps.store(rate_bps, Ordering::Relaxed);
        bucket.tokens = rate_bps as f64;
        bucket.last_refill = now;
    }
}
