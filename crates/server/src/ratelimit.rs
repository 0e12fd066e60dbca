//! Token-bucket rate limiter guarding the recipe endpoint.
//!
//! Refills continuously at the configured rate up to the burst capacity;
//! one token per request.

use std::sync::Mutex;
use std::time::Instant;

/// A thread-safe token bucket.
#[derive(Debug)]
pub struct TokenBucket {
    rate: f64,
    capacity: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A bucket refilling at `rate` tokens per second with `burst`
    /// capacity. The bucket starts full.
    pub fn new(rate: f64, burst: f64) -> Self {
        Self {
            rate,
            capacity: burst,
            state: Mutex::new(BucketState {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take one token. Returns false when the bucket is empty.
    pub fn allow(&self) -> bool {
        let mut state = self.state.lock().expect("rate limiter lock poisoned");

        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.capacity);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_capacity_is_honored() {
        let bucket = TokenBucket::new(1.0, 3.0);
        assert!(bucket.allow());
        assert!(bucket.allow());
        assert!(bucket.allow());
        assert!(!bucket.allow());
    }

    #[test]
    fn test_bucket_refills_over_time() {
        let bucket = TokenBucket::new(1000.0, 1.0);
        assert!(bucket.allow());
        assert!(!bucket.allow());

        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(bucket.allow());
    }

    #[test]
    fn test_zero_rate_never_refills() {
        let bucket = TokenBucket::new(0.0, 1.0);
        assert!(bucket.allow());
        assert!(!bucket.allow());
        assert!(!bucket.allow());
    }
}
