//! Global resolution rate limiter
//!
//! A single token bucket shared by every in-flight request. Resolutions that
//! miss both cache tiers must take a token before any outbound traffic;
//! `acquire` blocks until one is available. Cache hits never touch the
//! limiter.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    updated_at: Instant,
}

/// Token bucket admitting `per_second` operations per second, with one second
/// of burst.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    state: Arc<Mutex<BucketState>>,
    rate: f64,
    burst: f64,
}

impl RateLimiter {
    pub fn new(per_second: u32) -> Self {
        let rate = f64::from(per_second);
        Self {
            state: Arc::new(Mutex::new(BucketState {
                tokens: rate,
                updated_at: Instant::now(),
            })),
            rate,
            burst: rate,
        }
    }

    /// Take one token, sleeping until one is available.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.updated_at).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.rate).min(self.burst);
                state.updated_at = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else {
                    Some(Duration::from_secs_f64((1.0 - state.tokens) / self.rate))
                }
            };

            match wait {
                None => return,
                Some(duration) => tokio::time::sleep(duration).await,
            }
        }
    }
}
