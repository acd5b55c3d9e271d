use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Token bucket limiting outbound calls: `capacity` tokens, one refilled per
/// `interval`. The default allows one call per 500 ms.
#[derive(Debug)]
pub struct Throttle {
    capacity: f64,
    interval: Duration,
    state: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last: Instant,
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(1, Duration::from_millis(500))
    }
}

impl Throttle {
    /// The bucket starts full.
    pub fn new(capacity: u32, interval: Duration) -> Self {
        let capacity = f64::from(capacity.max(1));
        Self {
            capacity,
            interval,
            state: Mutex::new(Bucket {
                tokens: capacity,
                last: Instant::now(),
            }),
        }
    }

    /// Take a token, or the wait until one is available.
    fn try_take(&self) -> Result<(), Duration> {
        let mut b = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        if self.interval.is_zero() {
            return Ok(());
        }
        let refilled = now.duration_since(b.last).as_secs_f64() / self.interval.as_secs_f64();
        b.tokens = (b.tokens + refilled).min(self.capacity);
        b.last = now;
        if b.tokens >= 1.0 {
            b.tokens -= 1.0;
            return Ok(());
        }
        Err(self.interval.mul_f64(1.0 - b.tokens))
    }

    /// Wait until a call may proceed.
    pub async fn acquire(&self) {
        while let Err(wait) = self.try_take() {
            tracing::debug!(wait_ms = wait.as_millis() as u64, "throttled");
            tokio::time::sleep(wait).await;
        }
    }
}
