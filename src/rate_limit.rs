//! Per-provider request pacing and endpoint rotation
//!
//! Each API provider owns one `ProviderState`: a rotating pool of equivalent
//! endpoint mirrors plus a rate budget (minimum gap between two requests).
//! Both live behind one mutex so that the cursor advance and the timestamp
//! update of an attempt are visible to the next attempt before it fires.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::config::RetryConfig;

/// Minimum spacing between consecutive requests to one provider
#[derive(Debug)]
pub struct RateBudget {
    min_interval: Duration,
    /// Send slot handed out to the most recent request
    last_request: Option<Instant>,
}

impl RateBudget {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: None,
        }
    }

    /// Reserve the next send slot and record it as the last request time.
    /// The returned instant is never earlier than `now`.
    pub fn reserve(&mut self, now: Instant) -> Instant {
        let slot = match self.last_request {
            Some(last) => (last + self.min_interval).max(now),
            None => now,
        };
        self.last_request = Some(slot);
        slot
    }
}

/// Ordered mirrors of one provider API with a wrapping cursor
#[derive(Debug)]
pub struct EndpointPool {
    endpoints: Vec<String>,
    cursor: usize,
}

impl EndpointPool {
    /// Returns `None` for an empty mirror list
    pub fn new(endpoints: Vec<String>) -> Option<Self> {
        if endpoints.is_empty() {
            return None;
        }
        Some(Self {
            endpoints,
            cursor: 0,
        })
    }

    /// Endpoint under the cursor; the cursor advances on every call.
    pub fn next_endpoint(&mut self) -> String {
        let endpoint = self.endpoints[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.endpoints.len();
        endpoint
    }
}

/// What one attempt may use: which mirror, and when it may fire
#[derive(Debug, Clone)]
pub struct AttemptSlot {
    pub endpoint: String,
    pub send_at: Instant,
}

impl AttemptSlot {
    /// Suspend until the reserved send slot
    pub async fn wait(&self) {
        let now = Instant::now();
        if self.send_at > now {
            debug!("Pacing: waiting {:?} before calling {}", self.send_at - now, self.endpoint);
            sleep_until(self.send_at).await;
        }
    }
}

#[derive(Debug)]
struct ProviderInner {
    pool: EndpointPool,
    budget: RateBudget,
}

/// Shared rotation and pacing state for one provider
#[derive(Debug, Clone)]
pub struct ProviderState {
    inner: Arc<Mutex<ProviderInner>>,
}

impl ProviderState {
    pub fn new(endpoints: Vec<String>, min_interval: Duration) -> Option<Self> {
        let pool = EndpointPool::new(endpoints)?;
        Some(Self {
            inner: Arc::new(Mutex::new(ProviderInner {
                pool,
                budget: RateBudget::new(min_interval),
            })),
        })
    }

    /// Pick the endpoint for the next attempt and reserve its send slot.
    pub async fn reserve_attempt(&self) -> AttemptSlot {
        let mut inner = self.inner.lock().await;
        let endpoint = inner.pool.next_endpoint();
        let send_at = inner.budget.reserve(Instant::now());
        AttemptSlot { endpoint, send_at }
    }
}

/// Bounded retry with a fixed delay between attempts
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.delay())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
