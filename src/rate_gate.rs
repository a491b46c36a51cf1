//! Two-tier request admission: interval throttle and rolling daily quota.

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::counter::{CounterStore, RateWindow};

/// Enforces the per-identity admission policies on top of a pluggable
/// [`CounterStore`]. The two policies are independent: the interval
/// throttle guards every endpoint class, the quota guards the write path
/// only. Both deny on backend failure.
#[derive(Clone)]
pub struct RateGate {
    store: Arc<dyn CounterStore>,
    interval: Duration,
    max_writes: u32,
    window: Duration,
}

impl RateGate {
    pub fn new(
        store: Arc<dyn CounterStore>,
        interval: Duration,
        max_writes: u32,
        window: Duration,
    ) -> Self {
        Self {
            store,
            interval,
            max_writes,
            window,
        }
    }

    /// Interval policy: a size-1 token bucket refilling once per
    /// interval. A burst of N requests inside one interval admits
    /// exactly 1, however large N is.
    pub async fn allow_interval(&self, identity: &str) -> bool {
        let key = format!("interval:{}", identity);
        self.store.try_claim(&key, self.interval).await
    }

    /// Quota policy: at most `max_writes` requests per rolling window.
    ///
    /// The window is sliding-on-first-miss: it starts at the first
    /// request and lasts exactly one window length from that moment, it
    /// never resets at a calendar boundary. The read-modify-write here
    /// is not atomic across distributed backends; concurrent requests
    /// from one identity may overshoot the cap by the degree of
    /// concurrency, which is an accepted trade-off.
    pub async fn allow_write_quota(&self, identity: &str) -> bool {
        let key = format!("window:{}", identity);
        let now = chrono::Utc::now().timestamp_millis();
        let window_ms = self.window.as_millis() as i64;

        let current = self.store.get_window(&key).await;

        let fresh = RateWindow {
            window_start: now,
            count: 1,
        };

        match current {
            None => self.store.put_window(&key, fresh, self.window).await,
            Some(window) if now - window.window_start >= window_ms => {
                self.store.put_window(&key, fresh, self.window).await
            }
            Some(window) if window.count >= self.max_writes => {
                debug!(count = window.count, "write quota reached");
                false
            }
            Some(mut window) => {
                window.count += 1;
                let elapsed = (now - window.window_start).max(0) as u64;
                let remaining = self
                    .window
                    .saturating_sub(Duration::from_millis(elapsed));
                self.store.put_window(&key, window, remaining).await
            }
        }
    }
}
