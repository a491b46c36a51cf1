//! TTL-keyed counter/flag storage behind the admission gate.
//!
//! Two backends implement the same capability set: a process-local map
//! with a periodic sweep task, and a Redis-backed variant shared across
//! instances. Callers are backend-agnostic; the backend is chosen once
//! at construction. Counter state is advisory: losing it only weakens
//! rate limiting, it never touches link data.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::ApiError;

/// Per-identity counter state for the rolling quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateWindow {
    /// Window start, epoch milliseconds.
    pub window_start: i64,
    /// Requests counted since the window started.
    pub count: u32,
}

/// Capability set shared by all counter backends.
///
/// Backend I/O failures never surface as errors here: a failed claim or
/// window write reports `false`/`None`, and the gate above denies the
/// request. Failing closed keeps the quota guarantee under storage
/// outages.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically starts a TTL-bounded claim for `key` if no unexpired
    /// claim exists. Returns `true` when the claim was taken.
    async fn try_claim(&self, key: &str, ttl: Duration) -> bool;

    /// Current window for `key`, if one is stored and unexpired.
    async fn get_window(&self, key: &str) -> Option<RateWindow>;

    /// Persists `window` under `key` for `ttl`. Returns `false` when the
    /// write did not land.
    async fn put_window(&self, key: &str, window: RateWindow, ttl: Duration) -> bool;
}

/// How often the in-memory backend evicts expired entries.
const SWEEP_PERIOD: Duration = Duration::from_secs(60);

#[derive(Default)]
struct MemoryState {
    claims: HashMap<String, Instant>,
    windows: HashMap<String, (RateWindow, Instant)>,
}

impl MemoryState {
    fn sweep(&mut self, now: Instant) -> usize {
        let before = self.claims.len() + self.windows.len();
        self.claims.retain(|_, expiry| *expiry > now);
        self.windows.retain(|_, (_, expiry)| *expiry > now);
        before - (self.claims.len() + self.windows.len())
    }
}

/// Process-local counter backend.
///
/// Lowest latency, not shared across instances, lost on restart. The
/// store owns a scheduled sweep task that evicts expired entries; the
/// task holds only a weak reference and is aborted when the store drops.
pub struct MemoryCounterStore {
    state: Arc<RwLock<MemoryState>>,
    sweeper: JoinHandle<()>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        let state = Arc::new(RwLock::new(MemoryState::default()));
        let sweeper = tokio::spawn(Self::sweep_loop(Arc::downgrade(&state)));
        Self { state, sweeper }
    }

    async fn sweep_loop(state: Weak<RwLock<MemoryState>>) {
        let mut ticker = tokio::time::interval(SWEEP_PERIOD);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(state) = state.upgrade() else {
                return;
            };
            let evicted = state.write().await.sweep(Instant::now());
            if evicted > 0 {
                debug!(evicted, "swept expired counter entries");
            }
        }
    }
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MemoryCounterStore {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn try_claim(&self, key: &str, ttl: Duration) -> bool {
        let now = Instant::now();
        let mut state = self.state.write().await;
        if let Some(expiry) = state.claims.get(key) {
            if *expiry > now {
                return false;
            }
        }
        state.claims.insert(key.to_string(), now + ttl);
        true
    }

    async fn get_window(&self, key: &str) -> Option<RateWindow> {
        let now = Instant::now();
        let state = self.state.read().await;
        match state.windows.get(key) {
            Some((window, expiry)) if *expiry > now => Some(window.clone()),
            _ => None,
        }
    }

    async fn put_window(&self, key: &str, window: RateWindow, ttl: Duration) -> bool {
        let expiry = Instant::now() + ttl;
        let mut state = self.state.write().await;
        state.windows.insert(key.to_string(), (window, expiry));
        true
    }
}

/// Redis-backed counter backend, shared across instances.
///
/// Claims use `SET NX PX` so the interval throttle stays atomic; windows
/// are stored as JSON with a `PX` expiry. Network latency and
/// eventual-consistency races are accepted per the quota's documented
/// weak-consistency trade-off.
pub struct RedisCounterStore {
    connection: MultiplexedConnection,
}

impl RedisCounterStore {
    pub async fn connect(redis_url: &str) -> Result<Self, ApiError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| ApiError::Configuration(format!("invalid redis url: {}", e)))?;
        let connection = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| ApiError::Upstream(format!("redis connect failed: {}", e)))?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn try_claim(&self, key: &str, ttl: Duration) -> bool {
        let mut conn = self.connection.clone();
        let result: Result<Option<String>, redis::RedisError> = redis::cmd("SET")
            .arg(key)
            .arg(1)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await;
        match result {
            Ok(reply) => reply.is_some(),
            Err(e) => {
                warn!(key, error = %e, "claim write failed, denying");
                false
            }
        }
    }

    async fn get_window(&self, key: &str) -> Option<RateWindow> {
        let mut conn = self.connection.clone();
        let result: Result<Option<String>, redis::RedisError> =
            redis::cmd("GET").arg(key).query_async(&mut conn).await;
        match result {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(window) => Some(window),
                Err(e) => {
                    warn!(key, error = %e, "stored window is unreadable, treating as absent");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "window read failed, treating as absent");
                None
            }
        }
    }

    async fn put_window(&self, key: &str, window: RateWindow, ttl: Duration) -> bool {
        let payload = match serde_json::to_string(&window) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key, error = %e, "window serialization failed");
                return false;
            }
        };
        let mut conn = self.connection.clone();
        let result: Result<(), redis::RedisError> = redis::cmd("SET")
            .arg(key)
            .arg(payload)
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await;
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "window write failed, denying");
                false
            }
        }
    }
}
