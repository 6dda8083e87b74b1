//! Per-user sliding-window rate limiting.
//!
//! Each user carries a list of request timestamps. A request is admitted if
//! fewer than `max_requests` timestamps fall inside the trailing window;
//! admission appends the current timestamp. State is in-process only and
//! resets on restart.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_requests: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            window_ms: 60_000,
            max_requests: 30,
        }
    }
}

/// Snapshot of a user's standing, suitable for response headers and the
/// status endpoint. `reset` is epoch milliseconds.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RateLimitInfo {
    pub limit: usize,
    pub remaining: usize,
    pub reset: u64,
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

#[derive(Debug)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub info: RateLimitInfo,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    store: Mutex<HashMap<String, Vec<u64>>>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        RateLimiter {
            config,
            store: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or reject one request for `user_id`, mutating the window.
    pub fn check_limit(&self, user_id: &str) -> RateLimitResult {
        let now = now_ms();
        let window_start = now.saturating_sub(self.config.window_ms);

        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        let timestamps = store.entry(user_id.to_string()).or_default();
        timestamps.retain(|&t| t > window_start);

        if timestamps.len() >= self.config.max_requests {
            // Oldest surviving timestamp decides when capacity returns.
            let oldest = timestamps.first().copied().unwrap_or(now);
            let reset = oldest + self.config.window_ms;
            let retry_after_ms = reset.saturating_sub(now);
            let retry_after = (retry_after_ms + 999) / 1000;
            warn!(
                user_id,
                limit = self.config.max_requests,
                retry_after_secs = retry_after,
                "Rate limit exceeded"
            );
            return RateLimitResult {
                allowed: false,
                info: RateLimitInfo {
                    limit: self.config.max_requests,
                    remaining: 0,
                    reset,
                    retry_after: Some(retry_after),
                },
            };
        }

        timestamps.push(now);
        let remaining = self.config.max_requests - timestamps.len();
        RateLimitResult {
            allowed: true,
            info: RateLimitInfo {
                limit: self.config.max_requests,
                remaining,
                reset: now + self.config.window_ms,
                retry_after: None,
            },
        }
    }

    /// Read-only view of a user's standing. Does not consume capacity.
    pub fn status(&self, user_id: &str) -> RateLimitInfo {
        let now = now_ms();
        let window_start = now.saturating_sub(self.config.window_ms);

        let store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        let in_window = store
            .get(user_id)
            .map(|timestamps| timestamps.iter().filter(|&&t| t > window_start).count())
            .unwrap_or(0);

        let reset = store
            .get(user_id)
            .and_then(|timestamps| timestamps.iter().find(|&&t| t > window_start))
            .map(|&oldest| oldest + self.config.window_ms)
            .unwrap_or(now + self.config.window_ms);

        RateLimitInfo {
            limit: self.config.max_requests,
            remaining: self.config.max_requests.saturating_sub(in_window),
            reset,
            retry_after: None,
        }
    }

    /// Drop expired timestamps and empty entries so idle users do not pin
    /// memory forever.
    pub fn cleanup(&self) {
        let window_start = now_ms().saturating_sub(self.config.window_ms);
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        let before = store.len();
        store.retain(|_, timestamps| {
            timestamps.retain(|&t| t > window_start);
            !timestamps.is_empty()
        });
        debug!(pruned = before - store.len(), tracked = store.len(), "Rate limiter cleanup");
    }

    pub fn window_ms(&self) -> u64 {
        self.config.window_ms
    }
}

/// Periodic cleanup task, one sweep per window length.
pub fn spawn_sweeper(limiter: Arc<RateLimiter>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(limiter.window_ms().max(1)));
        ticker.tick().await; // first tick fires immediately
        loop {
            ticker.tick().await;
            limiter.cleanup();
        }
    })
}
