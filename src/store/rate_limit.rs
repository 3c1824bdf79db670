//! Fixed-window per-user request limiting.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, warn};

pub const DEFAULT_WINDOW_SECS: i64 = 60;
pub const DEFAULT_MAX_REQUESTS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: TimeDelta },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

pub trait RateLimitStore: Send + Sync {
    /// Count one request from `user_id` at `now`.
    fn check(&self, user_id: i64, now: DateTime<Utc>) -> RateDecision;

    /// Drop windows that ended before `now`. Returns how many were removed.
    fn purge_expired(&self, now: DateTime<Utc>) -> usize;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: DateTime<Utc>,
}

pub struct InMemoryRateLimiter {
    window: TimeDelta,
    max_requests: u32,
    windows: Mutex<HashMap<i64, Window>>,
}

impl Default for InMemoryRateLimiter {
    fn default() -> Self {
        Self::new(TimeDelta::seconds(DEFAULT_WINDOW_SECS), DEFAULT_MAX_REQUESTS)
    }
}

impl InMemoryRateLimiter {
    pub fn new(window: TimeDelta, max_requests: u32) -> Self {
        Self { window, max_requests, windows: Mutex::new(HashMap::new()) }
    }

    pub fn window(&self) -> TimeDelta {
        self.window
    }

    pub fn tracked_users(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i64, Window>> {
        self.windows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RateLimitStore for InMemoryRateLimiter {
    fn check(&self, user_id: i64, now: DateTime<Utc>) -> RateDecision {
        let mut windows = self.lock();
        let entry = windows
            .entry(user_id)
            .or_insert(Window { count: 0, reset_at: now + self.window });

        if entry.reset_at <= now {
            *entry = Window { count: 0, reset_at: now + self.window };
        }

        if entry.count >= self.max_requests {
            warn!("⏱️ Rate limit exceeded for user {user_id}");
            return RateDecision::Limited { retry_after: entry.reset_at - now };
        }

        entry.count += 1;
        RateDecision::Allowed { remaining: self.max_requests - entry.count }
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut windows = self.lock();
        let before = windows.len();
        windows.retain(|_, w| w.reset_at > now);
        let removed = before - windows.len();
        if removed > 0 {
            debug!("Purged {removed} expired rate limit windows");
        }
        removed
    }
}
