//! Error log and health check kept in memory.
//!
//! The log is a bounded ring like the analytics events. Per-error counts
//! survive the ring and are only dropped with the process.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error};

pub const MAX_ERRORS: usize = 1000;

/// Errors in this window decide the health of the error check.
pub const HEALTH_WINDOW: TimeDelta = TimeDelta::minutes(5);
/// More recent errors than this make the bot degraded.
pub const DEGRADED_ERROR_COUNT: usize = 10;
/// Uptime below this reports degraded while the bot warms up.
pub const WARMUP: TimeDelta = TimeDelta::seconds(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [Severity::Low, Severity::Medium, Severity::High, Severity::Critical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEntry {
    /// Assigned by the store, increasing.
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub context: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl ErrorEntry {
    pub fn new(severity: Severity, context: &str, message: impl Into<String>) -> Self {
        Self {
            id: 0,
            timestamp: Utc::now(),
            severity,
            context: context.to_string(),
            message: message.into(),
            user_id: None,
            data: Value::Null,
        }
    }

    pub fn for_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    fn key(&self) -> String {
        format!("{}: {}", self.context, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorCount {
    pub error: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SeverityCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStats {
    pub total_errors: usize,
    pub errors_last_hour: usize,
    #[serde(rename = "errorsLast24Hours")]
    pub errors_last_24_hours: usize,
    pub top_errors: Vec<ErrorCount>,
    pub errors_by_severity: SeverityCounts,
}

/// Ordered from best to worst so the overall status is the max of the checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UptimeCheck {
    pub status: HealthStatus,
    pub seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorCheck {
    pub status: HealthStatus,
    pub count: usize,
    pub recent_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthChecks {
    pub uptime: UptimeCheck,
    pub errors: ErrorCheck,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub checks: HealthChecks,
}

pub trait MonitoringStore: Send + Sync {
    fn record(&self, entry: ErrorEntry);
    /// Newest `limit` errors, oldest first.
    fn recent_errors(&self, limit: usize) -> Vec<ErrorEntry>;
    fn errors_by_severity(&self, severity: Severity, limit: usize) -> Vec<ErrorEntry>;
    fn error_stats(&self, now: DateTime<Utc>) -> ErrorStats;
    fn health(&self, now: DateTime<Utc>) -> HealthCheck;
    /// Drop errors older than `max_age`; returns how many were dropped.
    fn purge_older_than(&self, now: DateTime<Utc>, max_age: TimeDelta) -> usize;
    fn export(&self, now: DateTime<Utc>) -> Value;
}

#[derive(Default)]
struct State {
    next_id: u64,
    errors: VecDeque<ErrorEntry>,
    counts: HashMap<String, u64>,
}

impl State {
    fn since(&self, cutoff: DateTime<Utc>) -> impl Iterator<Item = &ErrorEntry> {
        self.errors.iter().filter(move |e| e.timestamp > cutoff)
    }

    fn tail<F: Fn(&ErrorEntry) -> bool>(&self, limit: usize, keep: F) -> Vec<ErrorEntry> {
        let mut out: Vec<ErrorEntry> = self.errors.iter().rev().filter(|e| keep(e)).take(limit).cloned().collect();
        out.reverse();
        out
    }
}

pub struct InMemoryMonitoring {
    started: DateTime<Utc>,
    capacity: usize,
    state: Mutex<State>,
}

impl Default for InMemoryMonitoring {
    fn default() -> Self {
        Self::with_capacity(MAX_ERRORS)
    }
}

impl InMemoryMonitoring {
    pub fn with_capacity(capacity: usize) -> Self {
        Self::started_at(Utc::now(), capacity)
    }

    pub fn started_at(started: DateTime<Utc>, capacity: usize) -> Self {
        Self { started, capacity: capacity.max(1), state: Mutex::new(State::default()) }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MonitoringStore for InMemoryMonitoring {
    fn record(&self, mut entry: ErrorEntry) {
        if entry.severity == Severity::Critical {
            error!("🚨 Critical error in {}: {}", entry.context, entry.message);
        } else {
            debug!("🩺 [{}] {}: {}", entry.severity.as_str(), entry.context, entry.message);
        }

        let mut state = self.lock();
        state.next_id += 1;
        entry.id = state.next_id;
        *state.counts.entry(entry.key()).or_default() += 1;
        if state.errors.len() == self.capacity {
            state.errors.pop_front();
        }
        state.errors.push_back(entry);
    }

    fn recent_errors(&self, limit: usize) -> Vec<ErrorEntry> {
        self.lock().tail(limit, |_| true)
    }

    fn errors_by_severity(&self, severity: Severity, limit: usize) -> Vec<ErrorEntry> {
        self.lock().tail(limit, |e| e.severity == severity)
    }

    fn error_stats(&self, now: DateTime<Utc>) -> ErrorStats {
        let state = self.lock();

        let mut top_errors: Vec<ErrorCount> = state
            .counts
            .iter()
            .map(|(error, count)| ErrorCount { error: error.clone(), count: *count })
            .collect();
        top_errors.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.error.cmp(&b.error)));
        top_errors.truncate(10);

        let mut by_severity = SeverityCounts::default();
        for entry in &state.errors {
            match entry.severity {
                Severity::Low => by_severity.low += 1,
                Severity::Medium => by_severity.medium += 1,
                Severity::High => by_severity.high += 1,
                Severity::Critical => by_severity.critical += 1,
            }
        }

        ErrorStats {
            total_errors: state.errors.len(),
            errors_last_hour: state.since(now - TimeDelta::hours(1)).count(),
            errors_last_24_hours: state.since(now - TimeDelta::hours(24)).count(),
            top_errors,
            errors_by_severity: by_severity,
        }
    }

    fn health(&self, now: DateTime<Utc>) -> HealthCheck {
        let state = self.lock();

        let uptime = now - self.started;
        let uptime_status = if uptime > WARMUP { HealthStatus::Healthy } else { HealthStatus::Degraded };

        let recent: Vec<&ErrorEntry> = state.since(now - HEALTH_WINDOW).collect();
        let error_status = if recent.iter().any(|e| e.severity == Severity::Critical) {
            HealthStatus::Unhealthy
        } else if recent.len() > DEGRADED_ERROR_COUNT {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        HealthCheck {
            status: uptime_status.max(error_status),
            timestamp: now,
            checks: HealthChecks {
                uptime: UptimeCheck { status: uptime_status, seconds: uptime.num_seconds().max(0) },
                errors: ErrorCheck { status: error_status, count: state.errors.len(), recent_count: recent.len() },
            },
        }
    }

    fn purge_older_than(&self, now: DateTime<Utc>, max_age: TimeDelta) -> usize {
        let mut state = self.lock();
        let before = state.errors.len();
        state.errors.retain(|e| e.timestamp > now - max_age);
        let dropped = before - state.errors.len();
        if dropped > 0 {
            debug!("🩺 Dropped {dropped} old errors, {} remain", state.errors.len());
        }
        dropped
    }

    fn export(&self, now: DateTime<Utc>) -> Value {
        json!({
            "errors": self.recent_errors(100),
            "stats": self.error_stats(now),
            "health": self.health(now),
        })
    }
}
