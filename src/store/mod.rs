//! In-process stores shared by every update handler.
//!
//! All stores sit behind traits so a persistent backend can replace the
//! in-memory ones without touching the handlers.

pub mod analytics;
pub mod monitoring;
pub mod rate_limit;

pub use analytics::{AnalyticsEvent, AnalyticsStore, EventKind, InMemoryAnalytics, SystemStats, UserStats};
pub use monitoring::{
    ErrorEntry, ErrorStats, HealthCheck, HealthStatus, InMemoryMonitoring, MonitoringStore, Severity,
};
pub use rate_limit::{InMemoryRateLimiter, RateDecision, RateLimitStore};
