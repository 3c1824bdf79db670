//! Usage analytics kept in memory.
//!
//! Events are retained in a bounded ring; per-user aggregates and command
//! counts live for the lifetime of the process.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

pub const MAX_EVENTS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    CommandUsed,
    IdeaGenerated,
    VoiceProcessed,
    LeadCreated,
    ErrorOccurred,
    UserRegistered,
    RateLimitHit,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::CommandUsed,
        EventKind::IdeaGenerated,
        EventKind::VoiceProcessed,
        EventKind::LeadCreated,
        EventKind::ErrorOccurred,
        EventKind::UserRegistered,
        EventKind::RateLimitHit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::CommandUsed => "command_used",
            EventKind::IdeaGenerated => "idea_generated",
            EventKind::VoiceProcessed => "voice_processed",
            EventKind::LeadCreated => "lead_created",
            EventKind::ErrorOccurred => "error_occurred",
            EventKind::UserRegistered => "user_registered",
            EventKind::RateLimitHit => "rate_limit_hit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl AnalyticsEvent {
    pub fn new(kind: EventKind, user_id: i64, username: Option<&str>) -> Self {
        Self {
            kind,
            user_id,
            username: username.map(str::to_string),
            timestamp: Utc::now(),
            data: Value::Null,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn command(user_id: i64, username: Option<&str>, command: &str) -> Self {
        Self::new(EventKind::CommandUsed, user_id, username).with_data(json!({ "command": command }))
    }

    pub fn idea(user_id: i64, username: Option<&str>, topic: Option<&str>, generated_by: &str) -> Self {
        Self::new(EventKind::IdeaGenerated, user_id, username)
            .with_data(json!({ "topic": topic, "generatedBy": generated_by }))
    }

    pub fn error(user_id: i64, message: &str, context: &str) -> Self {
        Self::new(EventKind::ErrorOccurred, user_id, None).with_data(json!({ "error": message, "context": context }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub user_id: i64,
    pub username: Option<String>,
    pub total_commands: u64,
    pub ideas_generated: u64,
    pub leads_created: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandCount {
    pub command: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub total_users: usize,
    pub total_commands: usize,
    pub total_ideas: usize,
    pub total_leads: usize,
    pub total_errors: usize,
    pub uptime_secs: i64,
    pub top_commands: Vec<CommandCount>,
    #[serde(rename = "activeUsers24h")]
    pub active_users_24h: usize,
    #[serde(rename = "activeUsers7d")]
    pub active_users_7d: usize,
}

pub trait AnalyticsStore: Send + Sync {
    fn track(&self, event: AnalyticsEvent);
    fn user_stats(&self, user_id: i64) -> Option<UserStats>;
    fn all_user_stats(&self) -> Vec<UserStats>;
    fn system_stats(&self, now: DateTime<Utc>) -> SystemStats;
    /// Newest `limit` events, oldest first.
    fn recent_events(&self, limit: usize) -> Vec<AnalyticsEvent>;
    fn events_by_kind(&self, kind: EventKind, limit: usize) -> Vec<AnalyticsEvent>;
    fn events_by_user(&self, user_id: i64, limit: usize) -> Vec<AnalyticsEvent>;
    /// Full snapshot for the dashboard export.
    fn export(&self, now: DateTime<Utc>) -> Value;
}

#[derive(Default)]
struct State {
    events: VecDeque<AnalyticsEvent>,
    users: HashMap<i64, UserStats>,
    commands: HashMap<String, u64>,
}

impl State {
    fn push(&mut self, event: AnalyticsEvent, capacity: usize) {
        if self.events.len() == capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    fn tail<F: Fn(&AnalyticsEvent) -> bool>(&self, limit: usize, keep: F) -> Vec<AnalyticsEvent> {
        let mut out: Vec<AnalyticsEvent> = self.events.iter().rev().filter(|e| keep(e)).take(limit).cloned().collect();
        out.reverse();
        out
    }
}

pub struct InMemoryAnalytics {
    started: DateTime<Utc>,
    capacity: usize,
    state: Mutex<State>,
}

impl Default for InMemoryAnalytics {
    fn default() -> Self {
        Self::with_capacity(MAX_EVENTS)
    }
}

impl InMemoryAnalytics {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { started: Utc::now(), capacity: capacity.max(1), state: Mutex::new(State::default()) }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AnalyticsStore for InMemoryAnalytics {
    fn track(&self, event: AnalyticsEvent) {
        let mut state = self.lock();

        if !state.users.contains_key(&event.user_id) && event.kind != EventKind::UserRegistered {
            let registered = AnalyticsEvent::new(EventKind::UserRegistered, event.user_id, event.username.as_deref())
                .at(event.timestamp);
            state.push(registered, self.capacity);
        }

        let stats = state.users.entry(event.user_id).or_insert_with(|| UserStats {
            user_id: event.user_id,
            username: event.username.clone(),
            total_commands: 0,
            ideas_generated: 0,
            leads_created: 0,
            first_seen: event.timestamp,
            last_seen: event.timestamp,
        });
        stats.last_seen = event.timestamp;
        if event.username.is_some() {
            stats.username = event.username.clone();
        }
        match event.kind {
            EventKind::CommandUsed => stats.total_commands += 1,
            EventKind::IdeaGenerated => stats.ideas_generated += 1,
            EventKind::LeadCreated => stats.leads_created += 1,
            _ => {}
        }

        if event.kind == EventKind::CommandUsed {
            if let Some(command) = event.data.get("command").and_then(Value::as_str) {
                *state.commands.entry(command.to_string()).or_default() += 1;
            }
        }

        debug!("📊 {} from {}", event.kind.as_str(), event.user_id);
        state.push(event, self.capacity);
    }

    fn user_stats(&self, user_id: i64) -> Option<UserStats> {
        self.lock().users.get(&user_id).cloned()
    }

    fn all_user_stats(&self) -> Vec<UserStats> {
        let mut all: Vec<UserStats> = self.lock().users.values().cloned().collect();
        all.sort_by_key(|s| s.user_id);
        all
    }

    fn system_stats(&self, now: DateTime<Utc>) -> SystemStats {
        let state = self.lock();
        let active_since = |delta: TimeDelta| state.users.values().filter(|s| s.last_seen >= now - delta).count();

        let mut top_commands: Vec<CommandCount> = state
            .commands
            .iter()
            .map(|(command, count)| CommandCount { command: command.clone(), count: *count })
            .collect();
        top_commands.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.command.cmp(&b.command)));
        top_commands.truncate(10);

        SystemStats {
            total_users: state.users.len(),
            total_commands: state.count(EventKind::CommandUsed),
            total_ideas: state.count(EventKind::IdeaGenerated),
            total_leads: state.count(EventKind::LeadCreated),
            total_errors: state.count(EventKind::ErrorOccurred),
            uptime_secs: (now - self.started).num_seconds().max(0),
            top_commands,
            active_users_24h: active_since(TimeDelta::hours(24)),
            active_users_7d: active_since(TimeDelta::days(7)),
        }
    }

    fn recent_events(&self, limit: usize) -> Vec<AnalyticsEvent> {
        self.lock().tail(limit, |_| true)
    }

    fn events_by_kind(&self, kind: EventKind, limit: usize) -> Vec<AnalyticsEvent> {
        self.lock().tail(limit, |e| e.kind == kind)
    }

    fn events_by_user(&self, user_id: i64, limit: usize) -> Vec<AnalyticsEvent> {
        self.lock().tail(limit, |e| e.user_id == user_id)
    }

    fn export(&self, now: DateTime<Utc>) -> Value {
        json!({
            "systemStats": self.system_stats(now),
            "userStats": self.all_user_stats(),
            "recentEvents": self.recent_events(50),
        })
    }
}
