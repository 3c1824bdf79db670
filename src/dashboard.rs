//! Read-only HTTP dashboard over the analytics and monitoring stores.
//!
//! `GET /health` is open. `GET /dashboard?action=...` requires
//! `Authorization: Bearer <token>` when a token is configured.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::store::{AnalyticsStore, EventKind, MonitoringStore, Severity};

const DEFAULT_LIMIT: usize = 100;

#[derive(Clone)]
pub struct DashboardState {
    pub analytics: Arc<dyn AnalyticsStore>,
    pub monitoring: Arc<dyn MonitoringStore>,
    pub token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DashboardQuery {
    action: Option<String>,
    user_id: Option<i64>,
    limit: Option<usize>,
    #[serde(rename = "type")]
    kind: Option<String>,
    severity: Option<String>,
}

/// A JSON error body with its status.
struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

fn bad_request(msg: impl Into<String>) -> ApiError {
    ApiError(StatusCode::BAD_REQUEST, msg.into())
}

pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/dashboard", get(dashboard))
        .with_state(state)
}

/// Bind and serve until the listener fails.
pub async fn serve(addr: SocketAddr, state: DashboardState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("📊 Dashboard listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "timestamp": Utc::now() }))
}

fn authorized(headers: &HeaderMap, token: Option<&str>) -> bool {
    let Some(token) = token else {
        return true;
    };
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|given| given == token)
}

async fn dashboard(
    State(state): State<DashboardState>,
    headers: HeaderMap,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<Value>, ApiError> {
    if !authorized(&headers, state.token.as_deref()) {
        warn!("📊 Unauthorized dashboard request");
        return Err(ApiError(StatusCode::UNAUTHORIZED, "Unauthorized".into()));
    }

    let analytics = state.analytics.as_ref();
    let monitoring = state.monitoring.as_ref();
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    let now = Utc::now();

    let body = match query.action.as_deref() {
        Some("system-stats") => json!(analytics.system_stats(now)),
        Some("user-stats") => match query.user_id {
            Some(user_id) => match analytics.user_stats(user_id) {
                Some(stats) => json!(stats),
                None => return Err(ApiError(StatusCode::NOT_FOUND, format!("User {user_id} not found"))),
            },
            None => json!(analytics.all_user_stats()),
        },
        Some("recent-events") => json!(analytics.recent_events(limit)),
        Some("events-by-type") => {
            let raw = query.kind.as_deref().ok_or_else(|| bad_request("Missing type parameter"))?;
            let kind = EventKind::parse(raw).ok_or_else(|| bad_request(format!("Unknown event type: {raw}")))?;
            json!(analytics.events_by_kind(kind, limit))
        }
        Some("events-by-user") => {
            let user_id = query.user_id.ok_or_else(|| bad_request("Missing userId parameter"))?;
            json!(analytics.events_by_user(user_id, limit))
        }
        Some("export") => analytics.export(now),
        Some("health") => {
            let mut health = json!(monitoring.health(now));
            health["version"] = json!(env!("CARGO_PKG_VERSION"));
            health
        }
        Some("errors") => match query.severity.as_deref() {
            Some(raw) => {
                let severity = Severity::parse(raw).ok_or_else(|| bad_request(format!("Unknown severity: {raw}")))?;
                json!(monitoring.errors_by_severity(severity, limit))
            }
            None => json!(monitoring.recent_errors(limit)),
        },
        Some("error-stats") => json!(monitoring.error_stats(now)),
        Some("monitoring-export") => monitoring.export(now),
        Some(other) => return Err(bad_request(format!("Unknown action: {other}"))),
        None => endpoint_listing(),
    };

    Ok(Json(body))
}

fn endpoint_listing() -> Value {
    json!({
        "message": "Tokobot analytics dashboard",
        "endpoints": {
            "systemStats": "/dashboard?action=system-stats",
            "userStats": "/dashboard?action=user-stats&userId=<id>",
            "allUserStats": "/dashboard?action=user-stats",
            "recentEvents": "/dashboard?action=recent-events&limit=<n>",
            "eventsByType": "/dashboard?action=events-by-type&type=<type>",
            "eventsByUser": "/dashboard?action=events-by-user&userId=<id>",
            "export": "/dashboard?action=export",
            "health": "/dashboard?action=health",
            "errors": "/dashboard?action=errors&limit=<n>&severity=<severity>",
            "errorStats": "/dashboard?action=error-stats",
            "monitoringExport": "/dashboard?action=monitoring-export",
        },
        "eventTypes": EventKind::ALL.iter().map(EventKind::as_str).collect::<Vec<_>>(),
        "severities": Severity::ALL.iter().map(Severity::as_str).collect::<Vec<_>>(),
    })
}
