//! Bitrix24 lead creation over an incoming webhook.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::ai::provider::truncate_body;
use crate::deadline::with_deadline;

const CRM_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_SOURCE: &str = "TELEGRAM";

/// A prospective customer's contact record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeadData {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub comments: Option<String>,
    /// Bitrix24 `SOURCE_ID`; `TELEGRAM` when unset.
    pub source: Option<String>,
    pub user_id: Option<i64>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CrmError {
    NotConfigured,
    Validation(String),
    Api { status: Option<u16>, message: String },
    Timeout(Duration),
}

impl fmt::Display for CrmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "CRM webhook not configured"),
            Self::Validation(msg) => write!(f, "invalid lead: {msg}"),
            Self::Api { status: Some(status), message } => write!(f, "Bitrix24 HTTP {status}: {message}"),
            Self::Api { status: None, message } => write!(f, "Bitrix24 error: {message}"),
            Self::Timeout(after) => write!(f, "Bitrix24 call timed out after {}ms", after.as_millis()),
        }
    }
}

impl std::error::Error for CrmError {}

/// Where finished contact requests go.
#[async_trait]
pub trait LeadSink: Send + Sync {
    /// Create the lead and return its CRM id.
    async fn create_lead(&self, lead: &LeadData) -> Result<u64, CrmError>;
}

#[derive(Serialize)]
struct LeadRequest<'a> {
    fields: LeadFields<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct LeadFields<'a> {
    title: String,
    name: &'a str,
    source_id: &'a str,
    opened: &'static str,
    assigned_by_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<[Multifield<'a>; 1]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<[Multifield<'a>; 1]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comments: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct Multifield<'a> {
    value: &'a str,
    value_type: &'static str,
}

#[derive(Deserialize)]
struct LeadResponse {
    result: Option<Value>,
    error: Option<String>,
    error_description: Option<String>,
}

fn work(value: &str) -> [Multifield<'_>; 1] {
    [Multifield { value, value_type: "WORK" }]
}

fn lead_fields(lead: &LeadData) -> Result<LeadRequest<'_>, CrmError> {
    let name = lead.name.trim();
    if name.is_empty() {
        return Err(CrmError::Validation("name is required".into()));
    }

    let mut comments = lead.comments.clone().filter(|c| !c.trim().is_empty());
    if let Some(user_id) = lead.user_id {
        let who = match &lead.username {
            Some(username) => format!("Telegram: @{username} (id {user_id})"),
            None => format!("Telegram id {user_id}"),
        };
        comments = Some(match comments {
            Some(c) => format!("{c}\n{who}"),
            None => who,
        });
    }

    Ok(LeadRequest {
        fields: LeadFields {
            title: format!("Заявка от {name}"),
            name,
            source_id: lead.source.as_deref().unwrap_or(DEFAULT_SOURCE),
            opened: "Y",
            assigned_by_id: 1,
            phone: lead.phone.as_deref().map(work),
            email: lead.email.as_deref().map(work),
            comments,
        },
    })
}

/// Pull the lead id out of a webhook response body.
fn parse_lead_id(body: &str) -> Result<u64, CrmError> {
    let response: LeadResponse = serde_json::from_str(body).map_err(|e| CrmError::Api {
        status: None,
        message: format!("malformed response: {e}"),
    })?;

    if let Some(error) = response.error {
        let message = match response.error_description {
            Some(desc) => format!("{error}: {desc}"),
            None => error,
        };
        return Err(CrmError::Api { status: None, message });
    }

    match response.result {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| CrmError::Api { status: None, message: format!("no lead id in {}", truncate_body(body)) })
}

pub struct Bitrix24Client {
    webhook: String,
    http: reqwest::Client,
    timeout: Duration,
}

impl Bitrix24Client {
    pub fn new(webhook: impl Into<String>, http: reqwest::Client) -> Self {
        let mut webhook = webhook.into();
        if !webhook.ends_with('/') {
            webhook.push('/');
        }
        Self { webhook, http, timeout: CRM_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn url(&self, method: &str) -> String {
        format!("{}{method}.json", self.webhook)
    }

    async fn post(&self, request: &LeadRequest<'_>) -> Result<u64, CrmError> {
        let response = self
            .http
            .post(self.url("crm.lead.add"))
            .json(request)
            .send()
            .await
            .map_err(|e| CrmError::Api { status: None, message: e.to_string() })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CrmError::Api { status: Some(status.as_u16()), message: e.to_string() })?;

        if !status.is_success() {
            return Err(CrmError::Api { status: Some(status.as_u16()), message: truncate_body(&body) });
        }
        parse_lead_id(&body)
    }
}

#[async_trait]
impl LeadSink for Bitrix24Client {
    async fn create_lead(&self, lead: &LeadData) -> Result<u64, CrmError> {
        let request = lead_fields(lead)?;
        let id = with_deadline("Bitrix24 lead", self.timeout, self.post(&request))
            .await
            .unwrap_or_else(|d| Err(CrmError::Timeout(d.budget)))
            .inspect_err(|e| warn!("💼 Lead creation failed: {e}"))?;
        info!("💼 Lead created in Bitrix24: ID {id}");
        Ok(id)
    }
}
