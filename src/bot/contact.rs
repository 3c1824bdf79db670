//! `/contact` conversation: name, phone and email, then a CRM lead.
//!
//! ```text
//! /contact ─► AwaitingName ─► AwaitingPhone ─► AwaitingEmail ─► submit
//! ```
//!
//! Phone and email accept the skip word. State is per user and is cleared on
//! submission whether the CRM call succeeds or not.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};

use regex::Regex;
use tracing::{debug, info, warn};

use crate::bot::texts;
use crate::bot::Sender;
use crate::crm::{CrmError, LeadData, LeadSink};

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

pub fn is_valid_email(s: &str) -> bool {
    EMAIL.is_match(s)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    AwaitingName,
    AwaitingPhone { name: String },
    AwaitingEmail { name: String, phone: Option<String> },
}

/// Result of feeding one message into the flow.
#[derive(Debug, Clone, PartialEq)]
pub enum ContactOutcome {
    /// The flow continues; send this prompt.
    Prompt(String),
    Submitted(u64),
    CrmFailed(CrmError),
}

impl ContactOutcome {
    pub fn reply_text(&self) -> String {
        match self {
            Self::Prompt(text) => text.clone(),
            Self::Submitted(_) => texts::CONTACT_DONE.to_string(),
            Self::CrmFailed(_) => texts::CONTACT_CRM_FAILED.to_string(),
        }
    }
}

pub struct ContactFlow {
    sink: Option<Arc<dyn LeadSink>>,
    states: Mutex<HashMap<i64, Step>>,
}

impl ContactFlow {
    pub fn new(sink: Option<Arc<dyn LeadSink>>) -> Self {
        Self { sink, states: Mutex::new(HashMap::new()) }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn is_active(&self, user_id: i64) -> bool {
        self.lock().contains_key(&user_id)
    }

    /// Begin (or restart) the flow and return the first prompt.
    pub fn start(&self, user_id: i64) -> &'static str {
        if !self.is_enabled() {
            return texts::CONTACT_UNAVAILABLE;
        }
        self.lock().insert(user_id, Step::AwaitingName);
        debug!("Contact flow started for {user_id}");
        texts::CONTACT_ASK_NAME
    }

    pub fn cancel(&self, user_id: i64) {
        self.lock().remove(&user_id);
    }

    /// Feed a text message. `None` when the user has no flow in progress.
    pub async fn handle_text(&self, user: &Sender, text: &str) -> Option<ContactOutcome> {
        let text = text.trim();
        let lead = {
            let mut states = self.lock();
            let step = states.get_mut(&user.id)?;
            match step {
                Step::AwaitingName => {
                    if text.is_empty() {
                        return Some(ContactOutcome::Prompt(texts::CONTACT_EMPTY_NAME.to_string()));
                    }
                    *step = Step::AwaitingPhone { name: text.to_string() };
                    return Some(ContactOutcome::Prompt(texts::contact_ask_phone(text)));
                }
                Step::AwaitingPhone { name } => {
                    let phone = optional(text);
                    *step = Step::AwaitingEmail { name: std::mem::take(name), phone };
                    return Some(ContactOutcome::Prompt(texts::CONTACT_ASK_EMAIL.to_string()));
                }
                Step::AwaitingEmail { name, phone } => {
                    let email = optional(text);
                    if email.as_deref().is_some_and(|e| !is_valid_email(e)) {
                        return Some(ContactOutcome::Prompt(texts::CONTACT_BAD_EMAIL.to_string()));
                    }
                    let lead = LeadData {
                        name: std::mem::take(name),
                        phone: phone.take(),
                        email,
                        user_id: Some(user.id),
                        username: user.username.clone(),
                        ..Default::default()
                    };
                    states.remove(&user.id);
                    lead
                }
            }
        };

        let Some(sink) = &self.sink else {
            return Some(ContactOutcome::CrmFailed(CrmError::NotConfigured));
        };
        Some(match sink.create_lead(&lead).await {
            Ok(id) => {
                info!("💼 Contact request from {} submitted as lead {id}", user.id);
                ContactOutcome::Submitted(id)
            }
            Err(e) => {
                warn!("💼 Contact request from {} not submitted: {e}", user.id);
                ContactOutcome::CrmFailed(e)
            }
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i64, Step>> {
        self.states.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn optional(text: &str) -> Option<String> {
    if text.is_empty() || text.to_lowercase() == texts::SKIP_WORD {
        None
    } else {
        Some(text.to_string())
    }
}
