//! Outbound CRM sync.
//!
//! Calls are fire-and-forget: callers append to [`CrmQueue`], a spawned
//! dispatcher drains the channel and delivers to HubSpot when a token is
//! configured, otherwise it only logs what would have been sent. Delivery
//! failures are logged and dropped. The queue also keeps a bounded journal
//! of everything enqueued so it can be inspected without a network.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::errors::{AppError, ResultExt};
use crate::models::UserData;

/// Journal entries kept before the oldest are discarded.
pub const JOURNAL_CAPACITY: usize = 10_000;

/// CRM property used as the upsert key.
pub const SESSION_ID_PROPERTY: &str = "quiz_session_id";

pub mod events {
    pub const SECTOR_SELECTED: &str = "sector_selected";
    pub const QUESTION_ANSWERED: &str = "question_answered";
    pub const QUIZ_COMPLETED: &str = "quiz_completed";
    pub const FORM_SHOWN: &str = "form_shown";
    pub const FORM_SUBMITTED: &str = "form_submitted";
    pub const PROFILE_GATE_SHOWN: &str = "profile_gate_shown";
    pub const PROFILE_COMPLETED: &str = "profile_completed";
    pub const SECTION_VIEWED: &str = "section_viewed";
    pub const PDF_DOWNLOADED: &str = "pdf_downloaded";
    pub const SESSION_RESET: &str = "session_reset";
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CrmEvent {
    /// Idempotent merge of a partial contact keyed by session id.
    UpsertContact {
        session_id: String,
        properties: Map<String, Value>,
    },
    TrackEvent {
        session_id: String,
        name: String,
        properties: Map<String, Value>,
        occurred_at: DateTime<Utc>,
    },
}

impl CrmEvent {
    pub fn session_id(&self) -> &str {
        match self {
            CrmEvent::UpsertContact { session_id, .. } => session_id,
            CrmEvent::TrackEvent { session_id, .. } => session_id,
        }
    }

    pub fn event_name(&self) -> Option<&str> {
        match self {
            CrmEvent::TrackEvent { name, .. } => Some(name.as_str()),
            CrmEvent::UpsertContact { .. } => None,
        }
    }
}

/// Append-only outbound queue.
#[derive(Clone)]
pub struct CrmQueue {
    tx: mpsc::UnboundedSender<CrmEvent>,
    journal: Arc<Mutex<VecDeque<CrmEvent>>>,
}

impl CrmQueue {
    /// Creates the queue and the receiving end for [`spawn_dispatcher`].
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CrmEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                journal: Arc::new(Mutex::new(VecDeque::new())),
            },
            rx,
        )
    }

    pub fn enqueue(&self, event: CrmEvent) {
        {
            let mut journal = self.journal.lock().unwrap_or_else(|e| e.into_inner());
            if journal.len() == JOURNAL_CAPACITY {
                journal.pop_front();
            }
            journal.push_back(event.clone());
        }

        if self.tx.send(event).is_err() {
            tracing::warn!("CRM dispatcher stopped, event not delivered");
        }
    }

    pub fn upsert_contact(&self, session_id: &str, user_data: &UserData) {
        self.enqueue(CrmEvent::UpsertContact {
            session_id: session_id.to_string(),
            properties: user_data.to_crm_properties(),
        });
    }

    /// Queues a named event. Non-object `properties` are wrapped under `value`.
    pub fn track(&self, session_id: &str, name: &str, properties: Value) {
        let properties = match properties {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };

        self.enqueue(CrmEvent::TrackEvent {
            session_id: session_id.to_string(),
            name: name.to_string(),
            properties,
            occurred_at: Utc::now(),
        });
    }

    /// Snapshot of the journal, oldest first.
    pub fn events(&self) -> Vec<CrmEvent> {
        let journal = self.journal.lock().unwrap_or_else(|e| e.into_inner());
        journal.iter().cloned().collect()
    }

    pub fn events_for(&self, session_id: &str) -> Vec<CrmEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.session_id() == session_id)
            .collect()
    }

    /// Names of tracked events for one session, in order.
    pub fn event_names_for(&self, session_id: &str) -> Vec<String> {
        self.events_for(session_id)
            .iter()
            .filter_map(|e| e.event_name().map(str::to_string))
            .collect()
    }
}

/// HubSpot HTTP client.
#[derive(Clone)]
pub struct HubSpotClient {
    client: Client,
    base_url: String,
    token: String,
}

impl HubSpotClient {
    pub fn new(base_url: String, token: String) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create HubSpot client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Upserts a contact keyed by the session id property.
    pub async fn upsert_contact(
        &self,
        session_id: &str,
        properties: &Map<String, Value>,
    ) -> Result<(), AppError> {
        let url = format!("{}/crm/v3/objects/contacts/batch/upsert", self.base_url);

        let mut properties = properties.clone();
        properties.insert(SESSION_ID_PROPERTY.to_string(), json!(session_id));

        let body = json!({
            "inputs": [{
                "idProperty": SESSION_ID_PROPERTY,
                "id": session_id,
                "properties": properties
            }]
        });

        self.post(&url, &body, "contact upsert").await
    }

    pub async fn track_event(
        &self,
        session_id: &str,
        name: &str,
        properties: &Map<String, Value>,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let url = format!("{}/events/v3/send", self.base_url);

        let mut properties = properties.clone();
        properties.insert(SESSION_ID_PROPERTY.to_string(), json!(session_id));

        let body = json!({
            "eventName": name,
            "occurredAt": occurred_at.to_rfc3339(),
            "properties": properties
        });

        self.post(&url, &body, "event tracking").await
    }

    pub async fn deliver(&self, event: &CrmEvent) -> Result<(), AppError> {
        match event {
            CrmEvent::UpsertContact {
                session_id,
                properties,
            } => self.upsert_contact(session_id, properties).await,
            CrmEvent::TrackEvent {
                session_id,
                name,
                properties,
                occurred_at,
            } => {
                self.track_event(session_id, name, properties, *occurred_at)
                    .await
            }
        }
    }

    async fn post(&self, url: &str, body: &Value, what: &str) -> Result<(), AppError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(AppError::from)
            .context(format!("HubSpot {} failed", what))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "HubSpot {} returned {}: {}",
                what, status, error_text
            )));
        }

        Ok(())
    }
}

/// Drains the queue until every sender is dropped.
pub async fn run_dispatcher(
    mut rx: mpsc::UnboundedReceiver<CrmEvent>,
    client: Option<HubSpotClient>,
) {
    while let Some(event) = rx.recv().await {
        match &client {
            Some(client) => {
                let delivered = client.deliver(&event).await.with_context(|| {
                    format!("CRM delivery failed for {}", event.session_id())
                });
                if let Err(e) = delivered {
                    tracing::warn!("{}", e);
                }
            }
            None => match &event {
                CrmEvent::UpsertContact {
                    session_id,
                    properties,
                } => {
                    let payload = serde_json::to_string(properties).unwrap_or_default();
                    tracing::info!("[CRM] upsert contact {}: {}", session_id, payload);
                }
                CrmEvent::TrackEvent {
                    session_id, name, ..
                } => {
                    tracing::info!("[CRM] track {} for {}", name, session_id);
                }
            },
        }
    }

    tracing::debug!("CRM dispatcher stopped");
}

pub fn spawn_dispatcher(
    rx: mpsc::UnboundedReceiver<CrmEvent>,
    client: Option<HubSpotClient>,
) -> JoinHandle<()> {
    tokio::spawn(run_dispatcher(rx, client))
}
