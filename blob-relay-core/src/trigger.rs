//! Event Grid trigger parsing.
//!
//! Storage accounts publish `Microsoft.Storage.BlobCreated` events whose `subject`
//! names the container and blob:
//!
//! ```text
//! /blobServices/default/containers/<container>/blobs/<blob name>
//! ```
//!
//! Webhook subscriptions are confirmed with a one-off
//! `Microsoft.EventGrid.SubscriptionValidationEvent` that must be answered with the
//! validation code it carries.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

pub const BLOB_CREATED: &str = "Microsoft.Storage.BlobCreated";
pub const SUBSCRIPTION_VALIDATION: &str = "Microsoft.EventGrid.SubscriptionValidationEvent";

const SUBJECT_PREFIX: &str = "/blobServices/default/containers/";
const BLOBS_SEGMENT: &str = "/blobs/";

#[derive(Debug)]
pub enum TriggerError {
    Json(serde_json::Error),
    MalformedSubject(String),
    MissingValidationCode,
}

impl fmt::Display for TriggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerError::Json(e) => write!(f, "invalid event payload: {e}"),
            TriggerError::MalformedSubject(s) => write!(f, "unexpected blob event subject: {s}"),
            TriggerError::MissingValidationCode => {
                write!(f, "subscription validation event without validationCode")
            }
        }
    }
}

impl std::error::Error for TriggerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TriggerError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for TriggerError {
    fn from(e: serde_json::Error) -> Self {
        TriggerError::Json(e)
    }
}

/// One event as delivered by Event Grid. Accepts both the Event Grid schema
/// (`eventType`) and the CloudEvents schema (`type`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventGridEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(alias = "type")]
    pub event_type: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub data: Value,
}

/// A blob that appeared in a watched container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlobCreated {
    pub container: String,
    pub name: String,
    pub content_length: Option<u64>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEvent {
    BlobCreated(BlobCreated),
    SubscriptionValidation { validation_code: String },
    Ignored { event_type: String },
}

/// What one delivery asks the relay to do.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TriggerBatch {
    pub validation_code: Option<String>,
    pub created: Vec<BlobCreated>,
}

/// Parse a delivery body. Event Grid posts arrays; a single object is also accepted.
pub fn parse_events(body: &[u8]) -> Result<Vec<EventGridEvent>, TriggerError> {
    let value: Value = serde_json::from_slice(body)?;
    let events = match value {
        Value::Array(_) => serde_json::from_value(value)?,
        other => vec![serde_json::from_value(other)?],
    };
    Ok(events)
}

impl EventGridEvent {
    pub fn classify(&self) -> Result<TriggerEvent, TriggerError> {
        match self.event_type.as_str() {
            BLOB_CREATED => {
                let (container, name) = split_subject(&self.subject)?;
                Ok(TriggerEvent::BlobCreated(BlobCreated {
                    container,
                    name,
                    content_length: self.data.get("contentLength").and_then(Value::as_u64),
                    url: self
                        .data
                        .get("url")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                }))
            }
            SUBSCRIPTION_VALIDATION => {
                let code = self
                    .data
                    .get("validationCode")
                    .and_then(Value::as_str)
                    .ok_or(TriggerError::MissingValidationCode)?;
                Ok(TriggerEvent::SubscriptionValidation {
                    validation_code: code.to_string(),
                })
            }
            other => Ok(TriggerEvent::Ignored {
                event_type: other.to_string(),
            }),
        }
    }
}

/// Reduce a delivery to the blobs created in `source_container` and an optional
/// validation code.
pub fn interpret(
    events: &[EventGridEvent],
    source_container: &str,
) -> Result<TriggerBatch, TriggerError> {
    let mut batch = TriggerBatch::default();
    for event in events {
        match event.classify()? {
            TriggerEvent::BlobCreated(created) if created.container == source_container => {
                info!(
                    container = %created.container,
                    blob = %created.name,
                    content_length = ?created.content_length,
                    "Blob created event"
                );
                batch.created.push(created);
            }
            TriggerEvent::BlobCreated(created) => {
                debug!(
                    container = %created.container,
                    blob = %created.name,
                    "Ignoring blob created in unwatched container"
                );
            }
            TriggerEvent::SubscriptionValidation { validation_code } => {
                info!(event_id = ?event.id, "Subscription validation event");
                batch.validation_code = Some(validation_code);
            }
            TriggerEvent::Ignored { event_type } => {
                debug!(event_type = %event_type, "Ignoring event type");
            }
        }
    }
    Ok(batch)
}

fn split_subject(subject: &str) -> Result<(String, String), TriggerError> {
    let parsed = subject
        .strip_prefix(SUBJECT_PREFIX)
        .and_then(|rest| rest.split_once(BLOBS_SEGMENT))
        .filter(|(container, name)| !container.is_empty() && !name.is_empty());
    match parsed {
        Some((container, name)) => Ok((container.to_string(), name.to_string())),
        None => {
            warn!(subject, "Blob event subject does not name a container and blob");
            Err(TriggerError::MalformedSubject(subject.to_string()))
        }
    }
}
