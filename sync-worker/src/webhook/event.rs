//! Decoding of verified webhook bodies into typed events.
//!
//! Only `user.created` and `user.updated` carry a user payload we act on.
//! Every other event type is accepted and passed through untouched.

use serde::Deserialize;
use tracing::info;

use crate::error::WebhookError;

pub const USER_CREATED: &str = "user.created";
pub const USER_UPDATED: &str = "user.updated";

/// Discriminant of a verified event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    UserCreated,
    UserUpdated,
    Other,
}

/// User fields carried by `user.*` events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserData {
    pub external_user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// A body that passed signature verification and decoded cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifiedEvent {
    UserCreated(UserData),
    UserUpdated(UserData),
    /// Any other event type; carries the raw type string for logging.
    Other { event_type: String },
}

impl VerifiedEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            VerifiedEvent::UserCreated(_) => EventKind::UserCreated,
            VerifiedEvent::UserUpdated(_) => EventKind::UserUpdated,
            VerifiedEvent::Other { .. } => EventKind::Other,
        }
    }

    pub fn user(&self) -> Option<&UserData> {
        match self {
            VerifiedEvent::UserCreated(user) | VerifiedEvent::UserUpdated(user) => Some(user),
            VerifiedEvent::Other { .. } => None,
        }
    }

    pub fn event_type(&self) -> &str {
        match self {
            VerifiedEvent::UserCreated(_) => USER_CREATED,
            VerifiedEvent::UserUpdated(_) => USER_UPDATED,
            VerifiedEvent::Other { event_type } => event_type,
        }
    }
}

// =============================================================================
// Wire shapes
// =============================================================================

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct RawUser {
    id: String,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    primary_email_address_id: Option<String>,
    email_addresses: Vec<RawEmailAddress>,
}

#[derive(Deserialize)]
struct RawEmailAddress {
    #[serde(default)]
    id: Option<String>,
    email_address: String,
}

/// Decode a verified body.
///
/// Fails with `MalformedPayload` if the body is not a JSON object with a
/// string `type`, or if a `user.*` event lacks `data.id` or an email address.
pub fn parse(raw_body: &[u8]) -> Result<VerifiedEvent, WebhookError> {
    let raw: RawEvent = serde_json::from_slice(raw_body)
        .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

    let event = match raw.event_type.as_str() {
        USER_CREATED => VerifiedEvent::UserCreated(parse_user(raw.data)?),
        USER_UPDATED => VerifiedEvent::UserUpdated(parse_user(raw.data)?),
        _ => VerifiedEvent::Other {
            event_type: raw.event_type,
        },
    };

    info!(
        event_type = event.event_type(),
        user_id = event.user().map(|u| u.external_user_id.as_str()).unwrap_or(""),
        "webhook_event_parsed"
    );

    Ok(event)
}

fn parse_user(data: serde_json::Value) -> Result<UserData, WebhookError> {
    let raw: RawUser = serde_json::from_value(data)
        .map_err(|e| WebhookError::MalformedPayload(format!("data: {e}")))?;

    if raw.id.trim().is_empty() {
        return Err(WebhookError::MalformedPayload("data.id is empty".to_string()));
    }

    let email = pick_email(&raw)
        .ok_or_else(|| WebhookError::MalformedPayload("data.email_addresses is empty".to_string()))?;

    Ok(UserData {
        email,
        external_user_id: raw.id,
        first_name: raw.first_name.unwrap_or_default(),
        last_name: raw.last_name.unwrap_or_default(),
    })
}

/// The primary address if it is listed, otherwise the first one.
fn pick_email(raw: &RawUser) -> Option<String> {
    let primary = raw.primary_email_address_id.as_deref().and_then(|primary_id| {
        raw.email_addresses
            .iter()
            .find(|e| e.id.as_deref() == Some(primary_id))
    });

    primary
        .or_else(|| raw.email_addresses.first())
        .map(|e| e.email_address.clone())
}
