//! Collapses the heterogeneous raw payload shapes returned by the
//! conversation backend (and synthesized locally) onto the canonical
//! [`Message`] record. Total over present input: malformed entries degrade
//! to defaults, only an absent entry normalizes to nothing.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::api::{ContentItem, Message, Role, fresh_id};

/// Upstream `content` field. Legacy payloads carry a plain string, current
/// payloads carry a list of typed items.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum RawContent {
    Text(String),
    Items(Vec<ContentItem>),
}

/// Lenient per-field view of one raw transcript entry. A field of the
/// wrong JSON type reads as absent rather than failing the whole entry.
#[derive(Clone, Debug, Default)]
pub struct RawMessage {
    pub id: Option<String>,
    pub role: Option<Role>,
    pub text: Option<String>,
    pub content: Option<RawContent>,
    pub created_at: Option<DateTime<Utc>>,
}

impl RawMessage {
    pub fn from_value(raw: &Value) -> RawMessage {
        let Some(map) = raw.as_object() else {
            return RawMessage::default();
        };
        RawMessage {
            id: map.get("id").and_then(Value::as_str).map(str::to_string),
            role: map.get("role").and_then(Value::as_str).map(Role::from_wire),
            text: map.get("text").and_then(Value::as_str).map(str::to_string),
            content: map
                .get("content")
                .and_then(|v| serde_json::from_value(v.clone()).ok()),
            created_at: map
                .get("createdAt")
                .or_else(|| map.get("created_at"))
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|at| at.with_timezone(&Utc)),
        }
    }

    /// Displayable text, probed in order: explicit `text` field, first
    /// content item tagged as plain text, string-typed `content`, the
    /// `text` of the first element of array-typed `content`. `None` when
    /// no shape carries text.
    pub fn text_value(&self) -> Option<String> {
        if let Some(text) = &self.text {
            return Some(text.clone());
        }
        match &self.content {
            Some(RawContent::Items(items)) => {
                if let Some(text) = items.iter().find_map(ContentItem::as_text) {
                    return Some(text.to_string());
                }
                items.first().and_then(|item| match item {
                    ContentItem::Opaque(value) => {
                        value.get("text").and_then(Value::as_str).map(str::to_string)
                    }
                    _ => None,
                })
            }
            Some(RawContent::Text(text)) => Some(text.clone()),
            None => None,
        }
    }

    /// Canonical record with defaults filled in: generated id, assistant
    /// role, empty text, current time. `content` is rebuilt as a single
    /// text item mirroring `text`; richer content stays with the caller.
    pub fn into_message(self) -> Message {
        let text = self.text_value().unwrap_or_default();
        Message {
            id: self.id.unwrap_or_else(fresh_id),
            role: self.role.unwrap_or_default(),
            content: vec![ContentItem::text(text.clone())],
            text,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        }
    }
}

/// `None` only for an absent (JSON null) entry, never for a present one.
pub fn normalize(raw: &Value) -> Option<Message> {
    if raw.is_null() {
        return None;
    }
    Some(RawMessage::from_value(raw).into_message())
}
