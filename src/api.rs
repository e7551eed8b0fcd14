use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[default]
    Assistant,
    Tool,
    System,
}

impl Role {
    /// Lenient parse for upstream payloads. A message with an unknown or
    /// missing origin is read as backend-authored, never as the user.
    pub fn from_wire(value: &str) -> Role {
        match value.to_ascii_lowercase().as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "tool" => Role::Tool,
            "system" => Role::System,
            _ => Role::Assistant,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KnownItem {
    Text {
        text: String,
    },
    ContextFile {
        file_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    InputFile {
        file_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

/// One entry of a message's `content` sequence. Anything that is not a
/// recognized text or file-reference item is carried verbatim as an opaque
/// payload (tool exchanges and the like), so decoding upstream content
/// never fails.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ContentItem {
    Known(KnownItem),
    Opaque(serde_json::Value),
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        ContentItem::Known(KnownItem::Text { text: text.into() })
    }

    pub fn context_file(file_id: impl Into<String>, name: Option<String>) -> Self {
        ContentItem::Known(KnownItem::ContextFile {
            file_id: file_id.into(),
            name,
        })
    }

    pub fn input_file(file_id: impl Into<String>, name: Option<String>) -> Self {
        ContentItem::Known(KnownItem::InputFile {
            file_id: file_id.into(),
            name,
        })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentItem::Known(KnownItem::Text { text }) => Some(text),
            _ => None,
        }
    }

    /// Identifier of the referenced file for file-reference items.
    pub fn file_id(&self) -> Option<&str> {
        match self {
            ContentItem::Known(KnownItem::ContextFile { file_id, .. }) => Some(file_id),
            ContentItem::Known(KnownItem::InputFile { file_id, .. }) => Some(file_id),
            _ => None,
        }
    }
}

/// Canonical transcript entry, independent of upstream payload shape.
///
/// Two messages with the same `id` are the same logical message; the
/// transcript layer overwrites rather than duplicates on a repeated id.
/// `content` always holds at least a text item mirroring `text`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub content: Vec<ContentItem>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        let text = text.into();
        Message {
            id: fresh_id(),
            role,
            content: vec![ContentItem::text(text.clone())],
            text,
            created_at: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    /// Locally composed user message carrying already-assembled outgoing
    /// content (text plus staged file references), inserted into the
    /// transcript before the server confirms it.
    pub fn draft(text: impl Into<String>, content: Vec<ContentItem>) -> Self {
        let text = text.into();
        let content = if content.is_empty() {
            vec![ContentItem::text(text.clone())]
        } else {
            content
        };
        Message {
            id: fresh_id(),
            role: Role::User,
            text,
            content,
            created_at: Utc::now(),
        }
    }

    /// First plain-text item of `content`, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(ContentItem::as_text)
    }
}

/// Generated message identifier; every normalized message must be mergeable.
pub fn fresh_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
