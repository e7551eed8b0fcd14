use std::fmt;

/// Errors surfaced by the chat-session core
#[derive(Debug)]
pub enum ClientError {
    /// Attachment rejected before any network call was made
    AttachmentTooLarge {
        filename: String,
        size: u64,
        limit: u64,
    },

    /// Connection-level failure talking to a collaborator
    Transport(String),

    /// Non-2xx response from a collaborator
    Status { status: u16, body: String },

    /// Response body did not decode into the expected shape
    Decode(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::AttachmentTooLarge {
                filename,
                size,
                limit,
            } => write!(
                f,
                "Attachment {} is {} bytes, over the {} byte limit",
                filename, size, limit
            ),
            ClientError::Transport(msg) => write!(f, "Transport error: {}", msg),
            ClientError::Status { status, body } => {
                write!(f, "Request failed with status {}: {}", status, body)
            }
            ClientError::Decode(msg) => write!(f, "Failed to decode response: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

impl ClientError {
    /// Authorization-failure classification driving the single-retry
    /// policy: HTTP 401, or an "unauthorized" marker in the response text.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            ClientError::Status { status: 401, .. } => true,
            ClientError::Status { body, .. } => contains_unauthorized(body),
            ClientError::Transport(msg) | ClientError::Decode(msg) => contains_unauthorized(msg),
            ClientError::AttachmentTooLarge { .. } => false,
        }
    }
}

/// Classification at the orchestration seam, where errors arrive as
/// [`anyhow::Error`]: a typed [`ClientError`] answers directly, anything
/// else falls back to matching the rendered error chain.
pub fn is_unauthorized_error(err: &anyhow::Error) -> bool {
    if let Some(client) = err.downcast_ref::<ClientError>() {
        return client.is_unauthorized();
    }
    contains_unauthorized(&format!("{err:#}"))
}

fn contains_unauthorized(text: &str) -> bool {
    text.to_ascii_lowercase().contains("unauthorized")
}
