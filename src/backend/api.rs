//! Wire shapes for the collaborator endpoints. Field spellings follow the
//! services as deployed: the session, storage and conversation endpoints
//! speak camelCase, the ingestion service snake_case.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attachment::StagedAttachment;

/// `{clientToken, publicKey}` from the credential endpoint.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialGrant {
    pub client_token: String,
    #[serde(default)]
    pub public_key: String,
}

/// Minimal profile from the identity collaborator.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Request for a presigned write location.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PresignRequest {
    pub filename: String,
    pub mime: String,
    pub size: u64,
}

/// `{uploadUrl, objectKey, contentType}` presigned write location. The
/// upload PUTs raw bytes straight to `upload_url` with `content_type`.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignGrant {
    pub upload_url: String,
    pub object_key: String,
    pub content_type: String,
}

/// Registers an uploaded object with the ingestion service.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    pub object_key: String,
    pub filename: String,
}

/// `{file_id, content_type, category?}` from ingestion; exactly the
/// metadata the categorizer and stager consume.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct IngestedFile {
    pub file_id: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// Outgoing send payload: `{text, staged_file_ids, staged_files}`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OutgoingMessage {
    pub text: String,
    pub staged_file_ids: Vec<String>,
    pub staged_files: Vec<StagedAttachment>,
}

/// The send endpoint answers with either one normalized-shape message or
/// a full replacement transcript. Both shapes occur in practice, so the
/// union is discriminated by JSON type alone.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum SendReply {
    Transcript(Vec<Value>),
    Message(Value),
}

/// `{conversation: [...], conversationId?}` from the conversation
/// endpoints. Entries stay raw; normalization happens at the transcript.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSnapshot {
    #[serde(default)]
    pub conversation: Vec<Value>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}
