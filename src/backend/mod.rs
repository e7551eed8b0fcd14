//! Collaborator contracts behind the chat session: credentials, identity,
//! object storage, ingestion and the conversation itself. The controller
//! only ever talks to [`ChatBackend`]; [`HttpBackend`] is the deployed
//! implementation rooted at the embedding application's base URL.

pub mod api;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};

use crate::client::Client;
use api::{
    ConversationSnapshot, CredentialGrant, CurrentUser, IngestRequest, IngestedFile,
    OutgoingMessage, PresignGrant, PresignRequest, SendReply,
};

/// Objects uploaded to presigned locations are stored encrypted at rest.
const ENCRYPTION_HEADER: &str = "x-amz-server-side-encryption";

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Fetches a fresh credential. Never served from a cache.
    async fn fetch_credential(&self) -> anyhow::Result<CredentialGrant>;

    /// Current-user lookup; an unauthenticated response surfaces as an
    /// unauthorized error for the embedding shell to act on.
    async fn current_user(&self) -> anyhow::Result<CurrentUser>;

    async fn presign_upload(&self, request: &PresignRequest) -> anyhow::Result<PresignGrant>;

    /// Direct PUT of the raw file bytes to the presigned location.
    async fn upload_bytes(&self, grant: &PresignGrant, body: Bytes) -> anyhow::Result<()>;

    /// Registers the uploaded object; may block until indexing completes.
    async fn ingest_file(&self, request: &IngestRequest) -> anyhow::Result<IngestedFile>;

    async fn send_message(
        &self,
        token: &str,
        request: &OutgoingMessage,
    ) -> anyhow::Result<SendReply>;

    async fn load_conversation(&self, token: &str) -> anyhow::Result<ConversationSnapshot>;

    async fn reset_conversation(&self, token: &str) -> anyhow::Result<ConversationSnapshot>;
}

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpBackend {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn session_url(&self) -> String {
        format!("{}/api/assistant/session", self.base_url)
    }

    fn me_url(&self) -> String {
        format!("{}/api/me", self.base_url)
    }

    fn presign_url(&self) -> String {
        format!("{}/api/uploads/presign", self.base_url)
    }

    fn ingest_url(&self) -> String {
        format!("{}/api/uploads/ingest", self.base_url)
    }

    fn messages_url(&self) -> String {
        format!("{}/api/conversation/messages", self.base_url)
    }

    fn conversation_url(&self) -> String {
        format!("{}/api/conversation", self.base_url)
    }

    fn reset_url(&self) -> String {
        format!("{}/api/conversation/reset", self.base_url)
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn fetch_credential(&self) -> anyhow::Result<CredentialGrant> {
        Ok(self.client.get(self.session_url(), None).await?)
    }

    async fn current_user(&self) -> anyhow::Result<CurrentUser> {
        Ok(self.client.get(self.me_url(), None).await?)
    }

    async fn presign_upload(&self, request: &PresignRequest) -> anyhow::Result<PresignGrant> {
        Ok(self.client.post(self.presign_url(), None, request).await?)
    }

    async fn upload_bytes(&self, grant: &PresignGrant, body: Bytes) -> anyhow::Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(&grant.content_type)?);
        headers.insert(ENCRYPTION_HEADER, HeaderValue::from_static("AES256"));
        self.client
            .put_bytes(grant.upload_url.as_str(), headers, body)
            .await?;
        Ok(())
    }

    async fn ingest_file(&self, request: &IngestRequest) -> anyhow::Result<IngestedFile> {
        Ok(self.client.post(self.ingest_url(), None, request).await?)
    }

    async fn send_message(
        &self,
        token: &str,
        request: &OutgoingMessage,
    ) -> anyhow::Result<SendReply> {
        Ok(self
            .client
            .post(self.messages_url(), Some(token), request)
            .await?)
    }

    async fn load_conversation(&self, token: &str) -> anyhow::Result<ConversationSnapshot> {
        Ok(self.client.get(self.conversation_url(), Some(token)).await?)
    }

    async fn reset_conversation(&self, token: &str) -> anyhow::Result<ConversationSnapshot> {
        Ok(self
            .client
            .post(self.reset_url(), Some(token), &serde_json::json!({}))
            .await?)
    }
}
