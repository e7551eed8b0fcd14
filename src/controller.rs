//! Session controller wiring the transcript, the attachment stage and the
//! credential manager to one backend. Every user-facing operation lives
//! here: compose and send, attach and remove files, reset, reload. State
//! changes are pushed over an event channel so the embedding surface can
//! re-render without polling.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, info, warn};

use crate::api::Message;
use crate::attachment::{AttachmentStager, StagedAttachment, StagedFileInfo};
use crate::backend::ChatBackend;
use crate::backend::api::{
    CurrentUser, IngestRequest, OutgoingMessage, PresignRequest, SendReply,
};
use crate::config::ClientConfig;
use crate::credentials::{Credential, SessionCredentialManager};
use crate::error::ClientError;
use crate::transcript::Transcript;

/// Pushed to the embedding surface whenever controller state changes.
/// Payloads are full snapshots, not deltas; rendering is a pure function
/// of the latest event of each kind.
#[derive(Clone, Debug, PartialEq)]
pub enum ControllerEvent {
    TranscriptChanged(Vec<Message>),
    AttachmentsChanged(Vec<StagedAttachment>),
    SessionRefreshed { expires_at: Option<DateTime<Utc>> },
    Error(String),
}

/// One coherent view of session state, for debug panes and tests.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    pub messages: Vec<Message>,
    pub attachments: Vec<StagedAttachment>,
    pub conversation_id: Option<String>,
    pub credential_expires_at: Option<DateTime<Utc>>,
}

pub struct ChatController {
    transcript: Transcript,
    stager: AttachmentStager,
    credentials: SessionCredentialManager,
    backend: Arc<dyn ChatBackend>,
    events: UnboundedSender<ControllerEvent>,
    config: ClientConfig,
    conversation_id: Option<String>,
}

impl ChatController {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        config: ClientConfig,
    ) -> (Self, UnboundedReceiver<ControllerEvent>) {
        let (events, receiver) = unbounded_channel();
        let controller = ChatController {
            transcript: Transcript::new(),
            stager: AttachmentStager::new(config.routes.clone()),
            credentials: SessionCredentialManager::new(backend.clone()),
            backend,
            events,
            config,
            conversation_id: None,
        };
        (controller, receiver)
    }

    pub fn messages(&self) -> &[Message] {
        self.transcript.messages()
    }

    pub fn attachments(&self) -> &[StagedAttachment] {
        self.stager.entries()
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credentials.current()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            messages: self.transcript.messages().to_vec(),
            attachments: self.stager.entries().to_vec(),
            conversation_id: self.conversation_id.clone(),
            credential_expires_at: self.credentials.current().and_then(|c| c.expires_at),
        }
    }

    /// Host surface is up; refresh the credential ahead of the first
    /// request instead of paying the retry on it.
    pub async fn on_ready(&mut self) -> anyhow::Result<()> {
        self.credentials.ensure_fresh().await?;
        self.emit_session();
        Ok(())
    }

    /// A token for the embedding surface itself. Always freshly fetched.
    pub async fn client_secret(&mut self) -> anyhow::Result<String> {
        let credential = self.credentials.fetch().await?;
        self.emit(ControllerEvent::SessionRefreshed {
            expires_at: credential.expires_at,
        });
        Ok(credential.token)
    }

    pub async fn current_user(&self) -> anyhow::Result<CurrentUser> {
        self.backend.current_user().await
    }

    /// Sends `text` together with every staged attachment. The composed
    /// user message is inserted optimistically before the request; on
    /// failure exactly that entry is removed again and the stage is kept
    /// so a retry resends the same attachments. Only a successful send
    /// clears the stage.
    pub async fn send(&mut self, text: impl Into<String>) -> anyhow::Result<()> {
        let text = text.into();
        if text.is_empty() && self.stager.is_empty() {
            return Ok(());
        }

        let draft = Message::draft(text.clone(), self.stager.to_outgoing_content(&text));
        let draft_id = draft.id.clone();
        self.transcript.insert(draft);
        self.emit_transcript();

        let request = OutgoingMessage {
            text,
            staged_file_ids: self.stager.file_ids(),
            staged_files: self.stager.entries().to_vec(),
        };
        info!(attachments = request.staged_file_ids.len(), "Sending message");

        let backend = self.backend.clone();
        let result = self
            .credentials
            .with_auth_retry(|token| {
                let backend = backend.clone();
                let request = &request;
                async move { backend.send_message(&token, request).await }
            })
            .await;

        match result {
            Ok(reply) => {
                match reply {
                    SendReply::Message(value) => self.transcript.merge(&[value]),
                    SendReply::Transcript(values) => self.transcript.replace(&values),
                }
                self.stager.clear();
                self.emit_transcript();
                self.emit_attachments();
                self.emit_session();
                Ok(())
            }
            Err(err) => {
                self.transcript.remove(&draft_id);
                self.emit_transcript();
                // the retry loop may still have stored a fresh credential
                self.emit_session();
                self.emit(ControllerEvent::Error(format!("{err:#}")));
                Err(err)
            }
        }
    }

    /// Uploads one file and stages it for the next send: size check,
    /// presign, direct PUT, ingest, stage. Nothing is staged unless every
    /// step succeeded.
    pub async fn attach(
        &mut self,
        filename: impl Into<String>,
        mime: impl Into<String>,
        body: Bytes,
    ) -> anyhow::Result<StagedAttachment> {
        let result = Self::upload_one(
            self.backend.clone(),
            self.config.upload.max_bytes,
            filename.into(),
            mime.into(),
            body,
        )
        .await;
        match result {
            Ok((file_id, info)) => {
                let entry = self.stager.add(file_id, info).clone();
                info!(file_id = %entry.file_id, category = ?entry.category, "Staged attachment");
                self.emit_attachments();
                Ok(entry)
            }
            Err(err) => {
                self.emit(ControllerEvent::Error(format!("{err:#}")));
                Err(err)
            }
        }
    }

    /// Uploads several files concurrently; the uploads are independent of
    /// each other. Every file that made it through is staged in call
    /// order, then the first failure, if any, is reported.
    pub async fn attach_many(
        &mut self,
        files: Vec<(String, String, Bytes)>,
    ) -> anyhow::Result<Vec<StagedAttachment>> {
        let uploads = files.into_iter().map(|(filename, mime, body)| {
            Self::upload_one(
                self.backend.clone(),
                self.config.upload.max_bytes,
                filename,
                mime,
                body,
            )
        });
        let results = join_all(uploads).await;

        let mut staged = Vec::new();
        let mut first_err = None;
        for result in results {
            match result {
                Ok((file_id, info)) => staged.push(self.stager.add(file_id, info).clone()),
                Err(err) => {
                    warn!(error = %err, "Attachment upload failed");
                    self.emit(ControllerEvent::Error(format!("{err:#}")));
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                }
            }
        }
        if !staged.is_empty() {
            self.emit_attachments();
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(staged),
        }
    }

    pub fn remove_attachment(&mut self, file_id: &str) -> Option<StagedAttachment> {
        let removed = self.stager.remove(file_id);
        if removed.is_some() {
            self.emit_attachments();
        }
        removed
    }

    /// Starts a fresh conversation on the server and mirrors it locally:
    /// the transcript and the stage both empty out.
    pub async fn reset(&mut self) -> anyhow::Result<()> {
        let backend = self.backend.clone();
        let snapshot = self
            .credentials
            .with_auth_retry(|token| {
                let backend = backend.clone();
                async move { backend.reset_conversation(&token).await }
            })
            .await?;
        info!("Conversation reset");
        self.conversation_id = snapshot.conversation_id;
        self.transcript.replace(&snapshot.conversation);
        self.stager.clear();
        self.emit_transcript();
        self.emit_attachments();
        self.emit_session();
        Ok(())
    }

    /// Pulls the server transcript and merges it over local state. Local
    /// entries the server does not know yet survive.
    pub async fn load(&mut self) -> anyhow::Result<()> {
        let backend = self.backend.clone();
        let snapshot = self
            .credentials
            .with_auth_retry(|token| {
                let backend = backend.clone();
                async move { backend.load_conversation(&token).await }
            })
            .await?;
        debug!(entries = snapshot.conversation.len(), "Loaded conversation");
        self.conversation_id = snapshot.conversation_id;
        self.transcript.merge(&snapshot.conversation);
        self.emit_transcript();
        self.emit_session();
        Ok(())
    }

    async fn upload_one(
        backend: Arc<dyn ChatBackend>,
        max_bytes: u64,
        filename: String,
        mime: String,
        body: Bytes,
    ) -> anyhow::Result<(String, StagedFileInfo)> {
        let size = body.len() as u64;
        if size > max_bytes {
            return Err(ClientError::AttachmentTooLarge {
                filename,
                size,
                limit: max_bytes,
            }
            .into());
        }

        let grant = backend
            .presign_upload(&PresignRequest {
                filename: filename.clone(),
                mime: mime.clone(),
                size,
            })
            .await?;
        backend.upload_bytes(&grant, body).await?;
        let ingested = backend
            .ingest_file(&IngestRequest {
                object_key: grant.object_key,
                filename: filename.clone(),
            })
            .await?;

        let content_type = if ingested.content_type.is_empty() {
            mime
        } else {
            ingested.content_type
        };
        Ok((
            ingested.file_id,
            StagedFileInfo {
                filename: Some(filename),
                content_type: Some(content_type),
                category: ingested.category,
            },
        ))
    }

    fn emit(&self, event: ControllerEvent) {
        let _ = self.events.send(event);
    }

    fn emit_transcript(&self) {
        self.emit(ControllerEvent::TranscriptChanged(
            self.transcript.messages().to_vec(),
        ));
    }

    fn emit_attachments(&self) {
        self.emit(ControllerEvent::AttachmentsChanged(
            self.stager.entries().to_vec(),
        ));
    }

    fn emit_session(&self) {
        if let Some(credential) = self.credentials.current() {
            self.emit(ControllerEvent::SessionRefreshed {
                expires_at: credential.expires_at,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Role;
    use crate::backend::api::{
        ConversationSnapshot, CredentialGrant, IngestedFile, PresignGrant,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedBackend {
        fetches: Mutex<u32>,
        calls: Mutex<Vec<&'static str>>,
        send_script: Mutex<VecDeque<anyhow::Result<SendReply>>>,
        ingest_category: Option<String>,
        conversation: Vec<serde_json::Value>,
    }

    impl ScriptedBackend {
        fn new() -> Self {
            ScriptedBackend {
                fetches: Mutex::new(0),
                calls: Mutex::new(Vec::new()),
                send_script: Mutex::new(VecDeque::new()),
                ingest_category: None,
                conversation: Vec::new(),
            }
        }

        fn with_send(self, result: anyhow::Result<SendReply>) -> Self {
            self.send_script.lock().unwrap().push_back(result);
            self
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, name: &'static str) {
            self.calls.lock().unwrap().push(name);
        }
    }

    fn assistant_reply(id: &str, text: &str) -> SendReply {
        SendReply::Message(json!({"id": id, "role": "assistant", "text": text}))
    }

    fn unauthorized() -> anyhow::Error {
        ClientError::Status {
            status: 401,
            body: "unauthorized".to_string(),
        }
        .into()
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn fetch_credential(&self) -> anyhow::Result<CredentialGrant> {
            *self.fetches.lock().unwrap() += 1;
            Ok(CredentialGrant {
                client_token: "tok".to_string(),
                public_key: "pk".to_string(),
            })
        }

        async fn current_user(&self) -> anyhow::Result<CurrentUser> {
            Ok(CurrentUser {
                id: "u1".to_string(),
                display_name: Some("Avery".to_string()),
                email: None,
            })
        }

        async fn presign_upload(&self, request: &PresignRequest) -> anyhow::Result<PresignGrant> {
            self.record("presign");
            Ok(PresignGrant {
                upload_url: "https://bucket.example.com/obj-1".to_string(),
                object_key: "obj-1".to_string(),
                content_type: request.mime.clone(),
            })
        }

        async fn upload_bytes(&self, _: &PresignGrant, _: Bytes) -> anyhow::Result<()> {
            self.record("upload");
            Ok(())
        }

        async fn ingest_file(&self, _: &IngestRequest) -> anyhow::Result<IngestedFile> {
            self.record("ingest");
            Ok(IngestedFile {
                file_id: "file-1".to_string(),
                content_type: "application/pdf".to_string(),
                category: self.ingest_category.clone(),
            })
        }

        async fn send_message(
            &self,
            _: &str,
            _: &OutgoingMessage,
        ) -> anyhow::Result<SendReply> {
            self.record("send");
            self.send_script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(assistant_reply("srv-1", "fallback")))
        }

        async fn load_conversation(&self, _: &str) -> anyhow::Result<ConversationSnapshot> {
            self.record("load");
            Ok(ConversationSnapshot {
                conversation: self.conversation.clone(),
                conversation_id: Some("conv-1".to_string()),
            })
        }

        async fn reset_conversation(&self, _: &str) -> anyhow::Result<ConversationSnapshot> {
            self.record("reset");
            Ok(ConversationSnapshot {
                conversation: Vec::new(),
                conversation_id: Some("conv-2".to_string()),
            })
        }
    }

    fn controller_with(
        backend: ScriptedBackend,
    ) -> (
        ChatController,
        UnboundedReceiver<ControllerEvent>,
        Arc<ScriptedBackend>,
    ) {
        let backend = Arc::new(backend);
        let (controller, events) = ChatController::new(backend.clone(), ClientConfig::default());
        (controller, events, backend)
    }

    fn drain(events: &mut UnboundedReceiver<ControllerEvent>) -> Vec<ControllerEvent> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn test_send_appends_draft_and_reply() {
        let (mut controller, mut events, _) = controller_with(
            ScriptedBackend::new().with_send(Ok(assistant_reply("srv-1", "Hello back"))),
        );
        controller.send("Hello").await.unwrap();

        let messages = controller.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].text, "Hello");
        assert_eq!(messages[1].id, "srv-1");
        assert_eq!(messages[1].role, Role::Assistant);

        let emitted = drain(&mut events);
        assert!(matches!(emitted[0], ControllerEvent::TranscriptChanged(ref m) if m.len() == 1));
        assert!(
            emitted
                .iter()
                .any(|e| matches!(e, ControllerEvent::TranscriptChanged(m) if m.len() == 2))
        );
    }

    #[tokio::test]
    async fn test_send_failure_rolls_back_draft_and_keeps_stage() {
        let (mut controller, mut events, backend) = controller_with(
            ScriptedBackend::new().with_send(Err(ClientError::Status {
                status: 500,
                body: "boom".to_string(),
            }
            .into())),
        );
        controller
            .attach("notes.pdf", "application/pdf", Bytes::from_static(b"%PDF"))
            .await
            .unwrap();

        let result = controller.send("With attachment").await;
        assert!(result.is_err());
        assert!(controller.messages().is_empty());
        assert_eq!(controller.attachments().len(), 1);
        assert_eq!(backend.calls(), vec!["presign", "upload", "ingest", "send"]);
        let emitted = drain(&mut events);
        assert!(
            emitted
                .iter()
                .any(|e| matches!(e, ControllerEvent::Error(_)))
        );
        // the fetch before the failed send still refreshed the credential
        assert!(
            emitted
                .iter()
                .any(|e| matches!(e, ControllerEvent::SessionRefreshed { .. }))
        );
    }

    #[tokio::test]
    async fn test_send_retries_once_on_unauthorized() {
        let (mut controller, _events, backend) = controller_with(
            ScriptedBackend::new()
                .with_send(Err(unauthorized()))
                .with_send(Ok(assistant_reply("srv-2", "after refresh"))),
        );
        controller.send("Hi").await.unwrap();

        assert_eq!(controller.messages().len(), 2);
        assert_eq!(*backend.fetches.lock().unwrap(), 2);
        assert_eq!(
            backend
                .calls()
                .iter()
                .filter(|c| **c == "send")
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_send_gives_up_after_second_unauthorized() {
        let (mut controller, _events, backend) = controller_with(
            ScriptedBackend::new()
                .with_send(Err(unauthorized()))
                .with_send(Err(unauthorized())),
        );
        assert!(controller.send("Hi").await.is_err());
        assert!(controller.messages().is_empty());
        assert_eq!(
            backend
                .calls()
                .iter()
                .filter(|c| **c == "send")
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_send_full_transcript_reply_replaces_local_state() {
        let (mut controller, _events, _) = controller_with(ScriptedBackend::new().with_send(Ok(
            SendReply::Transcript(vec![
                json!({"id": "srv-u", "role": "user", "text": "Hi"}),
                json!({"id": "srv-a", "role": "assistant", "text": "Hello"}),
            ]),
        )));
        controller.send("Hi").await.unwrap();

        let ids: Vec<_> = controller.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["srv-u", "srv-a"]);
    }

    #[tokio::test]
    async fn test_send_clears_stage_only_on_success() {
        let (mut controller, _events, _) = controller_with(
            ScriptedBackend::new().with_send(Ok(assistant_reply("srv-1", "ok"))),
        );
        controller
            .attach("data.csv", "text/csv", Bytes::from_static(b"a,b"))
            .await
            .unwrap();
        controller.send("Analyze this").await.unwrap();
        assert!(controller.attachments().is_empty());
    }

    #[tokio::test]
    async fn test_empty_send_without_attachments_is_a_noop() {
        let (mut controller, _events, backend) = controller_with(ScriptedBackend::new());
        controller.send("").await.unwrap();
        assert!(controller.messages().is_empty());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_send_with_attachments_but_no_text_goes_out() {
        let (mut controller, _events, backend) = controller_with(
            ScriptedBackend::new().with_send(Ok(assistant_reply("srv-1", "got the file"))),
        );
        controller
            .attach("data.csv", "text/csv", Bytes::from_static(b"a,b"))
            .await
            .unwrap();
        controller.send("").await.unwrap();
        assert!(backend.calls().contains(&"send"));
        assert_eq!(controller.messages().len(), 2);
        // the optimistic draft carries only the file reference
        assert_eq!(controller.messages()[0].content.len(), 1);
    }

    #[tokio::test]
    async fn test_attach_stages_after_full_pipeline() {
        let (mut controller, mut events, backend) = controller_with(ScriptedBackend::new());
        let entry = controller
            .attach("notes.pdf", "application/pdf", Bytes::from_static(b"%PDF"))
            .await
            .unwrap();

        assert_eq!(backend.calls(), vec!["presign", "upload", "ingest"]);
        assert_eq!(entry.file_id, "file-1");
        assert_eq!(
            entry.category,
            crate::attachment::AttachmentCategory::Context
        );
        assert!(
            drain(&mut events)
                .iter()
                .any(|e| matches!(e, ControllerEvent::AttachmentsChanged(a) if a.len() == 1))
        );
    }

    #[tokio::test]
    async fn test_attach_honors_ingestion_category_override() {
        let mut backend = ScriptedBackend::new();
        backend.ingest_category = Some("code_interpreter".to_string());
        let (mut controller, _events, _) = controller_with(backend);
        let entry = controller
            .attach("notes.pdf", "application/pdf", Bytes::from_static(b"%PDF"))
            .await
            .unwrap();
        assert_eq!(
            entry.category,
            crate::attachment::AttachmentCategory::CodeInterpreter
        );
    }

    #[tokio::test]
    async fn test_attach_rejects_oversized_file_before_any_call() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut config = ClientConfig::default();
        config.upload.max_bytes = 4;
        let (mut controller, _events) = ChatController::new(backend.clone(), config);

        let result = controller
            .attach("big.bin", "application/octet-stream", Bytes::from_static(b"12345"))
            .await;
        assert!(result.is_err());
        assert!(backend.calls().is_empty());
        assert!(controller.attachments().is_empty());
    }

    #[tokio::test]
    async fn test_attach_many_stages_all() {
        let (mut controller, _events, backend) = controller_with(ScriptedBackend::new());
        let staged = controller
            .attach_many(vec![
                (
                    "a.pdf".to_string(),
                    "application/pdf".to_string(),
                    Bytes::from_static(b"%PDF"),
                ),
                (
                    "b.csv".to_string(),
                    "text/csv".to_string(),
                    Bytes::from_static(b"a,b"),
                ),
            ])
            .await
            .unwrap();
        assert_eq!(staged.len(), 2);
        assert_eq!(
            backend
                .calls()
                .iter()
                .filter(|c| **c == "ingest")
                .count(),
            2
        );
        // the scripted backend ingests everything under the same id, so
        // the second upload overwrote the first entry in place
        assert_eq!(controller.attachments().len(), 1);
        assert_eq!(controller.attachments()[0].filename, "b.csv");
    }

    #[tokio::test]
    async fn test_remove_attachment() {
        let (mut controller, _events, _) = controller_with(ScriptedBackend::new());
        controller
            .attach("notes.pdf", "application/pdf", Bytes::from_static(b"%PDF"))
            .await
            .unwrap();
        let removed = controller.remove_attachment("file-1").unwrap();
        assert_eq!(removed.file_id, "file-1");
        assert!(controller.attachments().is_empty());
        assert!(controller.remove_attachment("file-1").is_none());
    }

    #[tokio::test]
    async fn test_reset_clears_transcript_and_stage() {
        let (mut controller, mut events, backend) = controller_with(
            ScriptedBackend::new().with_send(Ok(assistant_reply("srv-1", "hi"))),
        );
        controller.send("Hello").await.unwrap();
        controller
            .attach("notes.pdf", "application/pdf", Bytes::from_static(b"%PDF"))
            .await
            .unwrap();
        drain(&mut events);

        controller.reset().await.unwrap();
        assert!(controller.messages().is_empty());
        assert!(controller.attachments().is_empty());
        assert_eq!(controller.conversation_id(), Some("conv-2"));
        assert!(backend.calls().contains(&"reset"));
        assert!(
            drain(&mut events)
                .iter()
                .any(|e| matches!(e, ControllerEvent::SessionRefreshed { .. }))
        );
    }

    #[tokio::test]
    async fn test_load_merges_server_conversation() {
        let mut backend = ScriptedBackend::new();
        backend.conversation = vec![
            json!({"id": "a", "role": "user", "text": "Earlier"}),
            json!({"id": "b", "role": "assistant", "text": "Reply"}),
        ];
        let (mut controller, _events, _) = controller_with(backend);
        controller.load().await.unwrap();

        assert_eq!(controller.messages().len(), 2);
        assert_eq!(controller.conversation_id(), Some("conv-1"));
    }

    #[tokio::test]
    async fn test_load_emits_session_refreshed() {
        let (mut controller, mut events, backend) = controller_with(ScriptedBackend::new());
        controller.load().await.unwrap();

        assert_eq!(*backend.fetches.lock().unwrap(), 1);
        assert!(controller.credential().is_some());
        assert!(
            drain(&mut events)
                .iter()
                .any(|e| matches!(e, ControllerEvent::SessionRefreshed { .. }))
        );
    }

    #[tokio::test]
    async fn test_on_ready_refreshes_session() {
        let (mut controller, mut events, backend) = controller_with(ScriptedBackend::new());
        controller.on_ready().await.unwrap();
        assert_eq!(*backend.fetches.lock().unwrap(), 1);
        assert!(
            drain(&mut events)
                .iter()
                .any(|e| matches!(e, ControllerEvent::SessionRefreshed { .. }))
        );
    }

    #[tokio::test]
    async fn test_snapshot_reflects_current_state() {
        let mut backend = ScriptedBackend::new();
        backend.conversation = vec![json!({"id": "a", "role": "user", "text": "Hi"})];
        let (mut controller, _events, _) = controller_with(backend);
        controller.load().await.unwrap();
        controller
            .attach("notes.pdf", "application/pdf", Bytes::from_static(b"%PDF"))
            .await
            .unwrap();

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.attachments.len(), 1);
        assert_eq!(snapshot.conversation_id.as_deref(), Some("conv-1"));
        // the scripted token has no decodable expiry
        assert!(snapshot.credential_expires_at.is_none());
    }

    #[tokio::test]
    async fn test_client_secret_always_refetches() {
        let (mut controller, _events, backend) = controller_with(ScriptedBackend::new());
        let first = controller.client_secret().await.unwrap();
        let second = controller.client_secret().await.unwrap();
        assert_eq!(first, "tok");
        assert_eq!(second, "tok");
        assert_eq!(*backend.fetches.lock().unwrap(), 2);
    }
}
