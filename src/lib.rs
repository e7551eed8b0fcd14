//! Embeddable chat client core for a hosted conversational assistant
//!
//! This crate provides:
//! - **Controller**: `ChatController`, the session root that composes,
//!   sends, attaches, resets and pushes re-render events
//! - **Transcript**: `Transcript`, an ordered id-merged conversation view
//!   built from heterogeneous server payloads
//! - **Attachments**: category routing plus the `AttachmentStager` that
//!   turns staged uploads into outgoing message content
//! - **Credentials**: `SessionCredentialManager` with expiry-aware
//!   refresh and a single authorized retry
//! - **Backend**: the `ChatBackend` trait with the HTTP implementation
//!   `HttpBackend`
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use colloquy::{ChatController, ClientConfig, HttpBackend};
//!
//! let config = ClientConfig::load();
//! let backend = Arc::new(HttpBackend::new(config.base_url.clone()));
//! let (mut controller, mut events) = ChatController::new(backend, config);
//!
//! controller.on_ready().await?;
//! controller.load().await?;
//! controller.send("Hello").await?;
//! ```

pub mod api;
pub mod attachment;
pub mod backend;
mod client;
pub mod config;
pub mod controller;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod transcript;

pub use api::{ContentItem, KnownItem, Message, Role};
pub use attachment::{
    AttachmentCategory, AttachmentStager, CategoryRoutes, FileMetadata, StagedAttachment,
    StagedFileInfo, classify,
};
pub use backend::{ChatBackend, HttpBackend};
pub use config::{ClientConfig, UploadLimits};
pub use controller::{ChatController, ControllerEvent, SessionSnapshot};
pub use credentials::{Credential, SessionCredentialManager};
pub use error::ClientError;
pub use logging::init_logging;
pub use normalize::normalize;
pub use transcript::Transcript;
