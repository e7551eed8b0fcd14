//! Attachment routing and staging. A staged file has already been
//! uploaded and ingested; this module decides how each staged identifier
//! is referenced in the next outgoing message and keeps the stage
//! consistent across add / remove / send / reset.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::api::ContentItem;

/// Processing route for an attachment: retrieval context, programmatic
/// analysis, or plain file input.
#[derive(Copy, Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentCategory {
    Context,
    CodeInterpreter,
    #[default]
    Default,
}

impl AttachmentCategory {
    /// Recognizes an explicitly supplied category token. Only the
    /// overridable routes count; anything else is no override.
    pub fn from_token(token: &str) -> Option<AttachmentCategory> {
        match token.trim().to_ascii_lowercase().as_str() {
            "context" => Some(AttachmentCategory::Context),
            "code_interpreter" => Some(AttachmentCategory::CodeInterpreter),
            _ => None,
        }
    }
}

/// Extension and MIME tables backing [`classify`]. Members are matched
/// case-insensitively; the defaults cover long-form documents for the
/// context route and tabular formats for the code-interpreter route.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CategoryRoutes {
    pub context_extensions: HashSet<String>,
    pub context_mime_types: HashSet<String>,
    pub code_interpreter_extensions: HashSet<String>,
    pub code_interpreter_mime_types: HashSet<String>,
}

impl Default for CategoryRoutes {
    fn default() -> Self {
        CategoryRoutes {
            context_extensions: set(&["pdf", "txt", "md", "doc", "docx", "rtf"]),
            context_mime_types: set(&[
                "application/pdf",
                "text/plain",
                "text/markdown",
                "application/msword",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            ]),
            code_interpreter_extensions: set(&["csv", "tsv", "xls", "xlsx", "json"]),
            code_interpreter_mime_types: set(&[
                "text/csv",
                "text/tab-separated-values",
                "application/vnd.ms-excel",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                "application/json",
            ]),
        }
    }
}

fn set(values: &[&str]) -> HashSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Classification input; every field optional, missing metadata degrades.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FileMetadata {
    pub extension: Option<String>,
    pub content_type: Option<String>,
    pub explicit_category: Option<String>,
}

impl FileMetadata {
    /// Metadata for a freshly uploaded file; the extension is read off the
    /// filename's final dot-suffix.
    pub fn for_upload(
        filename: &str,
        content_type: Option<String>,
        explicit_category: Option<String>,
    ) -> FileMetadata {
        FileMetadata {
            extension: extension_of(filename).map(str::to_string),
            content_type,
            explicit_category,
        }
    }
}

/// Maps file metadata onto a processing route. First match wins: an
/// explicit known category token, then the context tables, then the
/// code-interpreter tables, then [`AttachmentCategory::Default`].
/// Total over any input.
pub fn classify(meta: &FileMetadata, routes: &CategoryRoutes) -> AttachmentCategory {
    if let Some(category) = meta
        .explicit_category
        .as_deref()
        .and_then(AttachmentCategory::from_token)
    {
        return category;
    }

    let matches = |members: &HashSet<String>, value: Option<&str>| {
        value.is_some_and(|v| members.iter().any(|m| m.eq_ignore_ascii_case(v)))
    };
    let extension = meta.extension.as_deref();
    let mime = meta.content_type.as_deref();
    let in_route = |extensions: &HashSet<String>, mime_types: &HashSet<String>| {
        matches(extensions, extension) || matches(mime_types, mime)
    };

    if in_route(&routes.context_extensions, &routes.context_mime_types) {
        AttachmentCategory::Context
    } else if in_route(
        &routes.code_interpreter_extensions,
        &routes.code_interpreter_mime_types,
    ) {
        AttachmentCategory::CodeInterpreter
    } else {
        AttachmentCategory::Default
    }
}

/// Final dot-suffix of a filename, if any.
pub(crate) fn extension_of(filename: &str) -> Option<&str> {
    filename.rsplit_once('.').map(|(_, ext)| ext)
}

/// One staged file: uploaded, ingested, and waiting to be attached to the
/// next outgoing message.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct StagedAttachment {
    pub file_id: String,
    pub filename: String,
    pub content_type: String,
    pub category: AttachmentCategory,
}

/// Metadata handed to [`AttachmentStager::add`]; every field tolerated
/// absent. `category` is the ingestion service's explicit override.
#[derive(Clone, Debug, Default)]
pub struct StagedFileInfo {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub category: Option<String>,
}

/// Insertion-ordered stage of `file_id -> metadata`, at most one entry
/// per id. Owned by the controller session; cleared after a successful
/// send or an explicit reset, never by a failed send.
#[derive(Clone, Debug, Default)]
pub struct AttachmentStager {
    entries: Vec<StagedAttachment>,
    routes: CategoryRoutes,
}

impl AttachmentStager {
    pub fn new(routes: CategoryRoutes) -> Self {
        AttachmentStager {
            entries: Vec::new(),
            routes,
        }
    }

    /// Inserts or overwrites the entry for `file_id`; an overwrite keeps
    /// the entry's original position. The category is derived here, once,
    /// from the supplied metadata.
    pub fn add(&mut self, file_id: impl Into<String>, info: StagedFileInfo) -> &StagedAttachment {
        let file_id = file_id.into();
        let filename = info.filename.unwrap_or_default();
        let content_type = info.content_type.unwrap_or_default();
        let meta = FileMetadata::for_upload(
            &filename,
            (!content_type.is_empty()).then(|| content_type.clone()),
            info.category,
        );
        let entry = StagedAttachment {
            category: classify(&meta, &self.routes),
            file_id: file_id.clone(),
            filename,
            content_type,
        };
        let pos = match self.entries.iter().position(|e| e.file_id == file_id) {
            Some(pos) => {
                self.entries[pos] = entry;
                pos
            }
            None => {
                self.entries.push(entry);
                self.entries.len() - 1
            }
        };
        &self.entries[pos]
    }

    /// Staged identifiers in insertion order.
    pub fn file_ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.file_id.clone()).collect()
    }

    /// Staged entries with their classification-ready metadata.
    pub fn entries(&self) -> &[StagedAttachment] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn remove(&mut self, file_id: &str) -> Option<StagedAttachment> {
        let pos = self.entries.iter().position(|e| e.file_id == file_id)?;
        Some(self.entries.remove(pos))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Content items for the next outgoing message: an optional leading
    /// text item (only when `text` is non-empty) followed by one file
    /// reference per staged file, `context_file` for the context route
    /// and `input_file` for everything else. The one place routing
    /// decisions become wire content.
    pub fn to_outgoing_content(&self, text: &str) -> Vec<ContentItem> {
        let mut items = Vec::with_capacity(self.entries.len() + 1);
        if !text.is_empty() {
            items.push(ContentItem::text(text));
        }
        for entry in &self.entries {
            let name = (!entry.filename.is_empty()).then(|| entry.filename.clone());
            items.push(match entry.category {
                AttachmentCategory::Context => {
                    ContentItem::context_file(entry.file_id.as_str(), name)
                }
                _ => ContentItem::input_file(entry.file_id.as_str(), name),
            });
        }
        items
    }
}
