//! Ordered, de-duplicated conversation transcript. Entries merge by id:
//! a repeated id patches the existing entry in place, never duplicates
//! it, and a message's position is fixed at first insertion.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::api::{ContentItem, Message};
use crate::normalize::RawMessage;

#[derive(Clone, Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    index: HashMap<String, usize>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.index.get(id).map(|&pos| &self.messages[pos])
    }

    /// Upsert of an already-canonical message (the optimistic path).
    pub fn insert(&mut self, message: Message) {
        match self.index.get(message.id.as_str()).copied() {
            Some(pos) => self.messages[pos] = message,
            None => {
                self.index.insert(message.id.clone(), self.messages.len());
                self.messages.push(message);
            }
        }
    }

    /// Merges a batch of raw entries. Nulls are skipped; known ids are
    /// patched field-by-field from the fields actually present on the raw
    /// entry (absent fields keep their old values); unknown ids append in
    /// batch order. Idempotent for id-bearing entries.
    pub fn merge(&mut self, incoming: &[Value]) {
        let before = self.messages.len();
        for value in incoming {
            if value.is_null() {
                continue;
            }
            self.apply(RawMessage::from_value(value));
        }
        debug!(
            incoming = incoming.len(),
            appended = self.messages.len() - before,
            total = self.messages.len(),
            "merged transcript batch"
        );
    }

    /// Replaces the whole transcript with the server's array, equivalent
    /// to merging into an empty transcript. Reconciliation by merge is
    /// preferred; this is the degraded path for backends that answer with
    /// a full transcript, and it logs whenever local entries are lost.
    pub fn replace(&mut self, incoming: &[Value]) {
        let prior: Vec<String> = self.messages.iter().map(|m| m.id.clone()).collect();
        self.messages.clear();
        self.index.clear();
        self.merge(incoming);
        let dropped = prior.iter().filter(|id| !self.contains(id)).count();
        if dropped > 0 {
            warn!(dropped, "transcript replace discarded local entries");
        }
    }

    /// Rollback support: removes exactly the entry with `id`, leaving the
    /// rest of the transcript as it was before that entry arrived.
    pub fn remove(&mut self, id: &str) -> Option<Message> {
        let pos = self.index.remove(id)?;
        let removed = self.messages.remove(pos);
        for (i, msg) in self.messages.iter().enumerate().skip(pos) {
            self.index.insert(msg.id.clone(), i);
        }
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.index.clear();
    }

    fn apply(&mut self, raw: RawMessage) {
        let known = raw
            .id
            .as_deref()
            .and_then(|id| self.index.get(id).copied());
        match known {
            Some(pos) => {
                let entry = &mut self.messages[pos];
                if let Some(role) = raw.role {
                    entry.role = role;
                }
                if let Some(text) = raw.text_value() {
                    entry.content = vec![ContentItem::text(text.clone())];
                    entry.text = text;
                }
                if let Some(at) = raw.created_at {
                    entry.created_at = at;
                }
            }
            None => {
                let message = raw.into_message();
                self.index.insert(message.id.clone(), self.messages.len());
                self.messages.push(message);
            }
        }
    }
}
