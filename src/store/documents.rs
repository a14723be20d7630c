use serde_json::Value;
use std::collections::HashMap;

use crate::db::models::{NewDocument, ProcessedDocument, ProcessingStatus};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("document {0} not found")]
    NotFound(String),
    #[error("document {id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        id: String,
        from: ProcessingStatus,
        to: ProcessingStatus,
    },
    #[error("processing failed: {0}")]
    Processing(String),
}

/// Per-chat document lists with their processing status.
///
/// Lists keep insertion order; status changes update entries in place.
#[derive(Debug, Default)]
pub struct DocumentTracker {
    by_chat: HashMap<String, Vec<ProcessedDocument>>,
}

impl DocumentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly uploaded document in `pending`.
    pub fn register(&mut self, chat_id: &str, doc: NewDocument) -> ProcessedDocument {
        let doc = ProcessedDocument::pending(chat_id, doc);
        tracing::debug!(chat_id, document_id = %doc.id, name = %doc.name, "document registered");
        self.by_chat
            .entry(chat_id.to_string())
            .or_default()
            .push(doc.clone());
        doc
    }

    pub fn documents(&self, chat_id: &str) -> &[ProcessedDocument] {
        self.by_chat.get(chat_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, chat_id: &str, id: &str) -> Option<&ProcessedDocument> {
        self.documents(chat_id).iter().find(|d| d.id == id)
    }

    pub fn start_processing(&mut self, chat_id: &str, id: &str) -> Result<&ProcessedDocument, DocumentError> {
        self.transition(chat_id, id, ProcessingStatus::Processing, |_| {})
    }

    pub fn complete(
        &mut self,
        chat_id: &str,
        id: &str,
        processed_data: Option<Value>,
    ) -> Result<&ProcessedDocument, DocumentError> {
        self.transition(chat_id, id, ProcessingStatus::Completed, |doc| {
            doc.processed_data = processed_data;
        })
    }

    pub fn fail(&mut self, chat_id: &str, id: &str, error: &str) -> Result<&ProcessedDocument, DocumentError> {
        self.transition(chat_id, id, ProcessingStatus::Error, |doc| {
            doc.error = Some(error.to_string());
        })
    }

    pub fn remove(&mut self, chat_id: &str, id: &str) -> Option<ProcessedDocument> {
        let docs = self.by_chat.get_mut(chat_id)?;
        let index = docs.iter().position(|d| d.id == id)?;
        Some(docs.remove(index))
    }

    /// Drop every document of a chat, e.g. when the chat is deleted.
    pub fn clear_chat(&mut self, chat_id: &str) {
        self.by_chat.remove(chat_id);
    }

    pub fn clear(&mut self) {
        self.by_chat.clear();
    }

    fn transition(
        &mut self,
        chat_id: &str,
        id: &str,
        to: ProcessingStatus,
        update: impl FnOnce(&mut ProcessedDocument),
    ) -> Result<&ProcessedDocument, DocumentError> {
        let doc = self
            .by_chat
            .get_mut(chat_id)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or_else(|| DocumentError::NotFound(id.to_string()))?;

        let from = doc.processing_status;
        let unchanged = from == to && !from.is_terminal();
        if !unchanged {
            if !from.can_transition_to(to) {
                return Err(DocumentError::InvalidTransition {
                    id: id.to_string(),
                    from,
                    to,
                });
            }
            doc.processing_status = to;
            update(doc);
            tracing::debug!(document_id = id, status = ?to, "document status changed");
        }
        Ok(&*doc)
    }
}
