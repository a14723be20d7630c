use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_CHAT_TITLE: &str = "New Chat";

fn default_title() -> String {
    DEFAULT_CHAT_TITLE.to_string()
}

/// Keys owned by [`Chat`]'s typed fields; they never live in `extra`.
const CHAT_FIELDS: &[&str] = &[
    "id",
    "title",
    "session_id",
    "messages",
    "last_message_preview",
    "created_at",
    "updated_at",
];

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Chat {
    pub id: String,
    #[serde(default = "default_title")]
    pub title: String,
    /// Agent session the conversation is bound to.
    #[serde(default = "new_id")]
    pub session_id: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_preview: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// View-layer fields this crate does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Chat {
    pub fn new(title: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            title: title
                .filter(|t| !t.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(default_title),
            session_id: new_id(),
            messages: Vec::new(),
            last_message_preview: None,
            created_at: now,
            updated_at: now,
            extra: Map::new(),
        }
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

/// Partial update for a [`Chat`]; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ChatPatch {
    pub title: Option<String>,
    pub session_id: Option<String>,
    pub last_message_preview: Option<String>,
    pub extra: Map<String, Value>,
}

impl ChatPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn apply(self, chat: &mut Chat) {
        if let Some(title) = self.title {
            chat.title = title;
        }
        if let Some(session_id) = self.session_id {
            chat.session_id = session_id;
        }
        if let Some(preview) = self.last_message_preview {
            chat.last_message_preview = Some(preview);
        }
        for (key, value) in self.extra {
            if !CHAT_FIELDS.contains(&key.as_str()) {
                chat.extra.insert(key, value);
                continue;
            }
            match (key.as_str(), value) {
                ("title", Value::String(title)) => chat.title = title,
                ("session_id", Value::String(session_id)) => chat.session_id = session_id,
                ("last_message_preview", Value::String(preview)) => {
                    chat.last_message_preview = Some(preview)
                }
                (reserved, _) => {
                    tracing::debug!(chat_id = %chat.id, key = reserved, "ignoring reserved chat field");
                }
            }
        }
        chat.updated_at = Utc::now();
    }
}

/// One turn in a chat. Only `id` is interpreted; every other field is opaque.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Message {
    pub fn new(mut fields: Map<String, Value>) -> Self {
        fields.remove("id");
        Self {
            id: new_id(),
            fields,
        }
    }

    /// Plain text turn with a role, content and timestamp.
    pub fn text(role: &str, content: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("role".into(), Value::String(role.to_string()));
        fields.insert("content".into(), Value::String(content.to_string()));
        fields.insert("timestamp".into(), Value::String(Utc::now().to_rfc3339()));
        Self::new(fields)
    }

    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        if key != "id" {
            self.fields.insert(key.to_string(), value);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn content(&self) -> Option<&str> {
        self.get("content").and_then(Value::as_str)
    }

    /// Shallow merge; the `id` is fixed for the life of the message.
    pub fn merge(&mut self, patch: Map<String, Value>) {
        for (key, value) in patch {
            if key != "id" {
                self.fields.insert(key, value);
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentSource {
    Sidebar,
    Chat,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl ProcessingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Error)
    }

    pub fn can_transition_to(self, next: ProcessingStatus) -> bool {
        use ProcessingStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Pending, Error) | (Processing, Completed) | (Processing, Error)
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedDocument {
    pub id: String,
    pub chat_id: String,
    pub name: String,
    pub size: u64,
    pub is_image: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub source: DocumentSource,
    pub processing_status: ProcessingStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Caller-supplied facts about a document at upload time.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub name: String,
    pub size: u64,
    pub is_image: bool,
    pub url: Option<String>,
    pub source: DocumentSource,
}

impl ProcessedDocument {
    pub fn pending(chat_id: &str, doc: NewDocument) -> Self {
        Self {
            id: new_id(),
            chat_id: chat_id.to_string(),
            name: doc.name,
            size: doc.size,
            is_image: doc.is_image,
            url: doc.url,
            source: doc.source,
            processing_status: ProcessingStatus::Pending,
            timestamp: Utc::now(),
            processed_data: None,
            error: None,
        }
    }
}
