//! In-memory chat registry.
//!
//! The collection is the single source of truth; the current chat is an id
//! cursor into it, so the "current" view is always derived by lookup and can
//! never drift from the collection entry. Every mutation is synchronous and
//! is followed by exactly one notification to subscribers, which is how
//! persistence ([`persist`]) and any view layer observe changes.

pub mod documents;
pub mod persist;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::db::models::{Chat, ChatPatch, Message};

/// The persisted part of the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatState {
    #[serde(default)]
    pub chats: Vec<Chat>,
    #[serde(default, rename = "current_chat")]
    pub current_chat_id: Option<String>,
}

impl ChatState {
    pub fn current(&self) -> Option<&Chat> {
        let id = self.current_chat_id.as_deref()?;
        self.chats.iter().find(|c| c.id == id)
    }
}

type Listener = Box<dyn Fn(&ChatState) + Send + Sync>;

#[derive(Default)]
pub struct ChatStore {
    state: ChatState,
    listeners: Vec<Listener>,
}

impl ChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted state. A dangling current id is dropped.
    pub fn from_state(mut state: ChatState) -> Self {
        let dangling = state
            .current_chat_id
            .as_deref()
            .is_some_and(|id| !state.chats.iter().any(|c| c.id == id));
        if dangling {
            tracing::warn!("restored current chat is not in the collection, clearing it");
            state.current_chat_id = None;
        }
        Self {
            state,
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: impl Fn(&ChatState) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn chats(&self) -> &[Chat] {
        &self.state.chats
    }

    pub fn chat(&self, id: &str) -> Option<&Chat> {
        self.state.chats.iter().find(|c| c.id == id)
    }

    pub fn current(&self) -> Option<&Chat> {
        self.state.current()
    }

    /// Point the cursor at `id`, or clear it. Ids not in the collection are ignored.
    pub fn set_current(&mut self, id: Option<&str>) -> bool {
        match id {
            Some(id) if self.chat(id).is_none() => {
                tracing::debug!(chat_id = id, "ignoring select of unknown chat");
                false
            }
            _ => {
                self.state.current_chat_id = id.map(str::to_string);
                self.notify();
                true
            }
        }
    }

    /// Append a chat and make it current in one step.
    pub fn add(&mut self, chat: Chat) {
        self.state.current_chat_id = Some(chat.id.clone());
        self.state.chats.push(chat);
        self.notify();
    }

    pub fn update(&mut self, chat_id: &str, patch: ChatPatch) -> bool {
        self.mutate_chat(chat_id, |chat| {
            patch.apply(chat);
            true
        })
    }

    pub fn remove(&mut self, chat_id: &str) -> bool {
        let before = self.state.chats.len();
        self.state.chats.retain(|c| c.id != chat_id);
        if self.state.chats.len() == before {
            return false;
        }
        if self.state.current_chat_id.as_deref() == Some(chat_id) {
            self.state.current_chat_id = None;
        }
        self.notify();
        true
    }

    pub fn append_message(&mut self, chat_id: &str, message: Message) -> bool {
        self.mutate_chat(chat_id, |chat| {
            chat.messages.push(message);
            chat.updated_at = chrono::Utc::now();
            true
        })
    }

    pub fn update_message(&mut self, chat_id: &str, message_id: &str, patch: Map<String, Value>) -> bool {
        self.mutate_chat(chat_id, |chat| {
            let Some(message) = chat.messages.iter_mut().find(|m| m.id == message_id) else {
                return false;
            };
            message.merge(patch);
            chat.updated_at = chrono::Utc::now();
            true
        })
    }

    pub fn remove_message(&mut self, chat_id: &str, message_id: &str) -> bool {
        self.mutate_chat(chat_id, |chat| {
            let before = chat.messages.len();
            chat.messages.retain(|m| m.id != message_id);
            if chat.messages.len() == before {
                return false;
            }
            chat.updated_at = chrono::Utc::now();
            true
        })
    }

    pub fn clear(&mut self) {
        self.state.chats.clear();
        self.state.current_chat_id = None;
        self.notify();
    }

    fn mutate_chat(&mut self, chat_id: &str, f: impl FnOnce(&mut Chat) -> bool) -> bool {
        let Some(chat) = self.state.chats.iter_mut().find(|c| c.id == chat_id) else {
            tracing::debug!(chat_id, "ignoring mutation of unknown chat");
            return false;
        };
        let changed = f(chat);
        if changed {
            self.notify();
        }
        changed
    }

    fn notify(&self) {
        for listener in &self.listeners {
            listener(&self.state);
        }
    }
}
