use std::sync::Arc;

use super::{ChatState, ChatStore};
use crate::db::Database;

/// Slot holding the serialized `{chats, current_chat}` state.
pub const CHAT_STORAGE_SLOT: &str = "chat-storage";

/// Load the last saved state. Missing or unreadable data yields an empty state.
pub fn restore(db: &Database) -> ChatState {
    let raw = match db.get_slot(CHAT_STORAGE_SLOT) {
        Ok(Some(raw)) => raw,
        Ok(None) => return ChatState::default(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to read chat storage, starting empty");
            return ChatState::default();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(state) => state,
        Err(e) => {
            tracing::warn!(error = %e, "chat storage is corrupt, starting empty");
            ChatState::default()
        }
    }
}

/// Write `state` to the chat slot. Failures are logged, not returned.
pub fn save(db: &Database, state: &ChatState) {
    let json = match serde_json::to_string(state) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize chat state");
            return;
        }
    };
    if let Err(e) = db.set_slot(CHAT_STORAGE_SLOT, &json) {
        tracing::error!(error = %e, "failed to persist chat state");
    }
}

/// Mirror every store change into `db`.
pub fn attach(store: &mut ChatStore, db: Arc<Database>) {
    store.subscribe(move |state| save(&db, state));
}
