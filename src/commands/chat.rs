use serde_json::{Map, Value};

use super::CommandError;
use crate::agent::reply::AgentReply;
use crate::agent::{AgentError, Attachment, Correlation, FileInput, ValidationErrors};
use crate::db::models::{Chat, ChatPatch, Message};
use crate::state::AppState;

const PREVIEW_CHARS: usize = 100;

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

fn not_found(chat_id: &str) -> CommandError {
    CommandError::ChatNotFound(chat_id.to_string())
}

pub fn create_chat(state: &AppState, title: Option<&str>) -> Chat {
    let chat = Chat::new(title);
    tracing::info!(chat_id = %chat.id, "chat created");
    state.store().add(chat.clone());
    chat
}

pub fn list_chats(state: &AppState) -> Vec<Chat> {
    state.store().chats().to_vec()
}

pub fn current_chat(state: &AppState) -> Option<Chat> {
    state.store().current().cloned()
}

pub fn select_chat(state: &AppState, id: Option<&str>) -> Result<(), CommandError> {
    if state.store().set_current(id) {
        Ok(())
    } else {
        Err(not_found(id.unwrap_or_default()))
    }
}

pub fn rename_chat(state: &AppState, id: &str, title: &str) -> Result<(), CommandError> {
    if state.store().update(id, ChatPatch::title(title)) {
        Ok(())
    } else {
        Err(not_found(id))
    }
}

pub fn delete_chat(state: &AppState, id: &str) -> Result<(), CommandError> {
    if !state.store().remove(id) {
        return Err(not_found(id));
    }
    state.documents().clear_chat(id);
    tracing::info!(chat_id = id, "chat deleted");
    Ok(())
}

pub fn clear_chats(state: &AppState) {
    state.store().clear();
    state.documents().clear();
    tracing::info!("all chats cleared");
}

pub fn get_messages(state: &AppState, chat_id: &str) -> Result<Vec<Message>, CommandError> {
    state
        .store()
        .chat(chat_id)
        .map(|c| c.messages.clone())
        .ok_or_else(|| not_found(chat_id))
}

pub fn edit_message(
    state: &AppState,
    chat_id: &str,
    message_id: &str,
    patch: Map<String, Value>,
) -> Result<(), CommandError> {
    if state.store().update_message(chat_id, message_id, patch) {
        Ok(())
    } else {
        Err(not_found(chat_id))
    }
}

pub fn delete_message(state: &AppState, chat_id: &str, message_id: &str) -> Result<(), CommandError> {
    if state.store().remove_message(chat_id, message_id) {
        Ok(())
    } else {
        Err(not_found(chat_id))
    }
}

/// Send a user turn to the agent and record both sides in the chat.
///
/// The reply is appended to `chat_id`, not to whichever chat is current when
/// it arrives. If the chat was deleted in the meantime the reply is dropped.
/// Transport failures become an error message in the conversation.
pub async fn send_message(
    state: &AppState,
    chat_id: &str,
    content: &str,
    files: Vec<FileInput>,
) -> Result<Message, CommandError> {
    // 1. Resolve the chat's agent session
    let session_id = state
        .store()
        .chat(chat_id)
        .map(|c| c.session_id.clone())
        .ok_or_else(|| not_found(chat_id))?;

    state.client.config().endpoint().map_err(AgentError::from)?;

    if content.trim().is_empty() && files.iter().all(FileInput::is_empty) {
        let mut errors = ValidationErrors::default();
        errors.add("message", "must not be empty without attachments");
        errors.into_result()?;
    }

    // 2. Build the request, encoding attachments
    let request = state
        .builder
        .multi_file(content, files, Correlation::session(session_id.clone()))
        .await?;

    // 3. Record the user turn, keeping attachment descriptors but not payloads
    let mut user_msg = Message::text("user", content);
    if !request.attachments.is_empty() {
        let descriptors = request.attachments.iter().map(Attachment::descriptor).collect();
        user_msg = user_msg.with_field("attachments", Value::Array(descriptors));
    }
    {
        let mut store = state.store();
        if !store.append_message(chat_id, user_msg) {
            tracing::warn!(chat_id, "chat removed while attachments were encoding");
            return Err(not_found(chat_id));
        }
        store.update(
            chat_id,
            ChatPatch {
                last_message_preview: Some(preview(content)),
                ..ChatPatch::default()
            },
        );
    }

    // 4. Call the agent
    let reply = match state.client.send(&request).await {
        Ok(body) => AgentReply::parse(&body),
        Err(e) => {
            tracing::error!(chat_id, error = %e, "agent call failed");
            AgentReply::Failure(e.user_message())
        }
    };

    // 5. Record the assistant turn
    let (assistant_msg, reply_session) = match reply {
        AgentReply::Content { text, session_id } => (Message::text("ai", &text), session_id),
        AgentReply::Failure(reason) => (
            Message::text("ai", &reason).with_field("is_error", Value::Bool(true)),
            None,
        ),
    };

    let mut store = state.store();
    if !store.append_message(chat_id, assistant_msg.clone()) {
        tracing::warn!(chat_id, "chat removed before the agent replied, dropping reply");
        return Ok(assistant_msg);
    }
    let mut patch = ChatPatch {
        last_message_preview: assistant_msg.content().map(preview),
        ..ChatPatch::default()
    };
    if let Some(new_session) = reply_session.filter(|s| *s != session_id) {
        tracing::info!(chat_id, session_id = %new_session, "agent rotated session");
        patch.session_id = Some(new_session);
    }
    store.update(chat_id, patch);

    Ok(assistant_msg)
}
