pub mod chat;
pub mod documents;

use serde::Serialize;

use crate::agent::AgentError;
use crate::store::documents::DocumentError;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("chat {0} not found")]
    ChatNotFound(String),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl Serialize for CommandError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
