use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::agent::builder::RequestBuilder;
use crate::agent::client::AgentClient;
use crate::agent::AgentError;
use crate::auth::TokenProvider;
use crate::config::AgentConfig;
use crate::db::Database;
use crate::doc_processor::{DocumentProcessor, LocalProcessor};
use crate::store::documents::DocumentTracker;
use crate::store::{persist, ChatStore};

#[derive(Debug, thiserror::Error)]
pub enum AppStateError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// Everything the command layer works against.
///
/// The store and tracker sit behind plain mutexes: their operations never
/// suspend, so a guard is never held across an `.await`.
pub struct AppState {
    pub db: Arc<Database>,
    pub builder: RequestBuilder,
    pub client: AgentClient,
    pub processor: Arc<dyn DocumentProcessor>,
    store: Mutex<ChatStore>,
    documents: Mutex<DocumentTracker>,
}

impl AppState {
    /// Open (or create) the local database under `app_dir`, restore the chat
    /// state and wire persistence.
    pub fn open(app_dir: &Path, config: AgentConfig) -> Result<Self, AppStateError> {
        let db = Database::new(app_dir)?;
        Self::with_database(db, config)
    }

    pub fn with_database(db: Database, config: AgentConfig) -> Result<Self, AppStateError> {
        let db = Arc::new(db);
        let mut store = ChatStore::from_state(persist::restore(&db));
        persist::attach(&mut store, db.clone());
        tracing::info!(chats = store.chats().len(), "chat state restored");

        Ok(Self {
            builder: RequestBuilder::new(&config),
            client: AgentClient::new(config)?,
            processor: Arc::new(LocalProcessor),
            db,
            store: Mutex::new(store),
            documents: Mutex::new(DocumentTracker::new()),
        })
    }

    pub fn with_token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.client = self.client.with_token_provider(tokens);
        self
    }

    pub fn with_processor(mut self, processor: Arc<dyn DocumentProcessor>) -> Self {
        self.processor = processor;
        self
    }

    pub fn store(&self) -> MutexGuard<'_, ChatStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn documents(&self) -> MutexGuard<'_, DocumentTracker> {
        self.documents.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
