pub mod agent;
pub mod auth;
pub mod commands;
pub mod config;
pub mod db;
pub mod doc_processor;
pub mod state;
pub mod store;

pub use agent::client::{AgentClient, DirectOptions};
pub use agent::{AgentError, AgentRequest, Attachment, FileInput};
pub use config::AgentConfig;
pub use state::AppState;

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber. `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

/// Set up logging and open the app state from the environment.
pub fn run(app_dir: &std::path::Path) -> Result<AppState, state::AppStateError> {
    init_tracing();
    let config = AgentConfig::from_env();
    AppState::open(app_dir, config)
}
