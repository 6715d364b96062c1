pub mod connection;
pub mod memory;
pub mod models;
pub mod service;
pub mod store;

pub use connection::{get_connection, DbPool};
pub use memory::MemoryStore;
pub use models::*;
pub use service::DuckDbStore;
pub use store::{StoreError, TranscriptStore};

use std::sync::Arc;

use crate::config::AppConfig;

/// Builds the configured store; `database.path = "memory"` selects the in-process store.
pub fn open_store(config: &AppConfig) -> Result<Arc<dyn TranscriptStore>, StoreError> {
    if config.database.path == "memory" {
        return Ok(Arc::new(MemoryStore::new(config.session_ttl())));
    }
    let pool = get_connection(&config.database)?;
    Ok(Arc::new(DuckDbStore::new(pool, config.session_ttl())))
}
