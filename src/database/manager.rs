use std::sync::Arc;

use tracing::{info, warn};

use crate::config::DatabaseConfig;

use super::memory::MemoryStore;
use super::postgres::PgStore;
use super::store::{DocumentStore, StoreError};

/// Open the configured backend: PostgreSQL when `DATABASE_URL` is set,
/// otherwise the in-process memory store
pub async fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
    match config.url.as_deref() {
        Some(url) if !url.trim().is_empty() => {
            let store = PgStore::connect(url, config).await?;
            Ok(Arc::new(store))
        }
        _ => {
            warn!("DATABASE_URL not set; using in-memory store (data is lost on restart)");
            let store = MemoryStore::new();
            info!("Opened {} document store", store.backend());
            Ok(Arc::new(store))
        }
    }
}
