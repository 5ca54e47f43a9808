pub mod cached;
pub mod postgres;
pub mod sqlite;
pub mod trait_def;

pub use cached::CachedEventStore;
pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;
pub use trait_def::{BucketCountRow, BucketQuery, EventStore};

use crate::config::{Config, DatabaseBackend};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// Connect to the configured backend, wrapping it in the result cache when enabled
pub async fn connect(config: &Config) -> Result<Arc<dyn EventStore>> {
    let storage: Arc<dyn EventStore> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.database.url);
            Arc::new(SqliteStorage::new(&config.database.url, config.database.max_connections).await?)
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage: {}", config.database.url);
            Arc::new(
                PostgresStorage::new(&config.database.url, config.database.max_connections).await?,
            )
        }
    };

    if config.analytics.cache_ttl_secs == 0 {
        return Ok(storage);
    }

    info!(
        "Caching bucket queries for {}s (max {} entries)",
        config.analytics.cache_ttl_secs, config.analytics.cache_max_entries
    );
    Ok(Arc::new(CachedEventStore::new(
        storage,
        config.analytics.cache_max_entries,
        config.analytics.cache_ttl_secs,
    )))
}
