use std::sync::Arc;

use stockroom_infra::{
    Catalog, InMemoryItemStore, ItemStore, PostgresItemStore, StockLedger, StoreError,
};

use crate::config::AppConfig;

pub type SharedStore = Arc<dyn ItemStore>;

/// Services shared by every handler. Both wrap the same store.
#[derive(Clone)]
pub struct AppServices {
    pub ledger: StockLedger<SharedStore>,
    pub catalog: Catalog<SharedStore>,
}

impl AppServices {
    pub fn new(store: SharedStore) -> Self {
        Self {
            ledger: StockLedger::new(store.clone()),
            catalog: Catalog::new(store),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryItemStore::new()))
    }

    /// Postgres when `DATABASE_URL` is configured, in-memory otherwise.
    pub async fn from_config(config: &AppConfig) -> Result<Self, StoreError> {
        let Some(url) = config.database_url.as_deref() else {
            tracing::warn!("DATABASE_URL not set; using in-memory store (data is lost on exit)");
            return Ok(Self::in_memory());
        };

        let store = PostgresItemStore::connect(url, config.db_max_connections, config.lock_timeout)
            .await?;
        store.migrate().await?;
        tracing::info!(
            max_connections = config.db_max_connections,
            lock_timeout_ms = config.lock_timeout.as_millis() as u64,
            "connected to postgres"
        );
        Ok(Self::new(Arc::new(store)))
    }
}
