pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use market_core::{symbols, MarketResult, MarketStore};
use std::sync::Arc;

/// Open the store named by `database_url` and register the symbol catalog in it.
///
/// `memory://` (or any `memory:` URL) gives an in-process store; anything else is treated
/// as a PostgreSQL connection string.
pub async fn connect(database_url: &str, max_connections: u32) -> MarketResult<Arc<dyn MarketStore>> {
    let store: Arc<dyn MarketStore> = if database_url.starts_with("memory:") {
        tracing::warn!("Using in-memory market store; data is lost on exit");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(PgStore::connect(database_url, max_connections).await?)
    };

    register_catalog(store.as_ref()).await?;
    Ok(store)
}

/// Make every catalog symbol writable.
pub async fn register_catalog(store: &dyn MarketStore) -> MarketResult<u64> {
    let added = store.register_instruments(&symbols::all_symbols()).await?;
    if added > 0 {
        tracing::info!("Registered {} catalog instruments", added);
    }
    Ok(added)
}
