use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{Candle, MarketResult, NewSignal, Signal};

/// Persistence for instruments, 1-minute candles and trading signals.
#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Cheap connectivity check used at startup.
    async fn ping(&self) -> MarketResult<()>;

    /// Register symbols as instruments; known symbols keep their id.
    /// Returns how many were newly added.
    async fn register_instruments(&self, symbols: &[&str]) -> MarketResult<u64>;

    /// Resolve a symbol to its instrument id, `MarketError::UnknownSymbol` if it is not registered.
    async fn instrument_id(&self, symbol: &str) -> MarketResult<i64>;

    /// The newest `limit` candles for `symbol`, returned oldest first.
    async fn latest_candles(&self, symbol: &str, limit: usize) -> MarketResult<Vec<Candle>>;

    /// Candles with `from <= ts <= to`, oldest first.
    async fn range_candles(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> MarketResult<Vec<Candle>>;

    /// Insert a batch atomically, skipping candles whose (instrument, ts) already exists.
    /// Returns the number of rows actually inserted.
    async fn upsert_candles(&self, instrument_id: i64, candles: &[Candle]) -> MarketResult<u64>;

    /// The newest `limit` signals for `symbol`, newest first.
    async fn recent_signals(&self, symbol: &str, limit: usize) -> MarketResult<Vec<Signal>>;

    async fn insert_signal(&self, instrument_id: i64, signal: &NewSignal) -> MarketResult<Signal>;
}
