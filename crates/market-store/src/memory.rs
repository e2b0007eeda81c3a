use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_core::{Candle, MarketError, MarketResult, MarketStore, NewSignal, Signal};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    instruments: HashMap<String, i64>,
    candles: HashMap<i64, BTreeMap<DateTime<Utc>, Candle>>,
    signals: Vec<(i64, Signal)>,
    next_signal_id: i64,
}

/// In-process store with the same ordering and dedupe rules as the PostgreSQL one.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instruments<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut inner = Inner::default();
        for symbol in symbols {
            let next = inner.instruments.len() as i64 + 1;
            inner.instruments.entry(symbol.into()).or_insert(next);
        }
        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Register a symbol, returning its id (existing id if already registered).
    pub async fn register(&self, symbol: &str) -> i64 {
        let mut inner = self.inner.write().await;
        let next = inner.instruments.len() as i64 + 1;
        *inner.instruments.entry(symbol.to_string()).or_insert(next)
    }
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn ping(&self) -> MarketResult<()> {
        Ok(())
    }

    async fn register_instruments(&self, symbols: &[&str]) -> MarketResult<u64> {
        let mut inner = self.inner.write().await;
        let mut added = 0;
        for symbol in symbols {
            if !inner.instruments.contains_key(*symbol) {
                let next = inner.instruments.len() as i64 + 1;
                inner.instruments.insert(symbol.to_string(), next);
                added += 1;
            }
        }
        Ok(added)
    }

    async fn instrument_id(&self, symbol: &str) -> MarketResult<i64> {
        self.inner
            .read()
            .await
            .instruments
            .get(symbol)
            .copied()
            .ok_or_else(|| MarketError::UnknownSymbol(symbol.to_string()))
    }

    async fn latest_candles(&self, symbol: &str, limit: usize) -> MarketResult<Vec<Candle>> {
        let inner = self.inner.read().await;
        let Some(id) = inner.instruments.get(symbol) else {
            return Ok(Vec::new());
        };
        let Some(series) = inner.candles.get(id) else {
            return Ok(Vec::new());
        };

        let mut out: Vec<Candle> = series.values().rev().take(limit).cloned().collect();
        out.reverse();
        Ok(out)
    }

    async fn range_candles(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> MarketResult<Vec<Candle>> {
        if to < from {
            return Ok(Vec::new());
        }
        let inner = self.inner.read().await;
        let series = inner
            .instruments
            .get(symbol)
            .and_then(|id| inner.candles.get(id));

        Ok(series
            .map(|s| s.range(from..=to).map(|(_, c)| c.clone()).collect())
            .unwrap_or_default())
    }

    async fn upsert_candles(&self, instrument_id: i64, candles: &[Candle]) -> MarketResult<u64> {
        let mut inner = self.inner.write().await;
        if !inner.instruments.values().any(|&id| id == instrument_id) {
            return Err(MarketError::DatabaseError(format!(
                "instrument {} does not exist",
                instrument_id
            )));
        }

        let series = inner.candles.entry(instrument_id).or_default();
        let mut inserted = 0;
        for candle in candles {
            if !series.contains_key(&candle.ts) {
                series.insert(candle.ts, candle.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn recent_signals(&self, symbol: &str, limit: usize) -> MarketResult<Vec<Signal>> {
        let inner = self.inner.read().await;
        let Some(&id) = inner.instruments.get(symbol) else {
            return Ok(Vec::new());
        };

        let mut out: Vec<Signal> = inner
            .signals
            .iter()
            .filter(|(inst, _)| *inst == id)
            .map(|(_, s)| s.clone())
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        out.truncate(limit);
        Ok(out)
    }

    async fn insert_signal(&self, instrument_id: i64, signal: &NewSignal) -> MarketResult<Signal> {
        let mut inner = self.inner.write().await;
        if !inner.instruments.values().any(|&id| id == instrument_id) {
            return Err(MarketError::DatabaseError(format!(
                "instrument {} does not exist",
                instrument_id
            )));
        }

        inner.next_signal_id += 1;
        let created = signal.clone().into_signal(inner.next_signal_id, Utc::now());
        inner.signals.push((instrument_id, created.clone()));
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use market_core::SignalAction;

    fn candle_at(minute: i64, close: f64) -> Candle {
        let base = Utc.with_ymd_and_hms(2025, 10, 31, 22, 0, 0).unwrap();
        Candle {
            ts: base + Duration::minutes(minute),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 100.0,
        }
    }

    #[tokio::test]
    async fn test_latest_returns_newest_ascending() {
        let store = MemoryStore::with_instruments(["XAUUSD"]);
        let id = store.instrument_id("XAUUSD").await.unwrap();
        let batch: Vec<Candle> = (0..10).map(|m| candle_at(m, 2000.0 + m as f64)).collect();
        store.upsert_candles(id, &batch).await.unwrap();

        let latest = store.latest_candles("XAUUSD", 3).await.unwrap();
        let closes: Vec<f64> = latest.iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![2007.0, 2008.0, 2009.0]);
    }

    #[tokio::test]
    async fn test_upsert_skips_existing_timestamps() {
        let store = MemoryStore::with_instruments(["EURUSD"]);
        let id = store.instrument_id("EURUSD").await.unwrap();

        let first = store
            .upsert_candles(id, &[candle_at(0, 1.1), candle_at(1, 1.2)])
            .await
            .unwrap();
        assert_eq!(first, 2);

        let second = store
            .upsert_candles(id, &[candle_at(1, 9.9), candle_at(2, 1.3)])
            .await
            .unwrap();
        assert_eq!(second, 1);

        let all = store.latest_candles("EURUSD", 100).await.unwrap();
        assert_eq!(all.len(), 3);
        // first write wins
        assert_eq!(all[1].close, 1.2);
    }

    #[tokio::test]
    async fn test_range_is_inclusive() {
        let store = MemoryStore::with_instruments(["GBPUSD"]);
        let id = store.instrument_id("GBPUSD").await.unwrap();
        let batch: Vec<Candle> = (0..5).map(|m| candle_at(m, m as f64)).collect();
        store.upsert_candles(id, &batch).await.unwrap();

        let range = store
            .range_candles("GBPUSD", batch[1].ts, batch[3].ts)
            .await
            .unwrap();
        assert_eq!(range.len(), 3);
        assert_eq!(range[0].ts, batch[1].ts);
        assert_eq!(range[2].ts, batch[3].ts);
    }

    #[tokio::test]
    async fn test_register_instruments_counts_only_new_symbols() {
        let store = MemoryStore::with_instruments(["EURUSD"]);
        let eurusd = store.instrument_id("EURUSD").await.unwrap();

        let added = store.register_instruments(&["EURUSD", "GBPUSD", "GBPUSD"]).await.unwrap();
        assert_eq!(added, 1);
        assert_eq!(store.instrument_id("EURUSD").await.unwrap(), eurusd);
        assert!(store.instrument_id("GBPUSD").await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_instrument_rejected() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.instrument_id("BTCUSDT").await,
            Err(MarketError::UnknownSymbol(s)) if s == "BTCUSDT"
        ));
        assert!(store.upsert_candles(42, &[candle_at(0, 1.0)]).await.is_err());
        assert!(store.latest_candles("BTCUSDT", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_signals_newest_first_and_limited() {
        let store = MemoryStore::new();
        let id = store.register("BTCUSDT").await;
        assert_eq!(store.register("BTCUSDT").await, id);

        for action in [SignalAction::Buy, SignalAction::Wait, SignalAction::Sell] {
            store
                .insert_signal(id, &NewSignal::new("BTCUSDT", action))
                .await
                .unwrap();
        }

        let signals = store.recent_signals("BTCUSDT", 2).await.unwrap();
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].action, SignalAction::Sell);
        assert_eq!(signals[1].action, SignalAction::Wait);
        assert!(signals[0].id > signals[1].id);
    }
}
