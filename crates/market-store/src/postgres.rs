use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_core::{Candle, MarketError, MarketResult, MarketStore, NewSignal, Signal, SignalAction};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn db_err(e: sqlx::Error) -> MarketError {
    MarketError::DatabaseError(e.to_string())
}

#[derive(sqlx::FromRow)]
struct CandleRow {
    ts: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl From<CandleRow> for Candle {
    fn from(r: CandleRow) -> Self {
        Candle {
            ts: r.ts,
            open: r.open,
            high: r.high,
            low: r.low,
            close: r.close,
            volume: r.volume,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SignalRow {
    id: i64,
    symbol: String,
    action: String,
    take_profit: Option<f64>,
    stop_loss: Option<f64>,
    confidence: Option<f64>,
    pnl: Option<f64>,
    chart_screenshot: Option<String>,
    reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl SignalRow {
    fn into_signal(self) -> MarketResult<Signal> {
        let action: SignalAction = self.action.parse()?;
        Ok(Signal {
            id: self.id,
            symbol: self.symbol,
            action,
            take_profit: self.take_profit,
            stop_loss: self.stop_loss,
            confidence: self.confidence,
            pnl: self.pnl,
            chart_screenshot: self.chart_screenshot,
            reason: self.reason,
            created_at: self.created_at,
        })
    }
}

/// PostgreSQL-backed store over the `market` schema.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect, verify the connection and make sure the schema exists.
    pub async fn connect(database_url: &str, max_connections: u32) -> MarketResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(CONNECT_TIMEOUT)
            .connect(database_url)
            .await
            .map_err(db_err)?;

        let store = Self { pool };
        store.ping().await?;
        store.init_schema().await?;
        tracing::info!("Connected to PostgreSQL market store");

        Ok(store)
    }

    /// Initialize database schema
    pub async fn init_schema(&self) -> MarketResult<()> {
        let schema = include_str!("../schema.sql");

        // sqlx prepares one statement at a time
        for statement in schema.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&self.pool).await.map_err(db_err)?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl MarketStore for PgStore {
    async fn ping(&self) -> MarketResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn register_instruments(&self, symbols: &[&str]) -> MarketResult<u64> {
        let mut added = 0;
        for symbol in symbols {
            let result = sqlx::query(
                "INSERT INTO market.instruments (symbol) VALUES ($1) ON CONFLICT (symbol) DO NOTHING",
            )
            .bind(*symbol)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
            added += result.rows_affected();
        }
        Ok(added)
    }

    async fn instrument_id(&self, symbol: &str) -> MarketResult<i64> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM market.instruments WHERE symbol = $1")
                .bind(symbol)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;

        row.map(|(id,)| id)
            .ok_or_else(|| MarketError::UnknownSymbol(symbol.to_string()))
    }

    async fn latest_candles(&self, symbol: &str, limit: usize) -> MarketResult<Vec<Candle>> {
        let rows = sqlx::query_as::<_, CandleRow>(
            "SELECT t.ts, t.open, t.high, t.low, t.close, t.volume
             FROM market.timeframe_1m t
             JOIN market.instruments i ON i.id = t.instrument_id
             WHERE i.symbol = $1
             ORDER BY t.ts DESC
             LIMIT $2",
        )
        .bind(symbol)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        // newest-first from the index, callers chart oldest-first
        Ok(rows.into_iter().rev().map(Candle::from).collect())
    }

    async fn range_candles(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> MarketResult<Vec<Candle>> {
        let rows = sqlx::query_as::<_, CandleRow>(
            "SELECT t.ts, t.open, t.high, t.low, t.close, t.volume
             FROM market.timeframe_1m t
             JOIN market.instruments i ON i.id = t.instrument_id
             WHERE i.symbol = $1 AND t.ts BETWEEN $2 AND $3
             ORDER BY t.ts ASC",
        )
        .bind(symbol)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Candle::from).collect())
    }

    async fn upsert_candles(&self, instrument_id: i64, candles: &[Candle]) -> MarketResult<u64> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut inserted = 0u64;

        for candle in candles {
            let result = sqlx::query(
                "INSERT INTO market.timeframe_1m (instrument_id, ts, open, high, low, close, volume)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (instrument_id, ts) DO NOTHING",
            )
            .bind(instrument_id)
            .bind(candle.ts)
            .bind(candle.open)
            .bind(candle.high)
            .bind(candle.low)
            .bind(candle.close)
            .bind(candle.volume)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
            inserted += result.rows_affected();
        }

        tx.commit().await.map_err(db_err)?;
        Ok(inserted)
    }

    async fn recent_signals(&self, symbol: &str, limit: usize) -> MarketResult<Vec<Signal>> {
        let rows = sqlx::query_as::<_, SignalRow>(
            "SELECT s.id, i.symbol, s.action, s.take_profit, s.stop_loss, s.confidence,
                    s.pnl, s.chart_screenshot, s.reason, s.created_at
             FROM market.signals s
             JOIN market.instruments i ON i.id = s.instrument_id
             WHERE i.symbol = $1
             ORDER BY s.created_at DESC
             LIMIT $2",
        )
        .bind(symbol)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(SignalRow::into_signal).collect()
    }

    async fn insert_signal(&self, instrument_id: i64, signal: &NewSignal) -> MarketResult<Signal> {
        let (id, created_at): (i64, DateTime<Utc>) = sqlx::query_as(
            "INSERT INTO market.signals
                (instrument_id, action, take_profit, stop_loss, confidence, pnl, chart_screenshot, reason)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING id, created_at",
        )
        .bind(instrument_id)
        .bind(signal.action.as_str())
        .bind(signal.take_profit)
        .bind(signal.stop_loss)
        .bind(signal.confidence)
        .bind(signal.pnl)
        .bind(&signal.chart_screenshot)
        .bind(&signal.reason)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(signal.clone().into_signal(id, created_at))
    }
}
