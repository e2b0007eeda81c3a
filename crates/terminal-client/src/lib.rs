//! HTTP client for the market API used by the terminal views.
//!
//! Read endpoints go through a [`RequestCache`] (10 s by default) so that tickers, tables
//! and tiles refreshing the same symbol at once cost a single request.

pub mod cache;
pub mod error;
pub mod hydrate;

pub use cache::RequestCache;
pub use error::{ClientError, ClientResult};
pub use hydrate::hydrate_section;

use chrono::{DateTime, SecondsFormat, Utc};
use market_core::{Candle, CandleBatch, NewSignal, Signal, UpsertSummary};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10);
pub const DEFAULT_LATEST_LIMIT: usize = 200;
pub const DEFAULT_SIGNAL_LIMIT: usize = 50;

#[derive(Clone)]
pub struct TerminalClient {
    client: Client,
    base_url: String,
    candles: Arc<RequestCache<Vec<Candle>>>,
    signals: Arc<RequestCache<Vec<Signal>>>,
}

impl TerminalClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_cache_ttl(base_url, DEFAULT_CACHE_TTL)
    }

    pub fn with_cache_ttl(base_url: impl Into<String>, ttl: Duration) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            candles: Arc::new(RequestCache::new(ttl)),
            signals: Arc::new(RequestCache::new(ttl)),
        }
    }

    /// Base URL from `TERMINAL_API_URL`, falling back to the local development server.
    pub fn from_env() -> Self {
        let base_url = std::env::var("TERMINAL_API_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Self::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Newest `limit` candles, oldest first.
    pub async fn latest_candles(&self, symbol: &str, limit: usize) -> ClientResult<Vec<Candle>> {
        let key = format!("latest:{}:{}", symbol, limit);
        let request = self
            .client
            .get(format!("{}/candles/latest", self.base_url))
            .query(&[("symbol", symbol.to_string()), ("limit", limit.to_string())]);

        self.candles
            .get_or_fetch(&key, move || fetch_json(request))
            .await
    }

    pub async fn range_candles(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ClientResult<Vec<Candle>> {
        let from = from.to_rfc3339_opts(SecondsFormat::Millis, true);
        let to = to.to_rfc3339_opts(SecondsFormat::Millis, true);
        let key = format!("range:{}:{}:{}", symbol, from, to);
        let request = self
            .client
            .get(format!("{}/candles/range", self.base_url))
            .query(&[("symbol", symbol), ("from", from.as_str()), ("to", to.as_str())]);

        self.candles
            .get_or_fetch(&key, move || fetch_json(request))
            .await
    }

    /// Newest `limit` signals, newest first.
    pub async fn signals(&self, symbol: &str, limit: usize) -> ClientResult<Vec<Signal>> {
        let key = format!("signals:{}:{}", symbol, limit);
        let request = self
            .client
            .get(format!("{}/signals", self.base_url))
            .query(&[("symbol", symbol.to_string()), ("limit", limit.to_string())]);

        self.signals
            .get_or_fetch(&key, move || fetch_json(request))
            .await
    }

    /// Record a signal. Cached signal lists for the symbol are dropped so the next read sees it.
    pub async fn create_signal(&self, signal: &NewSignal) -> ClientResult<Signal> {
        let request = self
            .client
            .post(format!("{}/signals", self.base_url))
            .json(signal);

        let created: Signal = fetch_json(request).await?;
        self.signals
            .invalidate_prefix(&format!("signals:{}:", created.symbol));
        Ok(created)
    }

    pub async fn upsert_candles(&self, symbol: &str, candles: &[Candle]) -> ClientResult<UpsertSummary> {
        let batch = CandleBatch {
            symbol: symbol.to_string(),
            candles: candles.to_vec(),
        };
        let request = self
            .client
            .post(format!("{}/candles/upsert", self.base_url))
            .json(&batch);

        let summary: UpsertSummary = fetch_json(request).await?;
        self.candles.invalidate_prefix(&format!("latest:{}:", symbol));
        self.candles.invalidate_prefix(&format!("range:{}:", symbol));
        Ok(summary)
    }

    pub async fn health(&self) -> ClientResult<()> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn fetch_json<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> ClientResult<T> {
    let response = check_status(request.send().await?).await?;
    Ok(response.json::<T>().await?)
}

/// Turn a non-2xx response into `ClientError::Http`, preferring the server's `details`,
/// then its `error`, then the status text.
async fn check_status(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let fallback = status.canonical_reason().unwrap_or_default().to_string();
    let details = match response.json::<serde_json::Value>().await {
        Ok(body) => ["details", "error"]
            .iter()
            .filter_map(|field| body.get(*field).and_then(|v| v.as_str()))
            .find(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or(fallback),
        Err(_) => fallback,
    };

    Err(ClientError::Http {
        status: status.as_u16(),
        details,
    })
}
