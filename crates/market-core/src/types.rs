use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::MarketError;

/// OHLCV bar data. Missing price or volume fields decode as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub ts: DateTime<Utc>,
    #[serde(default)]
    pub open: f64,
    #[serde(default)]
    pub high: f64,
    #[serde(default)]
    pub low: f64,
    #[serde(default)]
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

/// Recommended action carried by a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalAction {
    Buy,
    Sell,
    Wait,
}

impl SignalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalAction::Buy => "buy",
            SignalAction::Sell => "sell",
            SignalAction::Wait => "wait",
        }
    }
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalAction {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(SignalAction::Buy),
            "sell" => Ok(SignalAction::Sell),
            "wait" => Ok(SignalAction::Wait),
            other => Err(MarketError::InvalidData(format!(
                "invalid action '{}': must be one of buy, sell, wait",
                other
            ))),
        }
    }
}

/// A stored trading recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: i64,
    pub symbol: String,
    pub action: SignalAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pnl: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_screenshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Signal payload before the store assigns an id and creation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSignal {
    pub symbol: String,
    pub action: SignalAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pnl: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_screenshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl NewSignal {
    pub fn new(symbol: impl Into<String>, action: SignalAction) -> Self {
        Self {
            symbol: symbol.into(),
            action,
            take_profit: None,
            stop_loss: None,
            confidence: None,
            pnl: None,
            chart_screenshot: None,
            reason: None,
        }
    }

    /// Attach the store-assigned fields.
    pub fn into_signal(self, id: i64, created_at: DateTime<Utc>) -> Signal {
        Signal {
            id,
            symbol: self.symbol,
            action: self.action,
            take_profit: self.take_profit,
            stop_loss: self.stop_loss,
            confidence: self.confidence,
            pnl: self.pnl,
            chart_screenshot: self.chart_screenshot,
            reason: self.reason,
            created_at,
        }
    }
}

/// Batch body accepted by `POST /candles/upsert`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandleBatch {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub candles: Vec<Candle>,
}

/// Outcome of a candle batch upsert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertSummary {
    pub status: String,
    pub symbol: String,
    pub received: usize,
    pub inserted: u64,
}

/// Display row for a market table: last known price state for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketItem {
    pub id: String,
    pub value: f64,
    pub change: f64,
    pub pct_change: f64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl MarketItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: 0.0,
            change: 0.0,
            pct_change: 0.0,
            updated_at: None,
        }
    }

    /// Refresh price fields from the most recent candles.
    ///
    /// An empty series zeroes the price but keeps the previous timestamp.
    pub fn apply_latest(&self, latest: &[Candle]) -> Self {
        let metrics = crate::compute_latest_metrics(latest);
        Self {
            id: self.id.clone(),
            value: metrics.price,
            change: metrics.change,
            pct_change: metrics.change_percent,
            updated_at: metrics.time.or(self.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_signal_action_round_trip_strings() {
        assert_eq!("buy".parse::<SignalAction>().unwrap(), SignalAction::Buy);
        assert_eq!("wait".parse::<SignalAction>().unwrap(), SignalAction::Wait);
        assert!("BUY".parse::<SignalAction>().is_err());
        assert!("hold".parse::<SignalAction>().is_err());
        assert_eq!(SignalAction::Sell.to_string(), "sell");
    }

    #[test]
    fn test_signal_omits_absent_optionals() {
        let signal = NewSignal::new("EURUSD", SignalAction::Buy)
            .into_signal(7, Utc.with_ymd_and_hms(2025, 10, 31, 22, 59, 0).unwrap());
        let json = serde_json::to_value(&signal).unwrap();

        assert_eq!(json["action"], "buy");
        assert_eq!(json["created_at"], "2025-10-31T22:59:00Z");
        assert!(json.get("take_profit").is_none());
        assert!(json.get("reason").is_none());
    }

    #[test]
    fn test_candle_batch_defaults_missing_fields() {
        let batch: CandleBatch = serde_json::from_str("{}").unwrap();
        assert!(batch.symbol.is_empty());
        assert!(batch.candles.is_empty());
    }

    #[test]
    fn test_candle_missing_volume_decodes_as_zero() {
        let candle: Candle = serde_json::from_str(
            r#"{"ts":"2025-10-31T22:59:00Z","open":1.1,"high":1.2,"low":1.0,"close":1.15}"#,
        )
        .unwrap();
        assert_eq!(candle.volume, 0.0);
        assert_eq!(candle.close, 1.15);

        assert!(serde_json::from_str::<Candle>(r#"{"close":1.15}"#).is_err());
    }

    #[test]
    fn test_market_item_keeps_timestamp_without_candles() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let item = MarketItem {
            updated_at: Some(ts),
            ..MarketItem::new("DAX")
        };
        let refreshed = item.apply_latest(&[]);
        assert_eq!(refreshed.value, 0.0);
        assert_eq!(refreshed.updated_at, Some(ts));
    }
}
