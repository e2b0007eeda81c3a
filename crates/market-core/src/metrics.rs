//! Summary figures derived from candle series for tickers, tables and tiles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Candle;

/// Price and change of the last candle relative to the one before it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestMetrics {
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub time: String,
    pub value: f64,
}

/// Headline card for an index or pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    pub name: String,
    pub symbol: String,
    pub value: f64,
    pub change: f64,
    pub change_percent: f64,
    pub previous_close: f64,
    pub day_range: String,
    pub chart_data: Vec<ChartPoint>,
}

/// Compact watchlist tile with a sparkline series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub chart_data: Vec<f64>,
}

/// Compare the last close with the previous one.
///
/// With a single candle the previous close is the last close itself, so change is zero.
/// A zero previous close yields a zero percentage rather than infinity.
pub fn compute_latest_metrics(latest: &[Candle]) -> LatestMetrics {
    let last = match latest.last() {
        Some(c) => c,
        None => {
            return LatestMetrics {
                price: 0.0,
                change: 0.0,
                change_percent: 0.0,
                time: None,
            }
        }
    };
    let prev = if latest.len() > 1 {
        &latest[latest.len() - 2]
    } else {
        last
    };

    let price = last.close;
    let change = price - prev.close;
    let change_percent = if prev.close != 0.0 {
        change / prev.close * 100.0
    } else {
        0.0
    };

    LatestMetrics {
        price,
        change,
        change_percent,
        time: Some(last.ts),
    }
}

pub fn mini_series(range: &[Candle]) -> Vec<f64> {
    range.iter().map(|c| c.close).collect()
}

pub fn overview_from(symbol: &str, name: &str, latest: &[Candle], range: &[Candle]) -> Overview {
    let metrics = compute_latest_metrics(latest);
    let closes = mini_series(range);

    let (min_v, max_v) = if closes.is_empty() {
        (metrics.price, metrics.price)
    } else {
        closes
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    };

    let chart_data = closes
        .iter()
        .enumerate()
        .map(|(idx, &value)| ChartPoint {
            time: idx.to_string(),
            value,
        })
        .collect();

    Overview {
        name: name.to_string(),
        symbol: symbol.to_string(),
        value: metrics.price,
        change: metrics.change,
        change_percent: metrics.change_percent,
        previous_close: metrics.price - metrics.change,
        day_range: format!("{:.2} - {:.2}", min_v, max_v),
        chart_data,
    }
}

pub fn tile_from(symbol: &str, name: &str, latest: &[Candle], range: &[Candle]) -> Tile {
    let metrics = compute_latest_metrics(latest);
    Tile {
        symbol: symbol.to_string(),
        name: name.to_string(),
        price: metrics.price,
        change: metrics.change,
        change_percent: metrics.change_percent,
        chart_data: mini_series(range),
    }
}
