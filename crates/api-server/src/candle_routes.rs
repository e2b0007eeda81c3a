//! Candle endpoints: latest window, time range and batch upsert.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use market_core::{Candle, CandleBatch, UpsertSummary};
use serde::Deserialize;

use crate::{parse_json, parse_limit, require_symbol, AppError, AppState};

const DEFAULT_LATEST_LIMIT: usize = 200;
const MAX_LATEST_LIMIT: usize = 1000;

#[derive(Deserialize)]
pub struct LatestQuery {
    pub symbol: Option<String>,
    pub limit: Option<String>,
}

#[derive(Deserialize)]
pub struct RangeQuery {
    pub symbol: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

pub fn candle_routes() -> Router<AppState> {
    Router::new()
        .route("/candles/latest", get(latest_candles))
        .route("/candles/range", get(range_candles))
        .route("/candles/upsert", post(upsert_candles))
}

async fn latest_candles(
    State(state): State<AppState>,
    Query(query): Query<LatestQuery>,
) -> Result<Json<Vec<Candle>>, AppError> {
    let symbol = require_symbol(query.symbol)?;
    let limit = parse_limit(query.limit.as_deref(), DEFAULT_LATEST_LIMIT, MAX_LATEST_LIMIT);

    let candles = state
        .store
        .latest_candles(&symbol, limit)
        .await
        .map_err(|e| AppError::from_store("query error", e))?;

    Ok(Json(candles))
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

async fn range_candles(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<Candle>>, AppError> {
    let (symbol, from, to) = match (query.symbol, query.from, query.to) {
        (Some(s), Some(f), Some(t)) if !s.is_empty() && !f.is_empty() && !t.is_empty() => (s, f, t),
        _ => return Err(AppError::bad_request("symbol, from, to are required", "")),
    };

    let (from, to) = match (parse_rfc3339(&from), parse_rfc3339(&to)) {
        (Some(f), Some(t)) => (f, t),
        _ => {
            return Err(AppError::bad_request(
                "invalid time format",
                "use RFC3339, e.g. 2024-01-02T15:04:05Z",
            ))
        }
    };
    if to <= from {
        return Err(AppError::bad_request("invalid range", "to must be after from"));
    }

    let candles = state
        .store
        .range_candles(&symbol, from, to)
        .await
        .map_err(|e| AppError::from_store("query error", e))?;

    Ok(Json(candles))
}

async fn upsert_candles(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<UpsertSummary>), AppError> {
    let batch: CandleBatch = parse_json(&body)?;
    if batch.symbol.is_empty() {
        return Err(AppError::bad_request("symbol is required", ""));
    }
    if batch.candles.is_empty() {
        return Err(AppError::bad_request("candles array is required", ""));
    }

    let instrument_id = state
        .store
        .instrument_id(&batch.symbol)
        .await
        .map_err(|e| AppError::from_store("query error", e))?;

    let inserted = state
        .store
        .upsert_candles(instrument_id, &batch.candles)
        .await
        .map_err(|e| AppError::from_store("batch insert error", e))?;

    tracing::info!(
        symbol = %batch.symbol,
        received = batch.candles.len(),
        inserted,
        "Upserted candle batch"
    );

    Ok((
        StatusCode::CREATED,
        Json(UpsertSummary {
            status: "ok".to_string(),
            received: batch.candles.len(),
            symbol: batch.symbol,
            inserted,
        }),
    ))
}
