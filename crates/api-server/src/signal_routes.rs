//! Signal endpoints: list recent signals for a symbol and record new ones.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use market_core::{NewSignal, Signal, SignalAction};
use serde::Deserialize;

use crate::{parse_json, parse_limit, require_symbol, AppError, AppState};

const DEFAULT_SIGNAL_LIMIT: usize = 50;
const MAX_SIGNAL_LIMIT: usize = 1000;

#[derive(Deserialize)]
pub struct SignalsQuery {
    pub symbol: Option<String>,
    pub limit: Option<String>,
}

/// `action` stays a string so a bad value gets its own error instead of a decode failure.
#[derive(Deserialize)]
pub struct CreateSignalRequest {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub action: String,
    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
    pub confidence: Option<f64>,
    pub pnl: Option<f64>,
    pub chart_screenshot: Option<String>,
    pub reason: Option<String>,
}

impl CreateSignalRequest {
    fn validate(self) -> Result<NewSignal, AppError> {
        if self.symbol.is_empty() {
            return Err(AppError::bad_request("symbol is required", ""));
        }
        let action: SignalAction = self.action.parse().map_err(|_| {
            AppError::bad_request("invalid action", "must be one of buy, sell, wait")
        })?;

        Ok(NewSignal {
            symbol: self.symbol,
            action,
            take_profit: self.take_profit,
            stop_loss: self.stop_loss,
            confidence: self.confidence,
            pnl: self.pnl,
            chart_screenshot: self.chart_screenshot,
            reason: self.reason,
        })
    }
}

pub fn signal_routes() -> Router<AppState> {
    Router::new().route("/signals", get(list_signals).post(create_signal))
}

async fn list_signals(
    State(state): State<AppState>,
    Query(query): Query<SignalsQuery>,
) -> Result<Json<Vec<Signal>>, AppError> {
    let symbol = require_symbol(query.symbol)?;
    let limit = parse_limit(query.limit.as_deref(), DEFAULT_SIGNAL_LIMIT, MAX_SIGNAL_LIMIT);

    let signals = state
        .store
        .recent_signals(&symbol, limit)
        .await
        .map_err(|e| AppError::from_store("query error", e))?;

    Ok(Json(signals))
}

async fn create_signal(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Signal>), AppError> {
    let request: CreateSignalRequest = parse_json(&body)?;
    let new_signal = request.validate()?;

    let instrument_id = state
        .store
        .instrument_id(&new_signal.symbol)
        .await
        .map_err(|e| AppError::from_store("query error", e))?;

    let created = state
        .store
        .insert_signal(instrument_id, &new_signal)
        .await
        .map_err(|e| AppError::from_store("insert error", e))?;

    tracing::info!(
        id = created.id,
        symbol = %created.symbol,
        action = %created.action,
        "Recorded signal"
    );

    Ok((StatusCode::CREATED, Json(created)))
}
