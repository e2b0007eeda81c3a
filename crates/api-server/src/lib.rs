//! HTTP service for terminal market data: 1-minute candles and trading signals.

pub mod candle_routes;
pub mod config;
pub mod request_id;
pub mod signal_routes;


use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::Request,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use market_core::{MarketError, MarketStore};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;

pub use config::{CorsPolicy, ServerConfig};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MarketStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }
}

/// JSON error body: `{"error": "...", "details": "..."}`
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub details: String,
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    body: ApiError,
}

impl AppError {
    pub fn new(status: StatusCode, error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiError {
                error: error.into(),
                details: details.into(),
            },
        }
    }

    pub fn bad_request(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error, details)
    }

    pub fn internal(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error, details)
    }

    /// Unknown symbols are the caller's fault; anything else from the store is ours.
    pub fn from_store(context: &str, e: MarketError) -> Self {
        match e {
            MarketError::UnknownSymbol(_) => Self::bad_request("invalid symbol", e.to_string()),
            other => Self::internal(context, other.to_string()),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(error = %self.body.error, details = %self.body.details, "request failed");
        } else {
            tracing::debug!(error = %self.body.error, details = %self.body.details, "request rejected");
        }
        (self.status, Json(self.body)).into_response()
    }
}

/// Lenient query limit: missing, non-numeric or non-positive falls back to `default`,
/// anything above `max` is clamped.
pub fn parse_limit(raw: Option<&str>, default: usize, max: usize) -> usize {
    match raw.filter(|s| !s.is_empty()).map(str::parse::<i64>) {
        Some(Ok(n)) if n > 0 => (n as usize).min(max),
        _ => default,
    }
}

/// Decode a JSON body without insisting on a `Content-Type` header.
pub(crate) fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|e| AppError::bad_request("invalid JSON", e.to_string()))
}

/// Returns the symbol if present and non-empty.
pub(crate) fn require_symbol(symbol: Option<String>) -> Result<String, AppError> {
    symbol
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::bad_request("symbol is required", ""))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub fn build_router(state: AppState, cors: CorsPolicy) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(candle_routes::candle_routes())
        .merge(signal_routes::signal_routes())
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request| {
                tracing::info_span!(
                    "http_request",
                    method = %req.method(),
                    uri = %req.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .layer(cors.into_layer())
        .with_state(state)
}

pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "api_server=info,market_store=info,tower_http=info".into());

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env()?;
    tracing::info!("Starting market API server");

    let store = market_store::connect(&config.database_url, config.db_max_connections)
        .await
        .map_err(|e| anyhow::anyhow!("db connect error: {}", e))?;
    store
        .ping()
        .await
        .map_err(|e| anyhow::anyhow!("db ping error: {}", e))?;

    let app = build_router(AppState::new(store), config.cors.clone());

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
