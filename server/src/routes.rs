//! HTTP routes.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use exrates_common::{
    parse_date, ConversionRequest, ConversionResult, Currency, ExchangeError, HistoricalRates,
    LatestRates,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

// ── Query params ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    base: Option<String>,
    symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConvertQuery {
    from: Option<String>,
    to: Option<String>,
    amount: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoricalQuery {
    base: Option<String>,
    symbol: Option<String>,
    #[serde(rename = "startDate")]
    start_date: Option<String>,
    #[serde(rename = "endDate")]
    end_date: Option<String>,
}

/// Trimmed value, `None` when absent or blank.
fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required_currency(value: Option<String>, name: &str) -> Result<Currency, ApiError> {
    present(value)
        .map(Currency::new)
        .ok_or_else(|| ApiError::bad_request(format!("`{name}` query parameter is required")))
}

/// Exactly one target currency.
fn single_symbol(value: Option<String>) -> Result<Currency, ApiError> {
    let symbol = present(value)
        .ok_or_else(|| ApiError::bad_request("`symbol` query parameter is required"))?;
    if symbol.contains(',') {
        return Err(ApiError::bad_request(
            "More than one target currency provided, specify one",
        ));
    }
    Ok(Currency::new(symbol))
}

// ── Route definitions ────────────────────────────────────────────────────

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/latest", get(latest))
        .route("/v1/convert", get(convert))
        .route("/v1/historical", get(historical))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn latest(
    State(state): State<AppState>,
    Query(query): Query<LatestQuery>,
) -> Result<Json<LatestRates>, ApiError> {
    let base = required_currency(query.base, "base")?;
    let target = single_symbol(query.symbol)?;

    let rates = state.service.latest_rates(&base, &target).await?;
    Ok(Json(rates))
}

async fn convert(
    State(state): State<AppState>,
    Query(query): Query<ConvertQuery>,
) -> Result<Json<ConversionResult>, ApiError> {
    let (Some(from), Some(to), Some(amount)) =
        (present(query.from), present(query.to), present(query.amount))
    else {
        return Err(ApiError::bad_request(
            "from, to, and amount query parameters are required",
        ));
    };

    let amount: f64 = amount.parse().map_err(|_| ExchangeError::InvalidAmount)?;
    let mut request = ConversionRequest::new(Currency::new(from), Currency::new(to), amount);
    if let Some(date) = present(query.date) {
        request = request.on_date(parse_date(&date)?);
    }

    let result = state.service.convert(request).await?;
    Ok(Json(result))
}

async fn historical(
    State(state): State<AppState>,
    Query(query): Query<HistoricalQuery>,
) -> Result<Json<HistoricalRates>, ApiError> {
    let base = required_currency(query.base, "base")?;

    let (start, end) = match (present(query.start_date), present(query.end_date)) {
        (Some(start), Some(end)) => (start, end),
        (Some(start), None) => (start.clone(), start),
        (None, Some(end)) => (end.clone(), end),
        (None, None) => {
            return Err(ApiError::bad_request(
                "at least one of `startDate` or `endDate` query parameters is required",
            ))
        }
    };

    let target = single_symbol(query.symbol)?;

    let rates = state
        .service
        .historical_rates(&start, &end, &base, &target)
        .await?;
    Ok(Json(rates))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let cache = match state.store.ping().await {
        Ok(()) => "UP",
        Err(e) => {
            warn!(error = %e, "Cache health check failed");
            "DOWN"
        }
    };
    Json(json!({ "status": "UP", "cache": cache }))
}
