use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::corporate_actions::{
    AppliedCorporateAction, CorporateActionProcessor, CorporateActionRequest,
};
use crate::error::{LedgerError, LedgerResult};
use crate::fees::FeeSchedule;
use crate::middleware::request_logging;
use crate::models::{CorporateActionRecord, PriceTick};
use crate::reporting::{
    HistoricalValue, Portfolio, PortfolioReporter, RewardLedger, Stats, TodayStock,
};
use crate::rewards::{RewardLedgerWriter, RewardOutcome, RewardRequest};
use crate::store::{reporting_day, PriceStore, Store};
use crate::validation::{parse_decimal, parse_timestamp, require_symbol};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub writer: RewardLedgerWriter,
    pub processor: CorporateActionProcessor,
    pub reporter: PortfolioReporter,
    pub prices: PriceStore,
}

impl AppState {
    pub fn new(store: Store, fees: FeeSchedule) -> Self {
        let prices = PriceStore::new(store.clone());
        Self {
            writer: RewardLedgerWriter::new(store.clone(), prices.clone(), fees),
            processor: CorporateActionProcessor::new(store.clone()),
            reporter: PortfolioReporter::new(store, prices.clone()),
            prices,
        }
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/reward", post(post_reward))
        .route("/api/corporate-action", post(post_corporate_action))
        .route("/api/price-ticks", post(post_price_ticks))
        .route("/api/today-stocks/:user_id", get(get_today_stocks))
        .route("/api/historical-inr/:user_id", get(get_historical_inr))
        .route("/api/stats/:user_id", get(get_stats))
        .route("/api/portfolio/:user_id", get(get_portfolio))
        .route("/api/ledger/:reward_id", get(get_reward_ledger))
        .route("/api/corporate-actions", get(get_corporate_actions))
        .with_state(state)
        .layer(middleware::from_fn(request_logging))
}

// ===== Route Handlers =====

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn post_reward(
    State(state): State<AppState>,
    payload: Result<Json<RewardRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let outcome = blocking(move || state.writer.record_reward(request)).await?;

    Ok(match outcome {
        RewardOutcome::Recorded(receipt) => Json(receipt).into_response(),
        RewardOutcome::Duplicate => Json(json!({
            "status": "duplicate",
            "message": "reward already processed",
        }))
        .into_response(),
    })
}

async fn post_corporate_action(
    State(state): State<AppState>,
    payload: Result<Json<CorporateActionRequest>, JsonRejection>,
) -> Result<Json<CorporateActionResponse>, ApiError> {
    let Json(request) = payload?;
    let applied = blocking(move || state.processor.apply(request)).await?;
    Ok(Json(CorporateActionResponse {
        message: "Corporate action applied successfully",
        applied,
    }))
}

/// Append externally observed prices. All ticks land or none do.
async fn post_price_ticks(
    State(state): State<AppState>,
    payload: Result<Json<Vec<PriceTickInput>>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(inputs) = payload?;
    let now = Utc::now();
    let ticks = inputs
        .into_iter()
        .map(|input| input.into_tick(now))
        .collect::<LedgerResult<Vec<_>>>()?;

    let appended = blocking(move || state.prices.append_batch(&ticks)).await?;
    Ok(Json(json!({ "appended": appended })))
}

async fn get_today_stocks(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<TodayStock>>, ApiError> {
    let rows = blocking(move || state.reporter.today_stocks(&user_id, Utc::now())).await?;
    Ok(Json(rows))
}

async fn get_historical_inr(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<HistoricalValue>>, ApiError> {
    let today = reporting_day(Utc::now());
    let rows = blocking(move || state.reporter.historical_inr(&user_id, today)).await?;
    Ok(Json(rows))
}

async fn get_stats(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Stats>, ApiError> {
    let stats = blocking(move || state.reporter.stats(&user_id, Utc::now())).await?;
    Ok(Json(stats))
}

async fn get_portfolio(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Portfolio>, ApiError> {
    let portfolio = blocking(move || state.reporter.portfolio(&user_id)).await?;
    Ok(Json(portfolio))
}

async fn get_reward_ledger(
    State(state): State<AppState>,
    Path(reward_id): Path<String>,
) -> Result<Json<RewardLedger>, ApiError> {
    let ledger = blocking(move || state.reporter.ledger_for_reward(&reward_id)).await?;
    Ok(Json(ledger))
}

async fn get_corporate_actions(
    State(state): State<AppState>,
    Query(params): Query<CorporateActionQuery>,
) -> Result<Json<Vec<CorporateActionRecord>>, ApiError> {
    let records =
        blocking(move || state.reporter.corporate_actions(params.symbol.as_deref())).await?;
    Ok(Json(records))
}

/// SQLite calls block; keep them off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> LedgerResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("blocking task failed: {}", e)))?
        .map_err(ApiError::from)
}

// ===== Request/Response Types =====

#[derive(Deserialize)]
struct CorporateActionQuery {
    symbol: Option<String>,
}

#[derive(Deserialize)]
struct PriceTickInput {
    stock_symbol: String,
    price_inr: Option<Value>,
    /// Defaults to the time of the request
    fetched_at: Option<String>,
}

impl PriceTickInput {
    fn into_tick(self, now: chrono::DateTime<Utc>) -> LedgerResult<PriceTick> {
        let price_inr = parse_decimal(self.price_inr.as_ref(), "price_inr")?
            .ok_or_else(|| LedgerError::validation("price_inr is required"))?;
        let fetched_at = match self.fetched_at.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => parse_timestamp(raw, "fetched_at")?,
            _ => now,
        };
        Ok(PriceTick {
            stock_symbol: require_symbol(&self.stock_symbol, "stock_symbol")?,
            price_inr,
            fetched_at,
        })
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct CorporateActionResponse {
    message: &'static str,
    #[serde(flatten)]
    applied: AppliedCorporateAction,
}

// ===== Error Handling =====

#[derive(Debug)]
pub enum ApiError {
    Internal(anyhow::Error),
    NotFound(String),
    BadRequest(String),
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        if err.is_internal() {
            return ApiError::Internal(anyhow::Error::new(err));
        }
        match err {
            LedgerError::NotFound(_) => ApiError::NotFound(err.to_string()),
            _ => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Internal(err) => {
                tracing::error!("Internal error: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
