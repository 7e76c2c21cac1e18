use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use super::health::HealthState;
use super::latency::LatencyStats;
use crate::cache::InsiderBuyingCache;
use crate::catalog::missing_required;
use crate::config::{ALL_SECTORS, MAX_STOCK_ID};
use crate::db::models::{InvestorLinkRow, ListedCompanyRow, OwnerFilingRow, OwnerRow};
use crate::db::SqliteRepository;
use crate::error::AppError;
use crate::owners::{holding_views, HoldingView};
use crate::reconcile::{project_rows, reconcile};
use crate::state::{CompanyDirectory, SearchHit, UriResolution};
use crate::types::{Company, FilingMetricRow, InsiderAggregate, PricePoint, ReconciledMetric, SECTORS};

#[derive(Clone)]
pub struct ApiState {
    pub repo: SqliteRepository,
    pub directory: Arc<CompanyDirectory>,
    pub insider_cache: Arc<InsiderBuyingCache>,
    pub latency: Arc<LatencyStats>,
    pub health: Arc<HealthState>,
    pub price_history_start: NaiveDate,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .route("/api/fundamentals/:stock_id", get(get_fundamentals))
        .route("/api/prices/:stock_id", get(get_prices))
        .route("/api/insiderBuying/:sector", get(get_insider_buying))
        .route("/api/search/:q", get(get_search))
        .route("/api/resolve/:uri", get(get_resolve))
        .route("/api/sectors/:sector", get(get_sector))
        .route("/api/owners/:uri", get(get_owner))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub db_ok: bool,
    pub directory_size: usize,
    pub insider_cache_age_secs: Option<i64>,
    pub insider_cache_failures: u64,
    pub last_cache_failure_at: Option<u64>,
}

#[derive(Serialize)]
pub struct LatencyResponse {
    pub samples: u64,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
}

#[derive(Serialize)]
pub struct QuarterResponse {
    #[serde(flatten)]
    pub row: FilingMetricRow,
    /// Required metrics (or their alternates) the filing did not report.
    pub missing: Vec<&'static str>,
    pub incomplete: bool,
}

#[derive(Serialize)]
pub struct FundamentalsResponse {
    pub metrics: Vec<ReconciledMetric>,
    pub quarters: Vec<QuarterResponse>,
}

#[derive(Serialize)]
pub struct ResolveResponse {
    pub resolution: UriResolution,
    pub company: Option<Company>,
}

#[derive(Debug, Serialize)]
pub struct SectorResponse {
    pub sector: String,
    pub recent_filers: Vec<ListedCompanyRow>,
    pub largest: Vec<ListedCompanyRow>,
    /// Leading 13F investors, home page only.
    pub investors: Vec<InvestorLinkRow>,
}

#[derive(Serialize)]
pub struct OwnerResponse {
    pub owner: OwnerRow,
    pub filing: Option<OwnerFilingRow>,
    pub holdings: Vec<HoldingView>,
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

fn validate_stock_id(stock_id: i64) -> Result<i64, AppError> {
    if (1..MAX_STOCK_ID).contains(&stock_id) {
        Ok(stock_id)
    } else {
        Err(AppError::BadRequest(format!("stock id {stock_id} out of range")))
    }
}

/// `Real-Estate` -> `Real Estate`
fn sector_from_path(sector: &str) -> String {
    sector.replace('-', " ")
}

fn micros_to_ms(us: Option<u64>) -> Option<f64> {
    us.map(|v| v as f64 / 1000.0)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let db_ok = match sqlx::query("SELECT 1").execute(state.repo.pool()).await {
        Ok(_) => true,
        Err(e) => {
            warn!("Health check query failed: {e}");
            false
        }
    };

    Json(HealthResponse {
        db_ok,
        directory_size: state.directory.len(),
        insider_cache_age_secs: state.insider_cache.age().map(|a| a.num_seconds()),
        insider_cache_failures: state.health.cache_failures(),
        last_cache_failure_at: state.health.last_cache_failure_at(),
    })
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    let (p50, p95, p99) = state.latency.percentiles();
    Json(LatencyResponse {
        samples: state.latency.len(),
        p50_ms: micros_to_ms(p50),
        p95_ms: micros_to_ms(p95),
        p99_ms: micros_to_ms(p99),
    })
}

async fn get_fundamentals(
    State(state): State<ApiState>,
    Path(stock_id): Path<i64>,
) -> Result<Json<FundamentalsResponse>, AppError> {
    let stock_id = validate_stock_id(stock_id)?;
    let filings = state.repo.fetch_recent_filings(stock_id).await?;
    let metrics = reconcile(&filings);

    let quarters = project_rows(&filings, &metrics)
        .into_iter()
        .zip(&filings)
        .map(|(row, original)| {
            let missing = missing_required(original);
            QuarterResponse { row, incomplete: !missing.is_empty(), missing }
        })
        .collect();

    Ok(Json(FundamentalsResponse { metrics, quarters }))
}

async fn get_prices(
    State(state): State<ApiState>,
    Path(stock_id): Path<i64>,
) -> Result<Json<Vec<PricePoint>>, AppError> {
    let stock_id = validate_stock_id(stock_id)?;
    let prices = state
        .repo
        .fetch_price_history(stock_id, state.price_history_start)
        .await?;
    Ok(Json(prices))
}

async fn get_insider_buying(
    State(state): State<ApiState>,
    Path(sector): Path<String>,
) -> Result<Json<Vec<InsiderAggregate>>, AppError> {
    let sector = sector_from_path(&sector);
    match state.insider_cache.get(&sector).await {
        Ok(rows) => Ok(Json(rows)),
        Err(e) => {
            let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
            state.health.record_cache_failure(now);
            Err(e)
        }
    }
}

async fn get_search(State(state): State<ApiState>, Path(q): Path<String>) -> Json<Vec<SearchHit>> {
    Json(state.directory.search(&q))
}

async fn get_resolve(
    State(state): State<ApiState>,
    Path(uri): Path<String>,
) -> Result<Json<ResolveResponse>, AppError> {
    let resolution = state.directory.resolve_uri(&uri);
    let company = match &resolution {
        UriResolution::Company(entry) => state.repo.company_by_uri(&entry.uri).await?,
        _ => None,
    };
    debug!(uri, ?resolution, "Resolved URI");
    Ok(Json(ResolveResponse { resolution, company }))
}

async fn get_sector(
    State(state): State<ApiState>,
    Path(sector): Path<String>,
) -> Result<Json<SectorResponse>, AppError> {
    let sector = sector_from_path(&sector);
    let (filter, investors) = if sector == ALL_SECTORS {
        (None, state.repo.investor_links().await?)
    } else if SECTORS.contains(&sector.as_str()) {
        (Some(sector.as_str()), Vec::new())
    } else {
        return Err(AppError::NotFound(format!("sector {sector}")));
    };

    let recent_filers = state.repo.recent_filers(filter).await?;
    let largest = state.repo.largest(filter).await?;
    Ok(Json(SectorResponse {
        sector: sector.clone(),
        recent_filers,
        largest,
        investors,
    }))
}

async fn get_owner(
    State(state): State<ApiState>,
    Path(uri): Path<String>,
) -> Result<Json<OwnerResponse>, AppError> {
    let owner = state
        .repo
        .owner_by_uri(&uri)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("owner {uri}")))?;

    let filing = state.repo.latest_13f_filing(owner.cik).await?;
    let holdings = match &filing {
        Some(f) => holding_views(&state.repo.holdings_for_filing(f.id).await?),
        None => Vec::new(),
    };

    Ok(Json(OwnerResponse { owner, filing, holdings }))
}
