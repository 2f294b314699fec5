mod request;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::{
    Router,
    extract::{
        Json, Path as UrlPath, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::core::{
    FormattedSummary, MissedDayPolicy, SimulationError, SimulationEvent, Summary, simulate,
};
use crate::data::{Catalog, Company, DataError, Listing, PriceStore};

use request::{BacktestPayload, api_request_from_payload};
pub use request::{BacktestArgs, BacktestRequest, CliMissedDayPolicy, build_request};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

const COMPANIES_FILE: &str = "companies.json";
const QUOTE_URL_BASE: &str = "https://tw.stock.yahoo.com/quote/";

/// Immutable state shared by every request.
#[derive(Debug, Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub prices: PriceStore,
}

impl AppState {
    pub fn load(data_dir: &Path) -> Result<Self, DataError> {
        let catalog = Catalog::load(&data_dir.join(COMPANIES_FILE))?;
        Ok(Self {
            catalog,
            prices: PriceStore::new(data_dir),
        })
    }
}

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("{0}")]
    Request(String),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

impl BacktestError {
    fn status(&self) -> StatusCode {
        match self {
            BacktestError::Request(_) => StatusCode::BAD_REQUEST,
            BacktestError::Data(err) => data_error_status(err),
            BacktestError::Simulation(SimulationError::EmptyRange) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            BacktestError::Simulation(_) => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestReport {
    pub symbol: String,
    pub display_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub investment_days: Vec<u32>,
    pub missed_day_policy: MissedDayPolicy,
    pub events: Vec<SimulationEvent>,
    pub summary: Summary,
    pub formatted: FormattedSummary,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CompanyQuery {
    search: Option<String>,
    industry: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompanySummary<'a> {
    symbol: &'a str,
    display_name: &'a str,
    sector: &'a str,
    industry: &'a str,
    ipo_date: Option<NaiveDate>,
}

impl<'a> From<&'a Listing> for CompanySummary<'a> {
    fn from(listing: &'a Listing) -> Self {
        Self {
            symbol: &listing.symbol,
            display_name: listing.company.display_name(),
            sector: &listing.company.sector,
            industry: &listing.company.industry,
            ipo_date: listing.company.ipo_date,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompanyDetail<'a> {
    symbol: &'a str,
    display_name: &'a str,
    quote_url: String,
    profile: &'a Company,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Resolves the company, loads its prices and runs the backtest.
pub async fn run_backtest(
    state: &AppState,
    request: BacktestRequest,
) -> Result<BacktestReport, BacktestError> {
    let listing = match request.symbol.as_deref() {
        Some(symbol) => state.catalog.select(symbol)?,
        None => {
            let first = state
                .catalog
                .first()
                .ok_or_else(|| BacktestError::Request("company catalog is empty".to_string()))?;
            state.catalog.select(&first.symbol)?
        }
    };
    listing.check_start_date(request.plan.start_date)?;

    let data = state.prices.load(&listing.symbol).await?;
    let result = simulate(&data.prices, &request.plan)?;
    debug!(
        symbol = %listing.symbol,
        events = result.events.len(),
        total_return = result.summary.total_return,
        "backtest complete"
    );

    let plan = request.plan;
    let formatted = FormattedSummary::from(&result.summary);
    Ok(BacktestReport {
        symbol: listing.symbol.clone(),
        display_name: listing.company.display_name().to_string(),
        start_date: plan.start_date,
        end_date: plan.end_date,
        investment_days: plan.investment_days.into_iter().collect(),
        missed_day_policy: plan.missed_day_policy,
        events: result.events,
        summary: result.summary,
        formatted,
    })
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route("/api/companies", get(companies_handler))
        .route("/api/companies/:symbol", get(company_handler))
        .route("/api/industries", get(industries_handler))
        .route(
            "/api/backtest",
            get(backtest_get_handler).post(backtest_post_handler),
        )
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(state: AppState, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let companies = state.catalog.len();
    let app = router(Arc::new(state));

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, companies, "DCA backtest server listening");
    info!("Local access: http://127.0.0.1:{port}/");

    axum::serve(listener, app).await
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn companies_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<CompanyQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, &rejection.body_text());
        }
    };
    let companies: Vec<CompanySummary<'_>> = state
        .catalog
        .listings(query.search.as_deref(), query.industry.as_deref())
        .into_iter()
        .map(CompanySummary::from)
        .collect();
    json_response(StatusCode::OK, companies)
}

async fn company_handler(
    State(state): State<Arc<AppState>>,
    UrlPath(symbol): UrlPath<String>,
) -> Response {
    match state.catalog.select(&symbol) {
        Ok(listing) => json_response(
            StatusCode::OK,
            CompanyDetail {
                symbol: &listing.symbol,
                display_name: listing.company.display_name(),
                quote_url: format!("{QUOTE_URL_BASE}{}", listing.symbol),
                profile: &listing.company,
            },
        ),
        Err(err) => error_response(data_error_status(&err), &err.to_string()),
    }
}

async fn industries_handler(State(state): State<Arc<AppState>>) -> Response {
    json_response(StatusCode::OK, state.catalog.industries())
}

async fn backtest_get_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Query<BacktestPayload>, QueryRejection>,
) -> Response {
    match payload {
        Ok(Query(payload)) => backtest_handler_impl(&state, payload).await,
        Err(rejection) => error_response(StatusCode::BAD_REQUEST, &rejection.body_text()),
    }
}

async fn backtest_post_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BacktestPayload>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(payload)) => backtest_handler_impl(&state, payload).await,
        Err(rejection) => error_response(StatusCode::BAD_REQUEST, &rejection.body_text()),
    }
}

async fn backtest_handler_impl(state: &AppState, payload: BacktestPayload) -> Response {
    let today = Local::now().date_naive();
    let request = match api_request_from_payload(payload, today) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    match run_backtest(state, request).await {
        Ok(report) => json_response(StatusCode::OK, report),
        Err(err) => {
            let status = err.status();
            if status.is_server_error() {
                warn!(error = %err, "backtest failed");
            }
            error_response(status, &err.to_string())
        }
    }
}

fn data_error_status(err: &DataError) -> StatusCode {
    match err {
        DataError::UnknownSymbol(_) | DataError::MissingPrices(_) => StatusCode::NOT_FOUND,
        DataError::InvalidSymbol(_) | DataError::BeforeListing { .. } => StatusCode::BAD_REQUEST,
        DataError::IncompleteCompany { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        DataError::Io { .. } | DataError::Json { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
