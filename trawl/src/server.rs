//! HTTP API over the aggregator.
//!
//! Every route lives under `/api/v1` except `/health`. Errors are returned
//! as `{error, message}` with 400 for bad input, 404 for unknown entities
//! and 500 otherwise. Requests to API routes are counted per endpoint.

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use trawl_core::model::{CheckLevel, ReportCategory};
use trawl_core::validation::validate_domain;
use trawl_core::{Aggregator, TrawlError};

use crate::usage::{self, UsageCounters};

pub const DEFAULT_RECENT_LIMIT: usize = 10;
pub const DEFAULT_ENTITY_LIMIT: usize = 20;
pub const DEFAULT_DOMAIN_LIMIT: usize = 50;
pub const DEFAULT_ENTITY_SEARCH_LIMIT: usize = 10;
pub const DEFAULT_DOMAIN_SEARCH_LIMIT: usize = 20;

pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub usage: UsageCounters,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: "Invalid input",
            message: message.into(),
        }
    }

    fn not_found(error: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error,
            message: message.into(),
        }
    }
}

impl From<TrawlError> for ApiError {
    fn from(err: TrawlError) -> Self {
        if err.is_input_error() {
            return Self::bad_request(err.to_string());
        }
        error!("Request failed: {}", err);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "Internal error",
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.error,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest {
    #[serde(default)]
    url: String,
    #[serde(default)]
    check_level: CheckLevel,
}

#[derive(Debug, Deserialize)]
struct BatchRequest {
    #[serde(default)]
    domains: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ReportRequest {
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecentQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EntitiesQuery {
    limit: Option<usize>,
    offset: Option<usize>,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DomainsQuery {
    limit: Option<usize>,
    offset: Option<usize>,
    entity_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
    limit: Option<usize>,
}

async fn verify(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    if req.url.trim().is_empty() {
        return Err(ApiError::bad_request("URL is required"));
    }

    let report = state.aggregator.evaluate(&req.url, req.check_level).await?;
    Ok(Json(report))
}

async fn verify_domain(
    State(state): State<Arc<AppState>>,
    Path(domain): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let check = state.aggregator.check_domain(&domain).await?;
    Ok(Json(check))
}

async fn verify_batch(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let report = state.aggregator.check_domains(&req.domains).await?;
    Ok(Json(report))
}

async fn similar_domains(
    State(state): State<Arc<AppState>>,
    Path(domain): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let result = state.aggregator.find_similar(&domain)?;
    Ok(Json(result))
}

async fn validate(Path(domain): Path<String>) -> Json<Value> {
    Json(json!({
        "validation": validate_domain(&domain),
        "timestamp": Utc::now(),
    }))
}

async fn submit_report(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ReportRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let category = match req.category.as_deref() {
        Some(raw) => raw.parse::<ReportCategory>().map_err(ApiError::bad_request)?,
        None => ReportCategory::default(),
    };

    let report = state
        .aggregator
        .submit_report(&req.url, &req.description, category)
        .await?;
    Ok((StatusCode::CREATED, Json(report)))
}

async fn recent_reports(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecentQuery>,
) -> ApiResult<impl IntoResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    let reports = state.aggregator.recent_reports(limit).await?;

    Ok(Json(json!({
        "count": reports.len(),
        "reports": reports,
        "timestamp": Utc::now(),
    })))
}

async fn report_stats(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let stats = state.aggregator.report_stats().await?;
    Ok(Json(stats))
}

async fn list_entities(
    State(state): State<Arc<AppState>>,
    query: Result<Query<EntitiesQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    let (entities, pagination) = state.aggregator.list_entities(
        query.country.as_deref(),
        query.limit.unwrap_or(DEFAULT_ENTITY_LIMIT),
        query.offset.unwrap_or(0),
    )?;

    Ok(Json(json!({
        "entities": entities,
        "pagination": pagination,
        "timestamp": Utc::now(),
    })))
}

async fn entity(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    match state.aggregator.entity(&entity_id).await? {
        Some(entity) => Ok(Json(json!({
            "entity": entity,
            "timestamp": Utc::now(),
        }))),
        None => Err(ApiError::not_found(
            "Entity not found",
            format!("no entity with id '{}'", entity_id),
        )),
    }
}

async fn entity_domains(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let domains = state.aggregator.entity_domains(&entity_id).ok_or_else(|| {
        ApiError::not_found(
            "Entity not found or has no domains",
            format!("no official domains for entity '{}'", entity_id),
        )
    })?;

    Ok(Json(json!({
        "entityId": entity_id,
        "count": domains.len(),
        "domains": domains,
        "timestamp": Utc::now(),
    })))
}

async fn search_entities(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    let results = state.aggregator.search_entities(
        &query.q,
        query.limit.unwrap_or(DEFAULT_ENTITY_SEARCH_LIMIT),
    )?;

    Ok(Json(json!({
        "query": query.q,
        "count": results.len(),
        "results": results,
        "timestamp": Utc::now(),
    })))
}

async fn list_domains(
    State(state): State<Arc<AppState>>,
    query: Result<Query<DomainsQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    let (domains, pagination) = state.aggregator.list_domains(
        query.entity_id.as_deref(),
        query.limit.unwrap_or(DEFAULT_DOMAIN_LIMIT),
        query.offset.unwrap_or(0),
    )?;

    Ok(Json(json!({
        "domains": domains,
        "pagination": pagination,
        "timestamp": Utc::now(),
    })))
}

async fn search_domains(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    let results = state.aggregator.search_domains(
        &query.q,
        query.limit.unwrap_or(DEFAULT_DOMAIN_SEARCH_LIMIT),
    )?;

    Ok(Json(json!({
        "query": query.q,
        "count": results.len(),
        "results": results,
        "timestamp": Utc::now(),
    })))
}

async fn stats(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let registry = state.aggregator.registry_stats();
    let reports = state.aggregator.report_stats().await?;
    let usage = state.usage.snapshot();

    Ok(Json(json!({
        "system": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "status": "operational",
            "uptimeSecs": usage.uptime_secs,
        },
        "entities": {
            "total": registry.entities,
            "byCountry": registry.entities_by_country,
        },
        "domains": {
            "total": registry.domains,
            "byCategory": registry.domains_by_category,
        },
        "reports": {
            "total": reports.total_reports,
            "today": reports.reports_today,
            "trackedUrls": reports.tracked_urls,
        },
        "usage": usage,
        "timestamp": Utc::now(),
    })))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now(),
    }))
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Endpoint not found",
            "message": "No route matches this request",
        })),
    )
}

pub fn router(aggregator: Arc<Aggregator>) -> Router {
    let state = Arc::new(AppState {
        aggregator,
        usage: UsageCounters::new(),
    });

    let api = Router::new()
        .route("/verify", post(verify))
        .route("/verify/domain/:domain", get(verify_domain))
        .route("/verify/batch", post(verify_batch))
        .route("/entities", get(list_entities))
        .route("/entities/search", get(search_entities))
        .route("/entities/:entity_id", get(entity))
        .route("/entities/:entity_id/domains", get(entity_domains))
        .route("/domains", get(list_domains))
        .route("/domains/search", get(search_domains))
        .route("/domains/similar/:domain", get(similar_domains))
        .route("/domains/validate/:domain", get(validate))
        .route("/report", post(submit_report))
        .route("/report/recent", get(recent_reports))
        .route("/report/stats", get(report_stats))
        .route("/stats", get(stats))
        .route_layer(middleware::from_fn_with_state(state.clone(), usage::track));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve the API until the process is stopped.
pub async fn serve(aggregator: Arc<Aggregator>, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?;

    info!("API listening on {}", addr);
    axum::serve(listener, router(aggregator)).await?;
    Ok(())
}
