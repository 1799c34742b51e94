//! HTTP API: analysis endpoint plus health checks and Prometheus metrics

use crate::config::ServiceConfig;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prodwatch_lib::{
    anomaly::check_conservation,
    health::{components, ComponentStatus, HealthRegistry},
    observability::{PipelineMetrics, StructuredLogger},
    AnalysisConfig, AnalysisError, AnalysisReport, Analyzer, PeriodReport,
    ReportPeriod, ReportRequest,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: PipelineMetrics,
    pub logger: StructuredLogger,
    /// Baseline parameters that request overrides are merged onto
    pub analysis: AnalysisConfig,
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: PipelineMetrics,
        config: &ServiceConfig,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            logger: StructuredLogger::new(config.analysis.site_name.clone()),
            analysis: config.analysis.clone(),
            max_body_bytes: config.max_body_bytes,
            request_timeout: config.request_timeout(),
        }
    }
}

/// Body of `POST /api/v1/analyze`
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub production_csv: String,
    #[serde(default)]
    pub revenue_csv: BTreeMap<ReportPeriod, String>,
    /// Partial `AnalysisConfig` applied over the service defaults
    #[serde(default)]
    pub config: Option<serde_json::Value>,
}

/// Request failure rendered as `{"error": "..."}`
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(msg) | ApiError::Internal(msg) => f.write_str(msg),
        }
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// 200 while operational (degraded included), 503 once a component is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        return ApiError::Internal(format!("Failed to encode metrics: {}", e)).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalysisReport>, ApiError> {
    let started = Instant::now();

    let result = match body {
        Ok(Json(request)) => run_analysis(&state, request).await,
        Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
    };
    state
        .metrics
        .observe_analysis_latency(started.elapsed().as_secs_f64());

    if let Err(e) = &result {
        state.metrics.inc_analysis_errors();
        state.logger.log_analysis_failed(&e.to_string());
    }
    result.map(Json)
}

async fn run_analysis(state: &AppState, body: AnalyzeRequest) -> Result<AnalysisReport, ApiError> {
    let config = merge_config(&state.analysis, body.config)?;
    let analyzer = Analyzer::new(config).map_err(AnalysisError::from)?;

    let revenue = body
        .revenue_csv
        .iter()
        .map(|(period, content)| (*period, content.as_str()));
    let prepared = ReportRequest::from_csv(
        &body.production_csv,
        revenue,
        analyzer.config().revenue_skip_rows,
    )
    .map_err(AnalysisError::from)
    .and_then(|request| analyzer.prepare(&request))?;

    // Rejected uploads are the client's fault and leave component health alone
    state.health_registry.set_healthy(components::INGEST).await;
    state.metrics.record_normalized(&prepared.stats);

    // Periods share nothing, so each runs on its own blocking worker
    let handles: Vec<_> = prepared
        .periods
        .into_iter()
        .map(|input| {
            let analyzer = analyzer.clone();
            tokio::task::spawn_blocking(move || analyzer.analyze_period(input))
        })
        .collect();

    let mut periods: Vec<PeriodReport> = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(report) => periods.push(report),
            Err(e) => {
                state
                    .health_registry
                    .set_unhealthy(components::PIPELINE, e.to_string())
                    .await;
                return Err(ApiError::Internal(format!("Analysis worker failed: {}", e)));
            }
        }
    }
    let mismatch = periods
        .iter()
        .find_map(|report| check_conservation(&report.output.samples, &report.output.dips).err());
    match mismatch {
        Some(e) => {
            state
                .health_registry
                .set_degraded(components::PIPELINE, e.to_string())
                .await
        }
        None => state.health_registry.set_healthy(components::PIPELINE).await,
    }

    for report in &periods {
        state
            .metrics
            .record_period(report.period.as_str(), &report.output.summary);
    }

    Ok(analyzer.assemble(prepared.stats, periods))
}

/// Apply a partial JSON object of overrides onto the service defaults
fn merge_config(
    base: &AnalysisConfig,
    overrides: Option<serde_json::Value>,
) -> Result<AnalysisConfig, ApiError> {
    let Some(overrides) = overrides else {
        return Ok(base.clone());
    };
    let serde_json::Value::Object(fields) = overrides else {
        return Err(ApiError::BadRequest("config must be a JSON object".to_string()));
    };

    let mut merged = serde_json::to_value(base)
        .map_err(|e| ApiError::Internal(format!("Failed to encode defaults: {}", e)))?;
    if let serde_json::Value::Object(target) = &mut merged {
        target.extend(fields);
    }

    serde_json::from_value(merged)
        .map_err(|e| ApiError::BadRequest(format!("Invalid config override: {}", e)))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.max_body_bytes;
    let timeout = state.request_timeout;

    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/analyze", post(analyze))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until the shutdown future resolves
pub async fn serve<F>(addr: &str, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
