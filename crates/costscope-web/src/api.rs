//! REST API endpoints for upload and analysis

use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, DefaultBodyLimit, Multipart,
        State,
    },
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use costscope_core::{
    analyze_cloud_costs, detect_rapid_growth_trends, parse_cloud_cost_csv, project_future_costs,
    AnalysisConfig, CloudCostData, CostAnalysis, CostProjection, GrowthTrend,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Default upload size limit (10 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Multipart field carrying the CSV export
const UPLOAD_FIELD: &str = "file";

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub success: bool,
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.code.as_str() {
            "bad_request" | "parse_error" | "validation_error" => StatusCode::BAD_REQUEST,
            "payload_too_large" => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(code = %self.code, error = %self.error, "Request failed");
        } else {
            warn!(code = %self.code, error = %self.error, "Request rejected");
        }
        (status, Json(self)).into_response()
    }
}

impl ApiError {
    fn new(code: &str, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: msg.into(),
            code: code.to_string(),
        }
    }

    fn bad_request(msg: impl Into<String>) -> Self {
        Self::new("bad_request", msg)
    }

    fn validation(msg: impl Into<String>) -> Self {
        Self::new("validation_error", msg)
    }

    fn payload_too_large(msg: impl Into<String>) -> Self {
        Self::new("payload_too_large", msg)
    }
}

impl From<costscope_core::Error> for ApiError {
    fn from(err: costscope_core::Error) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

/// Application state
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: AnalysisConfig,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

/// Create the API router (API endpoints only)
pub fn create_api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/upload", post(upload_csv))
        .route("/api/analyze", post(analyze))
        .route("/api/projections", post(projections))
        .route("/api/growth-trends", post(growth_trends))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .with_state(state)
}

/// Create the full router with CORS and request tracing
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    create_api_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// ==================== Handlers ====================

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn upload_csv(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            debug!(field = ?field.name(), "Skipping multipart field");
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if !file_name.to_ascii_lowercase().ends_with(".csv") {
            return Err(ApiError::validation(format!(
                "Expected a .csv file, got '{}'",
                file_name
            )));
        }

        let content = field.text().await.map_err(multipart_error)?;
        info!(file = %file_name, bytes = content.len(), "Received cost export");

        let data = parse_cloud_cost_csv(&content)?;
        return Ok(Json(UploadResponse {
            success: true,
            data,
        }));
    }

    Err(ApiError::validation(format!(
        "Missing '{}' field in upload",
        UPLOAD_FIELD
    )))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large(err.body_text())
    } else {
        ApiError::bad_request(format!("Invalid multipart body: {}", err.body_text()))
    }
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let data = request_data(payload)?;
    let analysis = analyze_cloud_costs(&data, &state.config)?;

    Ok(Json(AnalyzeResponse {
        success: true,
        analysis,
    }))
}

async fn projections(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<ProjectionResponse>, ApiError> {
    let data = request_data(payload)?;
    let projections = project_future_costs(&data, state.config.projection_months)?;

    Ok(Json(ProjectionResponse {
        success: true,
        projections,
    }))
}

async fn growth_trends(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<GrowthTrendsResponse>, ApiError> {
    let data = request_data(payload)?;
    let growth_trends = detect_rapid_growth_trends(
        &data,
        state.config.growth_months,
        state.config.growth_threshold,
    );

    Ok(Json(GrowthTrendsResponse {
        success: true,
        growth_trends,
    }))
}

/// Unwrap either request shape and repair the data before analysis
fn request_data(
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<CloudCostData, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::validation(e.body_text()))?;
    let mut data = request.into_data();
    data.validate_and_repair()?;
    Ok(data)
}

// ==================== Request/Response Types ====================

/// Analysis request body, wrapped or bare
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AnalyzeRequest {
    Wrapped {
        #[serde(rename = "cloudCostData")]
        cloud_cost_data: CloudCostData,
    },
    Bare(CloudCostData),
}

impl AnalyzeRequest {
    pub fn into_data(self) -> CloudCostData {
        match self {
            AnalyzeRequest::Wrapped { cloud_cost_data } => cloud_cost_data,
            AnalyzeRequest::Bare(data) => data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub data: CloudCostData,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub analysis: CostAnalysis,
}

#[derive(Debug, Serialize)]
pub struct ProjectionResponse {
    pub success: bool,
    pub projections: Vec<CostProjection>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthTrendsResponse {
    pub success: bool,
    pub growth_trends: Vec<GrowthTrend>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
