//! HTTP API: clustering, prediction, model metadata, health and metrics

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info};
use typhoon_engine::{
    service::{
        ClusterRequest, ClusterResponse, ClusterService, ModelStatus, PredictRequest,
        PredictResponse, PredictionService,
    },
    ClusteringStatus, EngineError, ErrorKind, HealthRegistry, HealthResponse, ServiceStatus,
    ValidationError,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub cluster: ClusterService,
    pub prediction: PredictionService,
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(
        cluster: ClusterService,
        prediction: PredictionService,
        health_registry: HealthRegistry,
    ) -> Self {
        Self {
            cluster,
            prediction,
            health_registry,
        }
    }
}

/// Error body shared by every rejected request
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

/// Typed request failure mapped onto an HTTP status
#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    Malformed(JsonRejection),
    Internal(String),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::Malformed(e)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::InvalidParameter => StatusCode::BAD_REQUEST,
        ErrorKind::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn details(e: &EngineError) -> Option<Value> {
    match e {
        EngineError::Validation(v) => match v {
            ValidationError::EmptyBatch => None,
            ValidationError::BatchTooLarge { records, max } => {
                Some(json!({ "records": records, "max_batch": max }))
            }
            ValidationError::NegativeValue {
                record,
                field,
                value,
            } => Some(json!({ "record": record, "field": field, "value": value })),
            ValidationError::NonFinite { record, field }
            | ValidationError::EmptyCategory { record, field } => {
                Some(json!({ "record": record, "field": field }))
            }
            ValidationError::UnknownProvince { province } => {
                Some(json!({ "province": province }))
            }
            ValidationError::NonPositivePopulation { value } => {
                Some(json!({ "field": "population", "value": value }))
            }
        },
        EngineError::InvalidParameter { name, .. } => Some(json!({ "parameter": name })),
        EngineError::ModelUnavailable(_) => None,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Engine(e) => (
                status_for(e.kind()),
                ErrorBody {
                    error: e.to_string(),
                    code: e.kind().code(),
                    details: details(&e),
                },
            ),
            ApiError::Malformed(rejection) => (
                rejection.status(),
                ErrorBody {
                    error: rejection.body_text(),
                    code: "malformed_request",
                    details: None,
                },
            ),
            ApiError::Internal(message) => {
                error!(error = %message, "Internal error while serving request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: message,
                        code: "internal_error",
                        details: None,
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "Typhoon Impact Prediction API",
        "status": "active",
    }))
}

async fn cluster(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ClusterRequest>, JsonRejection>,
) -> Result<Json<ClusterResponse>, ApiError> {
    let Json(request) = payload?;
    let service = state.cluster.clone();

    let response = tokio::task::spawn_blocking(move || service.cluster(request))
        .await
        .map_err(|e| ApiError::Internal(format!("clustering worker failed: {e}")))??;

    state
        .health_registry
        .record_clustering(ClusteringStatus::from(&response))
        .await;

    Ok(Json(response))
}

async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(request) = payload?;
    let service = state.prediction.clone();

    let response = tokio::task::spawn_blocking(move || service.predict(request))
        .await
        .map_err(|e| ApiError::Internal(format!("prediction worker failed: {e}")))??;

    Ok(Json(response))
}

/// Summary consumed by the frontend's status checks
#[derive(Debug, Serialize)]
struct HealthSummary {
    status: ServiceStatus,
    models_loaded: usize,
}

async fn api_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;
    let models_loaded = usize::from(health.model_version.is_some());
    Json(HealthSummary {
        status: health.status,
        models_loaded,
    })
}

async fn model_status(State(state): State<Arc<AppState>>) -> Json<ModelStatus> {
    Json(state.prediction.model_status())
}

async fn sample_input(State(state): State<Arc<AppState>>) -> Json<PredictRequest> {
    Json(state.prediction.sample_input())
}

/// Liveness: 200 while the process serves, with the degraded reason if any
async fn healthz(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(state.health_registry.health().await)
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Result<Response, ApiError> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| ApiError::Internal(format!("failed to encode metrics: {e}")))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response())
}

/// Origins allowed to call the API from a browser
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origins: Arc<Vec<HeaderValue>>,
    allow_any: bool,
}

impl CorsPolicy {
    pub fn new(origins: &[String]) -> Self {
        Self {
            allow_any: origins.iter().any(|o| o == "*"),
            origins: Arc::new(
                origins
                    .iter()
                    .filter(|o| o.as_str() != "*")
                    .filter_map(|o| HeaderValue::from_str(o).ok())
                    .collect(),
            ),
        }
    }

    fn allows(&self, origin: &HeaderValue) -> bool {
        self.allow_any || self.origins.iter().any(|o| o == origin)
    }
}

async fn cors(State(policy): State<CorsPolicy>, request: Request, next: Next) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .filter(|o| policy.allows(o))
        .cloned();

    let preflight = origin.is_some() && request.method() == Method::OPTIONS;
    let mut response = if preflight {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    if let Some(origin) = origin {
        let headers = response.headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("content-type"),
        );
        headers.insert(header::VARY, HeaderValue::from_static("origin"));
    }

    response
}

/// Create the API router
pub fn create_router(state: Arc<AppState>, cors_policy: CorsPolicy) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/cluster", post(cluster))
        .route("/api/predict", post(predict))
        .route("/api/health", get(api_health))
        .route("/api/model-status", get(model_status))
        .route("/api/sample-input", get(sample_input))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(middleware::from_fn_with_state(cors_policy, cors))
}

/// Serve the router on a bound listener until `shutdown` resolves
pub async fn serve<F>(listener: tokio::net::TcpListener, app: Router, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(addr = %listener.local_addr()?, "Starting API server");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
