use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use hct_ai_core::{IntakeForm, PredictionError, PredictionResult, PredictionService};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const SERVICE_NAME: &str = "HCT Survival Prediction API";
const ENDPOINTS: [&str; 2] = ["/predict", "/health"];

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
    pub start_time: Instant,
    pub req_count: Arc<AtomicUsize>,
    pub metrics: Option<PrometheusHandle>,
    pub cors_permissive: bool,
}

impl AppState {
    pub fn new(service: PredictionService) -> Self {
        Self {
            service: Arc::new(service),
            start_time: Instant::now(),
            req_count: Arc::new(AtomicUsize::new(0)),
            metrics: None,
            cors_permissive: true,
        }
    }

    /// Expose `/metrics` through an installed Prometheus recorder
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn with_cors(mut self, permissive: bool) -> Self {
        self.cors_permissive = permissive;
        self
    }

    fn record_request(&self) -> u64 {
        self.req_count.fetch_add(1, Ordering::Relaxed) as u64 + 1
    }

    fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
struct IndexResponse {
    message: &'static str,
    version: &'static str,
    endpoints: [&'static str; 2],
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    model_loaded: bool,
    model_type: Option<String>,
    model_hash: Option<String>,
    uptime_secs: u64,
    req_total: u64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    fn not_found<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl From<PredictionError> for ApiError {
    fn from(err: PredictionError) -> Self {
        match err {
            PredictionError::MissingFields(_) | PredictionError::InvalidInput(_) => {
                Self::bad_request(err.to_string())
            }
            PredictionError::ModelUnavailable => Self::internal(err.to_string()),
            // Cause is already logged by the service
            PredictionError::Inference(_) => Self::internal("Internal server error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, payload).into_response()
    }
}

/// Serve the API on `addr` until `shutdown` resolves
pub async fn start_server<F>(state: AppState, addr: &str, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);
    let listener = bind_listener(addr).await?;
    let local_addr = listener
        .local_addr()
        .context("failed to read bound API address")?;
    info!(%local_addr, "HCT prediction API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server terminated unexpectedly")
}

async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind API listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind API listener on {addr}"))
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors_permissive = state.cors_permissive;
    let router = Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/predict", post(handle_predict))
        .route("/metrics", get(handle_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state));

    if cors_permissive {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

async fn handle_index(State(state): State<SharedState>) -> Json<IndexResponse> {
    state.record_request();
    Json(IndexResponse {
        message: SERVICE_NAME,
        version: hct_ai_core::VERSION,
        endpoints: ENDPOINTS,
    })
}

async fn handle_health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let req_total = state.record_request();
    Json(HealthResponse {
        status: "healthy",
        model_loaded: state.service.is_ready(),
        model_type: state.service.model_type(),
        model_hash: state.service.model_hash(),
        uptime_secs: state.uptime_seconds(),
        req_total,
    })
}

async fn handle_predict(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<PredictionResult>, ApiError> {
    state.record_request();

    let form = parse_intake(&state, &body)?;
    let prediction = state.service.predict(&form).map_err(|err| {
        if err.is_client_error() {
            warn!(error = %err, "rejected prediction request");
        }
        metrics::counter!("hct_prediction_errors_total", "kind" => err.kind()).increment(1);
        ApiError::from(err)
    })?;

    metrics::counter!(
        "hct_predictions_total",
        "risk_category" => prediction.risk_category.as_str()
    )
    .increment(1);
    Ok(Json(prediction))
}

/// Decode the request body into an intake form.
///
/// Model availability is checked first so a service without a model answers
/// every request the same way.
fn parse_intake(state: &AppState, body: &[u8]) -> Result<IntakeForm, ApiError> {
    if !state.service.is_ready() {
        metrics::counter!("hct_prediction_errors_total", "kind" => "model_unavailable")
            .increment(1);
        return Err(PredictionError::ModelUnavailable.into());
    }

    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(no_data());
    }

    let payload: Value = serde_json::from_slice(body).map_err(invalid_payload)?;
    match payload {
        Value::Null => Err(no_data()),
        Value::Object(ref fields) if fields.is_empty() => Err(no_data()),
        Value::Object(_) => serde_json::from_value(payload).map_err(invalid_payload),
        _ => Err(invalid_payload("expected a JSON object")),
    }
}

fn no_data() -> ApiError {
    metrics::counter!("hct_prediction_errors_total", "kind" => "no_data").increment(1);
    ApiError::bad_request("No data provided")
}

fn invalid_payload(err: impl std::fmt::Display) -> ApiError {
    metrics::counter!("hct_prediction_errors_total", "kind" => "invalid_payload").increment(1);
    ApiError::bad_request(format!("Invalid JSON payload: {err}"))
}

async fn handle_metrics(State(state): State<SharedState>) -> Result<Response, ApiError> {
    state.record_request();
    let handle = state
        .metrics
        .as_ref()
        .ok_or_else(|| ApiError::not_found("metrics are disabled"))?;

    let mut response = Response::new(Body::from(handle.render()));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    Ok(response)
}
