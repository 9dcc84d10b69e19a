use crate::api_errors::AppError;
use crate::app_state::AppState;
use crate::feature_reconciler::PredictionRequest;
use crate::prediction_service::{ModelInfo, PredictionResult};
use crate::vocabulary::CategoricalVocabularies;
use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info_span, warn};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    model_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    uptime_secs: i64,
}

/// Category lists for the common form fields.
#[derive(Debug, Default, Serialize)]
pub struct BrandsResponse {
    brands: Vec<String>,
    models: Vec<String>,
    fuel_types: Vec<String>,
    transmissions: Vec<String>,
    cities: Vec<String>,
    states: Vec<String>,
}

impl BrandsResponse {
    fn from_options(options: &CategoricalVocabularies) -> Self {
        let values = |key: &str| {
            options
                .get(key)
                .map(|v| v.values().to_vec())
                .unwrap_or_default()
        };
        Self {
            brands: values("brand"),
            models: values("model"),
            fuel_types: values("fuelType"),
            transmissions: values("transmission"),
            cities: values("city"),
            states: values("state"),
        }
    }
}

/// `"*"` anywhere in the list opens CORS to every origin.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(origins))
}

pub fn build_router(state: Arc<AppState>, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/model-info", get(model_info))
        .route("/brands", get(brands))
        .route("/options", get(options))
        .layer(Extension(state))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}

async fn root(Extension(state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Car Price Prediction API",
        "status": "running",
        "version": state.version,
        "routes": ["/health", "/predict", "/model-info", "/brands", "/options"],
    }))
}

async fn health(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let loaded = state.service.is_loaded();
    let body = HealthResponse {
        status: if loaded { "healthy" } else { "unhealthy" },
        model_loaded: loaded,
        detail: state.service.load_error().map(str::to_string),
        uptime_secs: state.uptime_secs(),
    };
    let code = if loaded {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body))
}

async fn predict(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<Json<PredictionResult>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;

    let request_id = uuid::Uuid::new_v4();
    let span = info_span!("predict", %request_id, fields = request.len());

    span.in_scope(|| match state.service.predict(&request) {
        Ok(result) => {
            tracing::info!(price = result.predicted_price, "prediction served");
            Ok(Json(result))
        }
        Err(e) => {
            warn!(error = %e, "prediction rejected");
            Err(e.into())
        }
    })
}

async fn model_info(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<ModelInfo>, AppError> {
    Ok(Json(state.service.model_info()?))
}

async fn brands(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<BrandsResponse>, AppError> {
    let options = state.service.available_options()?;
    Ok(Json(BrandsResponse::from_options(&options)))
}

async fn options(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<CategoricalVocabularies>, AppError> {
    Ok(Json(state.service.available_options()?))
}
