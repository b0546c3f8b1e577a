//! API Routes
//!
//! Generation and usage endpoints, mounted under `/api`.

mod generate;
pub(crate) mod identity;
mod usage;

#[cfg(test)]
mod generate_tests;

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use creditgate_types::{GenerationError, QuotaError};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(get_status))
        .route("/services", get(list_services))
        .route("/generate/:service", post(generate::generate))
        .route("/usage/:service", get(usage::get_usage))
}

/// Every non-200 response the API produces.
#[derive(Debug)]
pub enum ApiError {
    Quota(QuotaError),
    Generation(GenerationError),
}

impl From<QuotaError> for ApiError {
    fn from(e: QuotaError) -> Self {
        Self::Quota(e)
    }
}

impl From<GenerationError> for ApiError {
    fn from(e: GenerationError) -> Self {
        Self::Generation(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Quota(e) => {
                let status = match &e {
                    QuotaError::RateLimited { .. } | QuotaError::MonthlyLimitReached { .. } => {
                        StatusCode::TOO_MANY_REQUESTS
                    },
                    QuotaError::UnknownService { .. } => StatusCode::NOT_FOUND,
                    QuotaError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
                };
                let mut body = serde_json::json!({ "error": e.to_string(), "code": e.code() });
                if let QuotaError::MonthlyLimitReached { usage } = &e {
                    body["usage"] = serde_json::json!(usage);
                }

                let mut response = (status, Json(body)).into_response();
                if let QuotaError::RateLimited { retry_after_secs } = e {
                    response.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
                }
                response
            },
            Self::Generation(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response(),
        }
    }
}

#[derive(Serialize)]
struct StatusResponse {
    version: &'static str,
    uptime_secs: u64,
    storage: &'static str,
    services: Vec<String>,
}

async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.inner.started_at.elapsed().as_secs(),
        storage: state.inner.storage,
        services: state.orchestrator().service_ids().map(str::to_string).collect(),
    })
}

async fn list_services(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.orchestrator().service_ids().map(str::to_string).collect())
}
