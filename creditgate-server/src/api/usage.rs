use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Json,
};
use creditgate_types::{QuotaError, UsageSnapshot};
use serde::Serialize;

use super::identity::caller_identity;
use super::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    #[serde(flatten)]
    pub usage: UsageSnapshot,
    pub plan: String,
    pub promotional: bool,
    /// Usage store unreachable; numbers are plan defaults
    pub degraded: bool,
}

/// Read-only: reports the caller's position without charging or admitting.
pub async fn get_usage(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<UsageResponse>, ApiError> {
    let orchestrator = state.orchestrator();
    if !orchestrator.has_service(&service_id) {
        return Err(QuotaError::UnknownService { service_id }.into());
    }

    let identity = caller_identity(&headers, &state.cookie_name_for(&service_id));
    let view = orchestrator.usage(&identity, &service_id).await;

    Ok(Json(UsageResponse {
        usage: view.usage,
        plan: view.tier.to_string(),
        promotional: view.promotional,
        degraded: view.degraded,
    }))
}
