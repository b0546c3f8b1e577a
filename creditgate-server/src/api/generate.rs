use std::net::SocketAddr;

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Path, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Json, Response},
};
use creditgate_core::{GenerationOutcome, GenerationRequest, GenerationSuccess, RateLimited};
use creditgate_types::{GeneratedOutput, GenerationPayload, QuotaError, UsageSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::identity::{caller_identity, client_ip, usage_cookie};
use super::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBody {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub requested_units: Option<u32>,
    /// Legacy alias for `requestedUnits`
    #[serde(default)]
    pub units: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GenerateBody {
    /// Split into the requested unit count and the model payload.
    pub fn into_payload(self) -> Result<(u32, GenerationPayload), QuotaError> {
        let prompt = self
            .prompt
            .or(self.keyword)
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| QuotaError::InvalidRequest {
                message: "prompt or keyword is required".to_string(),
            })?;
        let requested = self.requested_units.or(self.units).unwrap_or(1);

        let payload = GenerationPayload {
            category: self.category,
            prompt,
            size: self.size,
            units: requested,
            extra: self.extra,
        };
        Ok((requested, payload))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub outputs: Vec<GeneratedOutput>,
    pub usage: UsageSnapshot,
    pub model_used: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<DeliveryWarning>,
}

#[derive(Debug, Serialize)]
pub struct DeliveryWarning {
    pub code: &'static str,
    pub requested: u32,
    pub delivered: u32,
}

impl From<GenerationSuccess> for GenerateResponse {
    fn from(success: GenerationSuccess) -> Self {
        let warning = success.is_partial().then_some(DeliveryWarning {
            code: "PARTIAL_DELIVERY",
            requested: success.requested,
            delivered: success.delivered,
        });
        Self {
            outputs: success.outputs,
            usage: success.usage,
            model_used: success.model_used,
            warning,
        }
    }
}

pub async fn generate(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Result<Json<GenerateBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let orchestrator = state.orchestrator();
    if !orchestrator.has_service(&service_id) {
        return Err(QuotaError::UnknownService { service_id }.into());
    }

    let cookie_name = state.cookie_name_for(&service_id);
    let identity = caller_identity(&headers, &cookie_name);
    let peer = peer.map(|ConnectInfo(addr)| addr);
    let ip_key = client_ip(&headers, peer, state.trust_forwarded_for());

    // Malformed bodies still spend a rate-limit slot.
    orchestrator
        .admit(&ip_key, &identity, &service_id)
        .map_err(|RateLimited { retry_after_secs }| QuotaError::RateLimited { retry_after_secs })?;

    let Json(body) = body.map_err(|e| QuotaError::InvalidRequest { message: e.body_text() })?;
    let (requested_units, payload) = body.into_payload()?;

    let request = GenerationRequest { identity, ip_key, service_id, requested_units, payload };

    match orchestrator.handle_admitted(request).await {
        GenerationOutcome::RateLimited { retry_after_secs } => {
            Err(QuotaError::RateLimited { retry_after_secs }.into())
        },
        GenerationOutcome::QuotaExceeded { usage } => {
            Err(QuotaError::MonthlyLimitReached { usage }.into())
        },
        GenerationOutcome::GenerationFailed { error } => Err(error.into()),
        GenerationOutcome::Succeeded(mut success) => {
            let cookie = success
                .guest_token
                .take()
                .and_then(|token| usage_cookie(&cookie_name, &token));

            let mut response = Json(GenerateResponse::from(success)).into_response();
            if let Some(cookie) = cookie {
                response.headers_mut().append(header::SET_COOKIE, cookie);
            }
            Ok(response)
        },
    }
}
