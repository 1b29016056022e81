use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::admin::AdminState;
use crate::observability::errors::{ErrorAnalysis, ErrorDashboard};
use crate::orchestrator::{DegradationReport, OrchestratorError, OrchestratorStatus, RoutingPolicy};
use crate::providers::{HealthReport, ModelInfo, ProviderType};
use crate::registry::ProviderSnapshot;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    #[serde(flatten)]
    pub orchestrator: OrchestratorStatus,
}

#[derive(Debug, Deserialize)]
pub struct ProviderList {
    pub providers: Vec<ProviderType>,
}

#[derive(Debug, Deserialize)]
pub struct DegradationToggle {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct PerformanceQuery {
    pub provider: Option<String>,
}

/// Errors returned by admin handlers.
#[derive(Debug)]
pub enum AdminError {
    BadRequest(String),
    UnknownProvider(String),
    Orchestrator(OrchestratorError),
}

impl From<OrchestratorError> for AdminError {
    fn from(e: OrchestratorError) -> Self {
        AdminError::Orchestrator(e)
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, message, retry_after) = match self {
            AdminError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AdminError::UnknownProvider(name) => {
                (StatusCode::NOT_FOUND, format!("unknown provider type: {}", name), None)
            }
            AdminError::Orchestrator(e) => {
                let status = match &e {
                    OrchestratorError::NotConfigured(_) => StatusCode::NOT_FOUND,
                    OrchestratorError::CircuitOpen { .. } | OrchestratorError::NoProvidersAvailable => {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    OrchestratorError::AllProvidersFailed { .. }
                    | OrchestratorError::DegradationFailed { .. } => StatusCode::BAD_GATEWAY,
                };
                (status, e.to_string(), e.retry_after())
            }
        };

        let mut response = (status, Json(json!({ "error": message }))).into_response();
        if let Some(after) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&after.as_secs().max(1).to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

fn parse_provider(raw: &str) -> Result<ProviderType, AdminError> {
    raw.parse()
        .map_err(|_| AdminError::UnknownProvider(raw.to_string()))
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        orchestrator: state.orchestrator.status(),
    })
}

pub async fn get_providers(State(state): State<AdminState>) -> Json<Vec<ProviderSnapshot>> {
    Json(state.orchestrator.status().providers)
}

pub async fn reset_provider(
    State(state): State<AdminState>,
    Path(provider): Path<String>,
) -> Result<Json<serde_json::Value>, AdminError> {
    let provider = parse_provider(&provider)?;
    state.orchestrator.reset_circuit_breaker(provider)?;
    Ok(Json(json!({ "message": format!("circuit breaker reset for {}", provider) })))
}

pub async fn reset_all_breakers(State(state): State<AdminState>) -> Json<serde_json::Value> {
    state.orchestrator.reset_all_circuit_breakers();
    Json(json!({ "message": "all circuit breakers reset" }))
}

pub async fn set_priority(
    State(state): State<AdminState>,
    Json(body): Json<ProviderList>,
) -> Result<Json<RoutingPolicy>, AdminError> {
    if body.providers.is_empty() {
        return Err(AdminError::BadRequest("priority list must not be empty".into()));
    }
    state.orchestrator.set_service_priority(body.providers);
    Ok(Json(state.orchestrator.routing_policy()))
}

pub async fn set_fallback(
    State(state): State<AdminState>,
    Json(body): Json<ProviderList>,
) -> Json<RoutingPolicy> {
    state.orchestrator.set_degradation_order(body.providers);
    Json(state.orchestrator.routing_policy())
}

pub async fn set_degradation(
    State(state): State<AdminState>,
    Json(body): Json<DegradationToggle>,
) -> Json<RoutingPolicy> {
    state.orchestrator.set_degradation_enabled(body.enabled);
    Json(state.orchestrator.routing_policy())
}

pub async fn reset_performance(
    State(state): State<AdminState>,
    Query(query): Query<PerformanceQuery>,
) -> Result<Json<serde_json::Value>, AdminError> {
    let provider = query.provider.as_deref().map(parse_provider).transpose()?;
    state.orchestrator.reset_performance(provider)?;
    let scope = provider.map(|p| p.to_string()).unwrap_or_else(|| "all providers".into());
    Ok(Json(json!({ "message": format!("performance counters reset for {}", scope) })))
}

pub async fn test_provider(
    State(state): State<AdminState>,
    Path(provider): Path<String>,
) -> Result<Json<HealthReport>, AdminError> {
    let provider = parse_provider(&provider)?;
    Ok(Json(state.orchestrator.test_provider(provider).await?))
}

pub async fn get_models(
    State(state): State<AdminState>,
) -> Json<BTreeMap<ProviderType, Vec<ModelInfo>>> {
    Json(state.orchestrator.list_models().await)
}

pub async fn get_degradation(State(state): State<AdminState>) -> Json<DegradationReport> {
    Json(state.orchestrator.degradation_status())
}

pub async fn get_error_dashboard(State(state): State<AdminState>) -> Json<ErrorDashboard> {
    Json(state.orchestrator.error_dashboard())
}

pub async fn get_error_analysis(State(state): State<AdminState>) -> Json<ErrorAnalysis> {
    Json(state.orchestrator.error_analysis())
}

pub async fn clear_errors(State(state): State<AdminState>) -> Json<serde_json::Value> {
    state.orchestrator.clear_errors();
    Json(json!({ "message": "error metrics cleared" }))
}
