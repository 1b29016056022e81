//! Admin HTTP API exposing the orchestrator's management operations.

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::orchestrator::Orchestrator;
use self::auth::admin_auth_middleware;
use self::handlers::*;

#[derive(Clone)]
pub struct AdminState {
    pub orchestrator: Arc<Orchestrator>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(orchestrator: Arc<Orchestrator>, api_key: &str) -> Self {
        Self {
            orchestrator,
            api_key: Arc::from(api_key),
        }
    }
}

/// Upper bound for any admin request, including on-demand provider tests.
const ADMIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/providers", get(get_providers))
        .route("/admin/providers/{provider}/reset", post(reset_provider))
        .route("/admin/providers/{provider}/test", post(test_provider))
        .route("/admin/circuit-breakers/reset", post(reset_all_breakers))
        .route("/admin/routing/priority", put(set_priority))
        .route("/admin/routing/fallback", put(set_fallback))
        .route("/admin/routing/degradation", put(set_degradation))
        .route("/admin/performance/reset", post(reset_performance))
        .route("/admin/models", get(get_models))
        .route("/admin/degradation", get(get_degradation))
        .route("/admin/errors/dashboard", get(get_error_dashboard))
        .route("/admin/errors/analysis", get(get_error_analysis))
        .route("/admin/errors/clear", post(clear_errors))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TimeoutLayer::new(ADMIN_REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
