use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::alerting::CycleOutcome;
use crate::db::StoredSnapshot;
use crate::version::VERSION;
use crate::web::models::{HealthResponse, StatusResponse};
use crate::web::{AppError, AppState};

pub fn create_status_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/status", get(service_status))
        .route("/health", get(health))
        .route("/api/apps/{app_name}/snapshot", get(app_snapshot))
        .route("/api/refresh", post(force_refresh))
}

#[axum::debug_handler]
async fn service_status(State(app_state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let current = app_state.runtime_config.current();
    Json(StatusResponse {
        status: "ok",
        service: "dynowatch",
        version: VERSION,
        monitored_app: current.as_ref().map(|c| c.monitored_app().to_string()),
        notify_destination: current.as_ref().map(|c| c.notify_destination().to_string()),
        interval_minutes: current.as_ref().map(|c| c.interval_minutes()),
        monitoring_active: current.is_some(),
        scheduler_state: app_state.scheduler.state(),
        timestamp: Utc::now(),
    })
}

#[axum::debug_handler]
async fn health(State(app_state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let current = app_state.runtime_config.current();
    let config = &app_state.config;
    Json(HealthResponse {
        heroku_api_configured: !config.heroku_api_key.is_empty(),
        slack_configured: config.slack_bot_token.is_some(),
        database_configured: config.database_url.is_some(),
        notifier: config.notifier,
        monitored_app: current.as_ref().map(|c| c.monitored_app().to_string()),
        notify_destination: current.as_ref().map(|c| c.notify_destination().to_string()),
        interval_minutes: current.as_ref().map(|c| c.interval_minutes()),
    })
}

/// Last committed snapshot for any app, monitored or not.
#[axum::debug_handler]
async fn app_snapshot(
    State(app_state): State<Arc<AppState>>,
    Path(app_name): Path<String>,
) -> Result<Json<StoredSnapshot>, AppError> {
    app_state
        .engine
        .status(&app_name)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No snapshot recorded for app '{app_name}'.")))
}

/// Runs one cycle through the scheduler gate, waiting out any in-flight cycle.
#[axum::debug_handler]
async fn force_refresh(State(app_state): State<Arc<AppState>>) -> Json<CycleOutcome> {
    info!("Forced health check requested.");
    Json(app_state.scheduler.run_now().await)
}
