use axum::{Json, Router, extract::State, routing::get};
use std::sync::Arc;

use crate::monitoring::ConfigUpdate;
use crate::web::models::ConfigResponse;
use crate::web::{AppError, AppState};

// Mounted under /api/config
pub fn create_config_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(get_runtime_config).put(update_runtime_config))
}

#[axum::debug_handler]
async fn get_runtime_config(State(app_state): State<Arc<AppState>>) -> Json<ConfigResponse> {
    let current = app_state.runtime_config.current();
    Json(ConfigResponse::from(current.as_deref()))
}

/// Rejected updates leave the running configuration untouched.
#[axum::debug_handler]
async fn update_runtime_config(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<ConfigUpdate>,
) -> Result<Json<ConfigResponse>, AppError> {
    let updated = app_state.runtime_config.update_config(payload)?;
    Ok(Json(ConfigResponse::from(Some(updated.as_ref()))))
}
