use axum::{Router, http::Method};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::alerting::{ReconciliationEngine, Scheduler};
use crate::heroku::HerokuClient;
use crate::monitoring::RuntimeConfigHandle;
use crate::server::config::ServerConfig;
use crate::web::routes::*;

pub mod error;
pub mod models;
pub mod routes;

pub use error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub runtime_config: RuntimeConfigHandle,
    pub scheduler: Arc<Scheduler>,
    pub engine: Arc<ReconciliationEngine>,
    pub heroku: Arc<HerokuClient>,
    /// Outbound client for Slack `response_url` callbacks.
    pub http_client: reqwest::Client,
}

pub fn create_axum_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .merge(dashboard_routes::create_dashboard_router())
        .merge(status_routes::create_status_router())
        .nest("/api/config", config_routes::create_config_router())
        .merge(slack_routes::create_slack_router())
        .with_state(app_state)
        .layer(cors)
}

#[cfg(test)]
pub(crate) mod test_state {
    use super::*;
    use crate::db::MemorySnapshotStore;
    use crate::monitoring::RuntimeConfig;
    use crate::server::config::NotifierKind;
    use crate::test_support::{RecordingNotifier, ScriptedFetcher};
    use std::time::Duration;

    pub(crate) fn server_config() -> ServerConfig {
        ServerConfig {
            heroku_api_key: "hk-test".to_string(),
            slack_bot_token: Some("xoxb-test".to_string()),
            database_url: None,
            port: 5000,
            log_dir: "logs".to_string(),
            monitored_app_name: None,
            slack_channel: "#alerts".to_string(),
            check_interval_minutes: 5,
            heroku_api_url: "http://127.0.0.1:9".to_string(),
            slack_api_url: "http://127.0.0.1:9".to_string(),
            notifier: NotifierKind::Slack,
            webhook_body_template: None,
            request_timeout_seconds: 1,
        }
    }

    /// Router plus handles into its state, wired to in-memory collaborators.
    pub(crate) fn app(
        initial: Option<RuntimeConfig>,
        fetcher: ScriptedFetcher,
    ) -> (Router, Arc<AppState>) {
        let config = Arc::new(server_config());
        let runtime_config = RuntimeConfigHandle::new(initial);
        let engine = Arc::new(ReconciliationEngine::new(Arc::new(MemorySnapshotStore::new())));
        let scheduler = Arc::new(Scheduler::new(
            runtime_config.clone(),
            Arc::new(fetcher),
            engine.clone(),
            Arc::new(RecordingNotifier::new()),
        ));
        let heroku = Arc::new(
            HerokuClient::new("hk-test", "http://127.0.0.1:9", Duration::from_secs(1)).unwrap(),
        );
        let state = Arc::new(AppState {
            config,
            runtime_config,
            scheduler,
            engine,
            heroku,
            http_client: reqwest::Client::new(),
        });
        (create_axum_router(state.clone()), state)
    }
}
