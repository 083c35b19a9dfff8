pub mod config_routes;
pub mod dashboard_routes;
pub mod slack_routes;
pub mod status_routes;
