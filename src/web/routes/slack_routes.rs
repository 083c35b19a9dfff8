use axum::{Form, Json, Router, extract::State, routing::post};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::heroku::status_report::build_status_report;
use crate::web::AppState;
use crate::web::models::{SlackReply, SlashCommand};

const STATUS_COMMAND: &str = "/heroku-status";

const HELP_TEXT: &str = "🤠 *Heroku Monitoring Bot Help* 🤠\n\n\
    • `/heroku-status [app_name]` - Get current status of a monitored Heroku app\n\
    • Configure monitoring via the web dashboard at `/`\n\
    • Alerts are sent to Slack when dynos crash, releases deploy, or config vars change\n\
    • Check interval can be adjusted in the dashboard (1-60 min)\n";

pub fn create_slack_router() -> Router<Arc<AppState>> {
    Router::new().route("/slack/command", post(slash_command))
}

/// Answers Slack at once; the report follows on `response_url`.
#[axum::debug_handler]
async fn slash_command(
    State(app_state): State<Arc<AppState>>,
    Form(command): Form<SlashCommand>,
) -> Json<SlackReply> {
    if command.command != STATUS_COMMAND {
        return Json(SlackReply::ephemeral(format!(
            "Unknown command: {}",
            command.command
        )));
    }

    let text = command.text.trim();
    if text.eq_ignore_ascii_case("help") {
        return Json(SlackReply::ephemeral(HELP_TEXT));
    }

    let app_name = if text.is_empty() {
        app_state
            .runtime_config
            .current()
            .map(|c| c.monitored_app().to_string())
    } else {
        Some(text.to_string())
    };
    let Some(app_name) = app_name else {
        return Json(SlackReply::ephemeral(
            "❌ Specify an app name or configure monitoring",
        ));
    };
    let Some(response_url) = command.response_url.filter(|u| !u.trim().is_empty()) else {
        warn!(app_name = %app_name, "Slash command arrived without a response_url.");
        return Json(SlackReply::ephemeral("❌ Missing response_url in command payload"));
    };

    info!(app_name = %app_name, "Status report requested via slash command.");
    tokio::spawn(post_status_report(app_state, app_name.clone(), response_url));

    Json(SlackReply::ephemeral(format!(
        "⏳ Fetching status for `{app_name}`..."
    )))
}

async fn post_status_report(app_state: Arc<AppState>, app_name: String, response_url: String) {
    let report = build_status_report(&app_state.heroku, &app_name).await;

    let result = app_state
        .http_client
        .post(&response_url)
        .json(&SlackReply::in_channel(report))
        .send()
        .await
        .and_then(|r| r.error_for_status());

    match result {
        Ok(_) => info!(app_name = %app_name, "Status report posted."),
        Err(e) => error!(app_name = %app_name, error = %e, "Failed to post status report."),
    }
}

#[cfg(test)]
mod tests {
    use crate::monitoring::RuntimeConfig;
    use crate::test_support::ScriptedFetcher;
    use crate::web::models::SlackReply;
    use crate::web::test_state::app;
    use axum::{
        body::Body,
        http::{Request, header},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn command(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/slack/command")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn reply(response: axum::response::Response) -> SlackReply {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let (router, _) = app(None, ScriptedFetcher::new(vec![]));
        let reply = reply(router.oneshot(command("command=%2Fdeploy&text=")).await.unwrap()).await;
        assert_eq!(reply.response_type, "ephemeral");
        assert_eq!(reply.text, "Unknown command: /deploy");
    }

    #[tokio::test]
    async fn test_help() {
        let (router, _) = app(None, ScriptedFetcher::new(vec![]));
        let reply = reply(
            router
                .oneshot(command("command=%2Fheroku-status&text=HELP"))
                .await
                .unwrap(),
        )
        .await;
        assert!(reply.text.contains("Heroku Monitoring Bot Help"));
    }

    #[tokio::test]
    async fn test_no_app_available() {
        let (router, _) = app(None, ScriptedFetcher::new(vec![]));
        let reply = reply(
            router
                .oneshot(command("command=%2Fheroku-status&text=&response_url=http%3A%2F%2F127.0.0.1%3A9%2Fhook"))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(reply.text, "❌ Specify an app name or configure monitoring");
    }

    #[tokio::test]
    async fn test_falls_back_to_monitored_app() {
        let initial = RuntimeConfig::new("shop", "#alerts", 5).unwrap();
        let (router, state) = app(Some(initial), ScriptedFetcher::new(vec![]));
        let reply = reply(
            router
                .oneshot(command("command=%2Fheroku-status&text=&response_url=http%3A%2F%2F127.0.0.1%3A9%2Fhook"))
                .await
                .unwrap(),
        )
        .await;

        assert_eq!(reply.response_type, "ephemeral");
        assert_eq!(reply.text, "⏳ Fetching status for `shop`...");
        assert!(state.engine.status("shop").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_response_url() {
        let (router, _) = app(None, ScriptedFetcher::new(vec![]));
        let reply = reply(
            router
                .oneshot(command("command=%2Fheroku-status&text=billing"))
                .await
                .unwrap(),
        )
        .await;
        assert!(reply.text.contains("response_url"));
    }
}
