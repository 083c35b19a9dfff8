use axum::{
    Form, Router,
    extract::{Query, State},
    response::{Html, Redirect},
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use tera::{Context, Tera};
use tracing::warn;

use crate::db::StoredSnapshot;
use crate::monitoring::{ConfigUpdate, ValidationError};
use crate::web::models::{ConfigForm, DashboardQuery};
use crate::web::{AppError, AppState};

pub fn create_dashboard_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(dashboard))
        .route("/update-config", post(update_config_form))
}

const DASHBOARD_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>dynowatch</title>
  <style>
    body { font-family: sans-serif; max-width: 52rem; margin: 2rem auto; }
    .ok { color: #1a7f37; } .off { color: #cf222e; }
    .notice { padding: .5rem 1rem; border-radius: 4px; }
    .notice.success { background: #dafbe1; } .notice.error { background: #ffebe9; }
    table { border-collapse: collapse; } td, th { padding: .25rem .75rem; text-align: left; }
  </style>
</head>
<body>
  <h1>dynowatch</h1>
  {% if success %}<p class="notice success">Configuration updated.</p>{% endif %}
  {% if error %}<p class="notice error">{{ error }}</p>{% endif %}

  <h2>Status</h2>
  <ul>
    <li>Monitoring: {% if monitoring_active %}<span class="ok">active</span>{% else %}<span class="off">inactive</span>{% endif %}</li>
    <li>Heroku API: {% if heroku_api_configured %}<span class="ok">configured</span>{% else %}<span class="off">missing</span>{% endif %}</li>
    <li>Notifier: {{ notifier }} {% if notifier_configured %}<span class="ok">configured</span>{% else %}<span class="off">missing</span>{% endif %}</li>
    <li>Scheduler: {{ scheduler_state }}</li>
  </ul>

  <h2>Configuration</h2>
  <form method="post" action="/update-config">
    <label>App name <input name="app_name" value="{{ current_app }}" required></label><br>
    <label>Channel <input name="slack_channel" value="{{ current_destination }}" required></label><br>
    <label>Check interval (minutes) <input name="check_interval" type="number" min="1" max="60" value="{{ check_interval }}" required></label><br>
    <button type="submit">Save</button>
  </form>

  <h2>Last committed snapshot</h2>
  {% if baseline_error %}
  <p class="off">Baseline unavailable: {{ baseline_error }}</p>
  {% elif baseline %}
  <p>Observed {{ baseline.observed_at }}, stored {{ baseline.updated_at }}. Release {{ baseline.last_release_id | default(value="-") }}.</p>
  <table>
    <tr><th>Dyno</th><th>Type</th><th>State</th></tr>
    {% for process in baseline.processes %}
    <tr><td>{{ process.instance }}</td><td>{{ process.process_type }}</td><td>{{ process.status }}</td></tr>
    {% endfor %}
  </table>
  {% if baseline.addons %}
  <p>Add-ons: {% for addon in baseline.addons %}{{ addon.name }} ({{ addon.state }}){% if not loop.last %}, {% endif %}{% endfor %}</p>
  {% endif %}
  {% else %}
  <p>No snapshot recorded yet.</p>
  {% endif %}
</body>
</html>
"#;

#[derive(Serialize)]
struct ProcessView {
    instance: String,
    process_type: String,
    status: String,
}

#[derive(Serialize)]
struct AddonView {
    name: String,
    state: String,
}

#[derive(Serialize)]
struct BaselineView {
    observed_at: String,
    updated_at: String,
    last_release_id: String,
    processes: Vec<ProcessView>,
    addons: Vec<AddonView>,
}

impl From<StoredSnapshot> for BaselineView {
    fn from(stored: StoredSnapshot) -> Self {
        let snapshot = &stored.snapshot;
        Self {
            observed_at: snapshot.observed_at().to_rfc3339(),
            updated_at: stored.updated_at.to_rfc3339(),
            last_release_id: snapshot.last_release_id().to_string(),
            processes: snapshot
                .process_states()
                .iter()
                .map(|(instance, state)| ProcessView {
                    instance: instance.clone(),
                    process_type: state.process_type.clone(),
                    status: state.status.to_string(),
                })
                .collect(),
            addons: snapshot
                .addon_states()
                .iter()
                .map(|(name, state)| AddonView {
                    name: name.clone(),
                    state: state.clone(),
                })
                .collect(),
        }
    }
}

fn error_text(code: &str) -> &'static str {
    match code {
        "missing_fields" => "All fields are required.",
        "invalid_interval" => "Check interval must be a whole number between 1 and 60 minutes.",
        _ => "Configuration update failed.",
    }
}

async fn dashboard(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
) -> Result<Html<String>, AppError> {
    let current = app_state.runtime_config.current();

    let mut baseline = None;
    let mut baseline_error = None;
    if let Some(config) = current.as_deref() {
        match app_state.engine.status(config.monitored_app()).await {
            Ok(stored) => baseline = stored.map(BaselineView::from),
            Err(e) => {
                warn!(app_name = %config.monitored_app(), error = %e, "Could not load baseline for dashboard.");
                baseline_error = Some(e.to_string());
            }
        }
    }

    let mut context = Context::new();
    context.insert(
        "current_app",
        current.as_deref().map(|c| c.monitored_app()).unwrap_or(""),
    );
    context.insert(
        "current_destination",
        current
            .as_deref()
            .map(|c| c.notify_destination())
            .unwrap_or(app_state.config.slack_channel.as_str()),
    );
    context.insert(
        "check_interval",
        &current
            .as_deref()
            .map(|c| c.interval_minutes())
            .unwrap_or(app_state.config.check_interval_minutes),
    );
    context.insert("monitoring_active", &current.is_some());
    context.insert(
        "heroku_api_configured",
        &!app_state.config.heroku_api_key.is_empty(),
    );
    context.insert("notifier", &app_state.config.notifier);
    context.insert("notifier_configured", &app_state.config.notifier_configured());
    context.insert("scheduler_state", &app_state.scheduler.state());
    context.insert("baseline", &baseline);
    context.insert("baseline_error", &baseline_error);
    context.insert("success", &query.success.is_some());
    context.insert("error", &query.error.as_deref().map(error_text));

    Ok(Html(Tera::one_off(DASHBOARD_TEMPLATE, &context, true)?))
}

async fn update_config_form(
    State(app_state): State<Arc<AppState>>,
    Form(form): Form<ConfigForm>,
) -> Redirect {
    let app_name = form.app_name.trim();
    let channel = form.slack_channel.trim();
    let interval = form.check_interval.trim();
    if app_name.is_empty() || channel.is_empty() || interval.is_empty() {
        return Redirect::to("/?error=missing_fields");
    }
    let Ok(interval_minutes) = interval.parse::<u32>() else {
        return Redirect::to("/?error=invalid_interval");
    };

    let update = ConfigUpdate {
        monitored_app: app_name.to_string(),
        notify_destination: channel.to_string(),
        interval_minutes,
    };
    match app_state.runtime_config.update_config(update) {
        Ok(_) => Redirect::to("/?success=true"),
        Err(ValidationError::IntervalOutOfRange(_)) => Redirect::to("/?error=invalid_interval"),
        Err(_) => Redirect::to("/?error=missing_fields"),
    }
}
