use std::collections::HashMap;

use crate::alerting::events::{AffectedProcess, AlertEvent};

fn process_lines(processes: &[AffectedProcess]) -> String {
    processes
        .iter()
        .map(|p| format!("• {} ({})", p.instance, p.process_type))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders the Slack-flavoured markdown text for an alert.
pub fn format_alert(event: &AlertEvent) -> String {
    match event {
        AlertEvent::DynoCrashed {
            app_name,
            processes,
            ..
        } => format!(
            "🚨 *Dyno Crash Detected* 🚨\nApp: `{app_name}`\n{}",
            process_lines(processes)
        ),
        AlertEvent::DynoDown {
            app_name,
            processes,
            ..
        } => format!(
            "⚠️ *Dynos Down* ⚠️\nApp: `{app_name}`\n{}",
            process_lines(processes)
        ),
        AlertEvent::NewRelease {
            app_name,
            release_id,
            release,
            detected_at,
            ..
        } => {
            let noticed_at = detected_at.format("%Y-%m-%d %H:%M:%S UTC");
            let (deployed_by, description, created_at) = match release {
                Some(info) => (
                    info.deployed_by.as_str(),
                    info.description.as_str(),
                    info.created_at.as_str(),
                ),
                None => ("Unknown", "No description", ""),
            };
            format!(
                "🚀 *New Deploy Detected at {noticed_at}* 🚀\n\n\
                 App: `{app_name}`\n\
                 Version: {release_id}\n\
                 Deployed by: {deployed_by}\n\
                 Description: {description}\n\
                 Time: {created_at}\n\n\
                 _Monitoring for issues..._"
            )
        }
        AlertEvent::ConfigChanged {
            app_name,
            detected_at,
        } => format!(
            "⚙️ *Config Vars Changed at {}* ⚙️\nApp: `{app_name}`\nReview changes in Heroku dashboard.",
            detected_at.to_rfc3339()
        ),
    }
}

/// Template variables exposed to templating senders.
pub fn alert_context(event: &AlertEvent, message: &str) -> HashMap<String, String> {
    let mut context = HashMap::new();
    context.insert("app_name".to_string(), event.app_name().to_string());
    context.insert("kind".to_string(), event.kind().to_string());
    context.insert("message".to_string(), message.to_string());
    context.insert("detected_at".to_string(), event.detected_at().to_rfc3339());

    let instances = event
        .processes()
        .iter()
        .map(|p| p.instance.as_str())
        .collect::<Vec<_>>()
        .join(",");
    if !instances.is_empty() {
        context.insert("instances".to_string(), instances);
    }
    if let AlertEvent::NewRelease { release_id, .. } = event {
        context.insert("release_id".to_string(), release_id.clone());
    }
    context
}
