//! Live, human-readable status report for interactive surfaces.
//!
//! This path never touches the snapshot store.
use std::collections::BTreeMap;
use std::fmt::Write;
use tracing::warn;

use super::client::{Addon, AppInfo, Dyno, Formation, HerokuClient, NamedRef, Release};

const REPORT_RELEASES: usize = 3;

pub async fn build_status_report(client: &HerokuClient, app_name: &str) -> String {
    let (info, dynos, releases, addons, formation) = tokio::join!(
        client.get_app_info(app_name),
        client.get_dynos(app_name),
        client.get_releases(app_name),
        client.get_addons(app_name),
        client.get_formation(app_name),
    );

    let info = match info {
        Ok(info) => info,
        Err(e) => {
            warn!(app_name = %app_name, error = %e, "Could not fetch app info for status report.");
            return format!("❌ Could not fetch info for app: {app_name}");
        }
    };

    render_status_report(
        &info,
        &dynos.unwrap_or_default(),
        &formation.unwrap_or_default(),
        &releases.unwrap_or_default(),
        &addons.unwrap_or_default(),
    )
}

pub fn render_status_report(
    info: &AppInfo,
    dynos: &[Dyno],
    formation: &[Formation],
    releases: &[Release],
    addons: &[Addon],
) -> String {
    let named = |r: &Option<NamedRef>| {
        r.as_ref()
            .and_then(|n| n.name.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    };

    let mut status = format!("📊 *Heroku App Status: {}* 📊\n\n", info.name);
    let _ = write!(
        status,
        "*App Details:*\n• Name: `{}`\n• Owner: {}\n• Region: {}\n• Stack: {}\n• Web URL: {}\n\n",
        info.name,
        info.owner
            .as_ref()
            .and_then(|o| o.email.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        named(&info.region),
        named(&info.stack),
        info.web_url.as_deref().unwrap_or("N/A"),
    );

    status.push_str("*Dyno Status:*\n");
    if dynos.is_empty() {
        status.push_str("No dynos currently running\n\n");
    } else {
        status.push_str(&format_dyno_summary(dynos));
        status.push_str("\n\n");
    }

    if !formation.is_empty() {
        status.push_str("*Dyno Formation:*\n");
        for entry in formation {
            let _ = writeln!(status, "• {}: {} x {}", entry.process_type, entry.quantity, entry.size);
        }
        status.push('\n');
    }

    if !releases.is_empty() {
        let mut newest: Vec<&Release> = releases.iter().collect();
        newest.sort_by(|a, b| b.version.cmp(&a.version));
        status.push_str("*Recent Releases:*\n");
        for release in newest.into_iter().take(REPORT_RELEASES) {
            let _ = writeln!(
                status,
                "• v{}: {} ({})",
                release.version,
                release.description.as_deref().unwrap_or("No description"),
                release.created_at.as_deref().unwrap_or(""),
            );
        }
        status.push('\n');
    }

    if addons.is_empty() {
        status.push_str("*Add-ons:* None\n");
    } else {
        status.push_str("*Add-ons:*\n");
        for addon in addons {
            let _ = writeln!(
                status,
                "• {} ({}) - {}",
                addon.name,
                named(&addon.plan),
                addon.state.as_deref().unwrap_or("Unknown"),
            );
        }
    }

    status
}

/// One line per dyno type: total count and a breakdown by state.
pub fn format_dyno_summary(dynos: &[Dyno]) -> String {
    if dynos.is_empty() {
        return "No dynos running".to_string();
    }

    let mut summary: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();
    for dyno in dynos {
        *summary
            .entry(dyno.dyno_type.as_str())
            .or_default()
            .entry(dyno.state.as_str())
            .or_default() += 1;
    }

    summary
        .into_iter()
        .map(|(dyno_type, states)| {
            let total: usize = states.values().sum();
            let breakdown = states
                .iter()
                .map(|(state, count)| format!("{count} {state}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!("• {dyno_type}: {total} dynos ({breakdown})")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heroku::client::Owner;

    fn dyno(name: &str, kind: &str, state: &str) -> Dyno {
        Dyno {
            name: name.to_string(),
            dyno_type: kind.to_string(),
            state: state.to_string(),
        }
    }

    #[test]
    fn test_dyno_summary_groups_by_type() {
        let summary = format_dyno_summary(&[
            dyno("web.1", "web", "up"),
            dyno("web.2", "web", "crashed"),
            dyno("web.3", "web", "up"),
            dyno("worker.1", "worker", "up"),
        ]);
        assert_eq!(
            summary,
            "• web: 3 dynos (1 crashed, 2 up)\n• worker: 1 dynos (1 up)"
        );
        assert_eq!(format_dyno_summary(&[]), "No dynos running");
    }

    #[test]
    fn test_render_report_sections() {
        let info = AppInfo {
            name: "shop".to_string(),
            owner: Some(Owner {
                email: Some("owner@example.com".to_string()),
            }),
            region: Some(NamedRef {
                name: Some("us".to_string()),
            }),
            stack: None,
            web_url: None,
        };
        let releases: Vec<Release> = (1..=5)
            .map(|v| Release {
                version: v,
                description: Some(format!("Deploy {v}")),
                user: None,
                created_at: None,
            })
            .collect();

        let report = render_status_report(&info, &[], &[], &releases, &[]);

        assert!(report.contains("• Owner: owner@example.com"));
        assert!(report.contains("• Stack: Unknown"));
        assert!(report.contains("No dynos currently running"));
        assert!(report.contains("• v5: Deploy 5"));
        assert!(report.contains("• v3: Deploy 3"));
        assert!(!report.contains("• v2: Deploy 2"));
        assert!(report.contains("*Add-ons:* None"));
    }
}
