use super::{describe, Fetched, ProviderClient, WIDGET_PATH};
use crate::error::FetchError;
use crate::models::{Incident, IncidentUpdate, Indicator, PageInfo, PageStatus, Summary};
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
struct WidgetResponse {
    #[serde(default)]
    ongoing_incidents: Option<Vec<WidgetIncident>>,
    #[serde(default)]
    in_progress_maintenances: Option<Vec<WidgetIncident>>,
}

#[derive(Debug, Deserialize, Clone)]
struct WidgetIncident {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    last_update_at: Option<DateTime<Utc>>,
    #[serde(default)]
    last_update_message: Option<String>,
}

pub(super) async fn fetch(client: &ProviderClient, base_url: &str) -> Result<Fetched, FetchError> {
    let url = format!("{}{}", base_url, WIDGET_PATH);
    let widget: WidgetResponse = client.get_json(&url).await?;
    Ok(normalize(widget, base_url))
}

/// Impact derived from an incident.io status string. Unrecognized statuses count as minor.
pub(crate) fn impact_for_status(status: &str) -> Indicator {
    match status.to_lowercase().as_str() {
        "investigating" | "identified" => Indicator::Major,
        "monitoring" => Indicator::Minor,
        "resolved" | "postmortem" => Indicator::None,
        _ => Indicator::Minor,
    }
}

fn is_active_status(status: &str) -> bool {
    matches!(status.to_lowercase().as_str(), "investigating" | "identified")
}

fn normalize(widget: WidgetResponse, base_url: &str) -> Fetched {
    // Scheduled maintenances never count toward the page's health.
    let raw: Vec<WidgetIncident> = widget
        .ongoing_incidents
        .unwrap_or_default()
        .into_iter()
        .chain(widget.in_progress_maintenances.unwrap_or_default())
        .collect();

    let indicator = if raw.is_empty() {
        Indicator::None
    } else if raw.iter().any(|i| i.status.as_deref().map(is_active_status).unwrap_or(false)) {
        Indicator::Major
    } else {
        Indicator::Minor
    };

    let incidents: Vec<Incident> = raw.into_iter().map(to_incident).collect();

    let summary = Summary {
        page: PageInfo {
            id: String::new(),
            name: page_name(base_url),
            url: base_url.to_string(),
            time_zone: None,
            updated_at: incidents.iter().filter_map(|i| i.updated_at).max(),
        },
        status: PageStatus {
            indicator,
            description: describe(indicator, incidents.len()),
        },
        components: Vec::new(),
        incidents: incidents.clone(),
    };

    Fetched { summary, incidents }
}

fn to_incident(raw: WidgetIncident) -> Incident {
    let status = raw.status.unwrap_or_default();
    let updates = match raw.last_update_message {
        Some(body) => vec![IncidentUpdate {
            id: String::new(),
            status: status.clone(),
            body,
            created_at: raw.last_update_at,
            updated_at: raw.last_update_at,
        }],
        None => Vec::new(),
    };
    Incident {
        impact: impact_for_status(&status),
        id: raw.id,
        name: raw.name,
        status,
        created_at: raw.started_at,
        updated_at: raw.last_update_at.or(raw.started_at),
        shortlink: raw.url,
        incident_updates: updates,
    }
}

fn page_name(base_url: &str) -> String {
    reqwest::Url::parse(base_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| base_url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget(json: &str) -> WidgetResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_impact_mapping() {
        assert_eq!(impact_for_status("investigating"), Indicator::Major);
        assert_eq!(impact_for_status("Identified"), Indicator::Major);
        assert_eq!(impact_for_status("monitoring"), Indicator::Minor);
        assert_eq!(impact_for_status("resolved"), Indicator::None);
        assert_eq!(impact_for_status("postmortem"), Indicator::None);
        assert_eq!(impact_for_status("something-new"), Indicator::Minor);
    }

    #[test]
    fn test_empty_widget_is_operational() {
        let fetched = normalize(widget("{}"), "https://status.example.com");
        assert_eq!(fetched.summary.status.indicator, Indicator::None);
        assert_eq!(fetched.summary.status.description, "All systems operational");
        assert!(fetched.summary.components.is_empty());
        assert_eq!(fetched.summary.page.name, "status.example.com");
    }

    #[test]
    fn test_investigating_incident_is_major() {
        let fetched = normalize(
            widget(r#"{"ongoing_incidents":[{"id":"1","name":"API errors","status":"investigating","last_update_message":"Looking into it","last_update_at":"2026-05-01T12:00:00Z"},{"id":"2","name":"Slow","status":"monitoring"}]}"#),
            "https://status.example.com",
        );
        assert_eq!(fetched.summary.status.indicator, Indicator::Major);
        assert_eq!(fetched.summary.status.description, "2 active incidents");
        assert_eq!(fetched.incidents[0].impact, Indicator::Major);
        assert_eq!(fetched.incidents[0].incident_updates[0].body, "Looking into it");
        assert_eq!(fetched.incidents[1].impact, Indicator::Minor);
    }

    #[test]
    fn test_maintenance_counts_but_scheduled_does_not() {
        let fetched = normalize(
            widget(r#"{"ongoing_incidents":null,"in_progress_maintenances":[{"id":"m","name":"DB upgrade","status":"maintenance_in_progress"}],"scheduled_maintenances":[{"id":"s","name":"Later","status":"investigating"}]}"#),
            "https://status.example.com",
        );
        assert_eq!(fetched.summary.status.indicator, Indicator::Minor);
        assert_eq!(fetched.summary.status.description, "1 active incident");
        assert_eq!(fetched.incidents.len(), 1);
    }

    #[test]
    fn test_missing_status_defaults_to_minor() {
        let fetched = normalize(widget(r#"{"ongoing_incidents":[{"id":"1","name":"Mystery"}]}"#), "https://x.example.com");
        assert_eq!(fetched.summary.status.indicator, Indicator::Minor);
        assert_eq!(fetched.incidents[0].impact, Indicator::Minor);
    }
}
