use super::{Fetched, ProviderClient, COMPONENTS_PATH, SUMMARY_PATH};
use crate::error::FetchError;
use crate::models::{Component, Indicator, PageInfo, PageStatus, Summary};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct InstatusSummary {
    page: InstatusPage,
}

#[derive(Debug, Deserialize)]
struct InstatusPage {
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
    status: String,
}

#[derive(Debug, Deserialize, Default)]
struct InstatusComponents {
    #[serde(default)]
    components: Vec<InstatusComponent>,
}

#[derive(Debug, Deserialize)]
struct InstatusComponent {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    children: Vec<InstatusComponent>,
}

pub(super) async fn fetch(client: &ProviderClient, base_url: &str) -> Result<Fetched, FetchError> {
    let summary: InstatusSummary = client.get_json(&format!("{}{}", base_url, SUMMARY_PATH)).await?;

    let components = match client
        .get_json::<InstatusComponents>(&format!("{}{}", base_url, COMPONENTS_PATH))
        .await
    {
        Ok(tree) => flatten(&tree.components),
        Err(e) => {
            tracing::debug!(base_url, error = %e, "instatus components unavailable");
            Vec::new()
        }
    };

    let indicator = page_indicator(&summary.page.status);
    let summary = Summary {
        page: PageInfo {
            id: String::new(),
            name: summary.page.name,
            url: if summary.page.url.is_empty() { base_url.to_string() } else { summary.page.url },
            time_zone: None,
            updated_at: None,
        },
        status: PageStatus {
            indicator,
            description: page_description(&summary.page.status).to_string(),
        },
        components,
        incidents: Vec::new(),
    };

    Ok(Fetched { summary, incidents: Vec::new() })
}

pub(crate) fn page_indicator(token: &str) -> Indicator {
    match token {
        "UP" => Indicator::None,
        "HASISSUES" | "UNDERMAINTENANCE" => Indicator::Minor,
        _ => Indicator::Major,
    }
}

fn page_description(token: &str) -> &'static str {
    match token {
        "UP" => "All systems operational",
        "HASISSUES" => "Some systems are experiencing issues",
        "UNDERMAINTENANCE" => "Under maintenance",
        _ => "Major outage",
    }
}

pub(crate) fn component_status(token: &str) -> String {
    match token {
        "OPERATIONAL" => "operational".to_string(),
        "DEGRADEDPERFORMANCE" | "UNDERMAINTENANCE" => "degraded_performance".to_string(),
        "PARTIALOUTAGE" => "partial_outage".to_string(),
        "MAJOROUTAGE" => "major_outage".to_string(),
        other => other.to_lowercase(),
    }
}

/// Pre-order flatten of the component tree. Positions count up from 1; parent links are dropped.
fn flatten(tree: &[InstatusComponent]) -> Vec<Component> {
    fn walk(nodes: &[InstatusComponent], out: &mut Vec<Component>) {
        for node in nodes {
            out.push(Component {
                id: node.id.clone(),
                name: node.name.clone(),
                status: component_status(&node.status),
                position: out.len() as i64 + 1,
                group_id: None,
                group: false,
            });
            walk(&node.children, out);
        }
    }

    let mut out = Vec::new();
    walk(tree, &mut out);
    out
}
