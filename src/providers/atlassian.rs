use super::{Fetched, ProviderClient, INCIDENTS_PATH, SUMMARY_PATH};
use crate::error::FetchError;
use crate::models::{Incident, Summary};
use serde::Deserialize;

#[derive(Deserialize)]
struct IncidentsResponse {
    #[serde(default)]
    incidents: Vec<Incident>,
}

/// Atlassian Statuspage and incident.io's compatibility API share the canonical shape.
pub(super) async fn fetch(client: &ProviderClient, base_url: &str) -> Result<Fetched, FetchError> {
    let summary_url = format!("{}{}", base_url, SUMMARY_PATH);
    let incidents_url = format!("{}{}", base_url, INCIDENTS_PATH);

    let (summary, incidents) = tokio::try_join!(
        client.get_json::<Summary>(&summary_url),
        client.get_json::<IncidentsResponse>(&incidents_url),
    )?;

    Ok(Fetched { summary, incidents: incidents.incidents })
}
