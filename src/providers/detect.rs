use super::{ProviderClient, SUMMARY_PATH};
use crate::models::Provider;
use serde::de::IgnoredAny;
use serde::Deserialize;

// Shape checks only: fields named with a leading underscore must be present but are never read.

#[derive(Deserialize)]
struct AtlassianProbe {
    page: AtlassianProbePage,
    #[serde(rename = "status")]
    _status: ProbeStatus,
}

#[derive(Deserialize)]
struct AtlassianProbePage {
    #[serde(default)]
    time_zone: Option<String>,
}

#[derive(Deserialize)]
struct ProbeStatus {
    #[serde(rename = "indicator")]
    _indicator: IgnoredAny,
    #[serde(rename = "description")]
    _description: IgnoredAny,
}

#[derive(Deserialize)]
struct InstatusProbe {
    #[serde(rename = "page")]
    _page: InstatusProbePage,
}

#[derive(Deserialize)]
struct InstatusProbePage {
    #[serde(rename = "status")]
    _status: IgnoredAny,
}

/// Classify a probe response body. `None` for a non-200 status or an unrecognized shape.
pub(crate) fn classify(status: u16, body: &[u8]) -> Option<Provider> {
    if status != 200 {
        return None;
    }
    if let Ok(probe) = serde_json::from_slice::<AtlassianProbe>(body) {
        // incident.io's Atlassian shim is the only one that leaves out time_zone
        return Some(if probe.page.time_zone.is_some() {
            Provider::Atlassian
        } else {
            Provider::IncidentIoCompatible
        });
    }
    if serde_json::from_slice::<InstatusProbe>(body).is_ok() {
        return Some(Provider::Instatus);
    }
    None
}

/// Probe `{base}/api/v2/summary.json` once (with retries) and classify the page.
///
/// Anything that isn't recognizably Atlassian-shaped or Instatus falls back to
/// incident.io's native widget API, which is served from a different endpoint
/// and doesn't need the summary probe to succeed.
pub async fn detect(client: &ProviderClient, base_url: &str) -> Provider {
    let url = format!("{}{}", base_url, SUMMARY_PATH);
    let url = url.as_str();
    let result = client
        .retry
        .run_if(|| async move { client.http.get(url).await }, crate::error::FetchError::is_retryable)
        .await;

    let provider = match result {
        Ok(resp) => classify(resp.status, &resp.body),
        Err(e) => {
            tracing::debug!(base_url, error = %e, "summary probe failed");
            None
        }
    }
    .unwrap_or(Provider::IncidentIoNative);

    tracing::debug!(base_url, provider = provider.as_str(), "detected provider");
    provider
}
