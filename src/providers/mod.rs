//! Status page vendors and the normalized result they all produce.
//!
//! Dispatch is a plain `match` on [`Provider`]; each vendor module exposes a
//! single `fetch` that returns [`Fetched`].

mod atlassian;
mod detect;
mod incident_io;
mod instatus;

pub use detect::detect;

use crate::error::FetchError;
use crate::http::{HttpClient, HttpResponse};
use crate::models::{Incident, Provider, Summary};
use crate::retry::RetryPolicy;
use serde::de::DeserializeOwned;

pub(crate) const SUMMARY_PATH: &str = "/api/v2/summary.json";
pub(crate) const INCIDENTS_PATH: &str = "/api/v2/incidents.json";
pub(crate) const COMPONENTS_PATH: &str = "/api/v2/components.json";
pub(crate) const WIDGET_PATH: &str = "/proxy/widget";

/// Normalized output of one successful fetch.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub summary: Summary,
    pub incidents: Vec<Incident>,
}

/// HTTP client plus the retry policy wrapped around each request.
#[derive(Clone)]
pub struct ProviderClient {
    pub http: HttpClient,
    pub retry: RetryPolicy,
}

impl ProviderClient {
    pub fn new(http: HttpClient, retry: RetryPolicy) -> Self {
        ProviderClient { http, retry }
    }

    /// Retried GET that treats any non-2xx status as an error.
    pub(crate) async fn get_ok(&self, url: &str) -> Result<HttpResponse, FetchError> {
        self.retry
            .run_if(
                || async move {
                    let resp = self.http.get(url).await?;
                    if (200..300).contains(&resp.status) {
                        Ok(resp)
                    } else {
                        Err(FetchError::HttpStatus(resp.status))
                    }
                },
                FetchError::is_retryable,
            )
            .await
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let resp = self.get_ok(url).await?;
        Ok(serde_json::from_slice(&resp.body)?)
    }
}

/// Fetch and normalize a source's page using the given provider shape.
pub async fn fetch(client: &ProviderClient, provider: Provider, base_url: &str) -> Result<Fetched, FetchError> {
    match provider {
        Provider::Atlassian | Provider::IncidentIoCompatible => atlassian::fetch(client, base_url).await,
        Provider::IncidentIoNative => incident_io::fetch(client, base_url).await,
        Provider::Instatus => instatus::fetch(client, base_url).await,
    }
}

/// Headline text shared by providers that don't report their own description.
pub(crate) fn describe(indicator: crate::models::Indicator, incident_count: usize) -> String {
    use crate::models::Indicator;
    match indicator {
        Indicator::None => "All systems operational".to_string(),
        Indicator::Minor | Indicator::Major | Indicator::Critical => {
            if incident_count == 1 {
                "1 active incident".to_string()
            } else {
                format!("{} active incidents", incident_count)
            }
        }
        Indicator::Unknown => "Status unknown".to_string(),
    }
}
