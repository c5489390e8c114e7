use crate::error::FetchError;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Body and status of a completed GET.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Shared, connection-pooled HTTP client.
///
/// Concurrency against a single host is bounded by a per-host semaphore so
/// that an unbounded fan-out of refresh tasks never opens more than
/// `max_per_host` requests to the same status page vendor at once.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    request_timeout: Duration,
    max_per_host: usize,
    hosts: Arc<Mutex<HashMap<String, Arc<Semaphore>>>>,
}

impl HttpClient {
    pub fn new(request_timeout: Duration, max_per_host: usize) -> Result<Self, FetchError> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(max_per_host.max(1))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("statusbar/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(HttpClient {
            client,
            request_timeout,
            max_per_host: max_per_host.max(1),
            hosts: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }

    fn host_semaphore(&self, url: &str) -> Arc<Semaphore> {
        let host = reqwest::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .unwrap_or_default();
        let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        hosts
            .entry(host)
            .or_insert_with(|| Arc::new(Semaphore::new(self.max_per_host)))
            .clone()
    }

    /// Single GET attempt with its own request timeout. Non-2xx statuses are returned, not errors.
    pub async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let semaphore = self.host_semaphore(url);
        // The semaphore is never closed.
        let _permit = semaphore.acquire_owned().await.ok();

        let resp = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(classify)?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(classify)?.to_vec();
        Ok(HttpResponse { status, body })
    }
}

fn classify(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Request(e)
    }
}
