//! Refresh orchestration.
//!
//! [`Engine`] is the single owner of the registry, per-source state, the
//! provider cache and the transition memo. Fetches run concurrently and
//! without the lock; results are applied under it, so writes stay
//! serialized. History sits behind its own mutex, always taken after the
//! engine lock.

use crate::config::Config;
use crate::error::{FetchError, HistoryError, RegistryError};
use crate::history::{HistoryFlusher, HistoryPersister, HistoryStore};
use crate::http::HttpClient;
use crate::models::{AlertLevel, Checkpoint, Indicator, Provider, Source, SourceState, SourceView, UpdateSource};
use crate::providers::{self, Fetched, ProviderClient};
use crate::registry::{validate_name, validate_url, SourceRegistry};
use crate::retry::RetryPolicy;
use crate::sse::{EngineEvent, EventBroadcaster, RefreshSummary};
use crate::transitions::TransitionDetector;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinSet;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub max_connections_per_host: usize,
    pub history_path: Option<PathBuf>,
    pub history_flush_delay: Duration,
    pub retention_days: i64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(15),
            max_connections_per_host: 6,
            history_path: None,
            history_flush_delay: Duration::from_secs(2),
            retention_days: crate::history::DEFAULT_RETENTION_DAYS,
        }
    }
}

impl From<&Config> for EngineOptions {
    fn from(config: &Config) -> Self {
        EngineOptions {
            retry: RetryPolicy::default(),
            request_timeout: config.request_timeout,
            max_connections_per_host: config.max_connections_per_host,
            history_path: Some(config.history_path.clone()),
            history_flush_delay: config.history_flush_delay,
            retention_days: config.history_retention_days,
        }
    }
}

#[derive(Default)]
struct EngineState {
    registry: SourceRegistry,
    states: HashMap<String, SourceState>,
    providers: HashMap<String, Provider>,
    transitions: TransitionDetector,
}

pub struct Engine {
    client: ProviderClient,
    inner: Mutex<EngineState>,
    history: Arc<Mutex<HistoryStore>>,
    persister: HistoryPersister,
    broadcaster: Arc<EventBroadcaster>,
    retention_days: i64,
}

impl Engine {
    /// Build the engine around an existing source list. The returned flusher must be
    /// spawned for history to reach disk between explicit flushes.
    pub fn new(
        options: EngineOptions,
        sources: Vec<Source>,
        broadcaster: Arc<EventBroadcaster>,
    ) -> Result<(Engine, HistoryFlusher), FetchError> {
        let http = HttpClient::new(options.request_timeout, options.max_connections_per_host)?;
        let store = match &options.history_path {
            Some(path) => HistoryStore::load(path),
            None => HistoryStore::new(),
        };
        let history = Arc::new(Mutex::new(store));
        let (persister, flusher) = HistoryPersister::new(history.clone(), options.history_path.clone(), options.history_flush_delay);

        let engine = Engine {
            client: ProviderClient::new(http, options.retry),
            inner: Mutex::new(EngineState {
                registry: SourceRegistry::from_sources(sources),
                ..Default::default()
            }),
            history,
            persister,
            broadcaster,
            retention_days: options.retention_days,
        };
        Ok((engine, flusher))
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_history(&self) -> MutexGuard<'_, HistoryStore> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        &self.broadcaster
    }

    pub fn http(&self) -> &HttpClient {
        &self.client.http
    }

    // ── Registry ──

    pub fn sources(&self) -> Vec<Source> {
        self.lock().registry.list().to_vec()
    }

    pub fn source_count(&self) -> usize {
        self.lock().registry.list().len()
    }

    pub fn source(&self, id: &str) -> Option<Source> {
        self.lock().registry.get(id).cloned()
    }

    pub fn state(&self, id: &str) -> Option<SourceState> {
        self.lock().states.get(id).cloned()
    }

    pub fn provider(&self, id: &str) -> Option<Provider> {
        self.lock().providers.get(id).copied()
    }

    pub fn previous_indicator(&self, id: &str) -> Option<Indicator> {
        self.lock().transitions.previous(id)
    }

    pub fn views(&self) -> Vec<SourceView> {
        let st = self.lock();
        st.registry
            .list()
            .iter()
            .map(|s| SourceView {
                source: s.clone(),
                state: st.states.get(&s.id).cloned().unwrap_or_default(),
            })
            .collect()
    }

    pub fn view(&self, id: &str) -> Option<SourceView> {
        let st = self.lock();
        let source = st.registry.get(id)?.clone();
        let state = st.states.get(id).cloned().unwrap_or_default();
        Some(SourceView { source, state })
    }

    pub fn add_source(&self, name: &str, base_url: &str, alert_level: AlertLevel, group: Option<&str>) -> Result<Source, RegistryError> {
        let source = self.lock().registry.add(name, base_url, alert_level, group)?;
        tracing::info!(source_id = %source.id, name = %source.name, url = %source.base_url, "source added");
        Ok(source)
    }

    /// Add a source with its original id, e.g. from an export document.
    pub fn import_source(&self, source: Source) -> Result<Source, RegistryError> {
        self.lock().registry.insert(source)
    }

    /// Apply every field of `update` or none of them.
    pub fn update_source(&self, id: &str, update: &UpdateSource) -> Result<Source, RegistryError> {
        let name = update.name.as_deref().map(validate_name).transpose()?;
        let url = update.base_url.as_deref().map(validate_url).transpose()?;
        let level = match update.alert_level.as_deref() {
            Some(raw) => Some(AlertLevel::parse(raw).ok_or_else(|| {
                RegistryError::Validation("alert_level must be one of: all, minor, major, critical".into())
            })?),
            None => None,
        };

        let mut guard = self.lock();
        let st = &mut *guard;
        if st.registry.get(id).is_none() {
            return Err(RegistryError::NotFound);
        }
        // The URL goes first: it is the only field that can still be rejected here.
        if let Some(url) = url {
            if st.registry.set_url(id, &url)? {
                // A different page: classification and last-known data no longer apply.
                st.providers.remove(id);
                st.states.remove(id);
                st.transitions.forget(id);
                tracing::info!(source_id = %id, url = %url, "source URL changed");
            }
        }
        if let Some(name) = name {
            st.registry.rename(id, &name)?;
        }
        if let Some(level) = level {
            st.registry.set_alert_level(id, level)?;
        }
        if let Some(group) = update.group.as_deref() {
            st.registry.set_group(id, Some(group))?;
        }
        st.registry.get(id).cloned().ok_or(RegistryError::NotFound)
    }

    pub fn reorder(&self, ids: &[String]) -> Result<(), RegistryError> {
        self.lock().registry.reorder(ids)
    }

    /// Remove a source and everything keyed by it. An in-flight refresh for it is discarded on completion.
    pub fn remove_source(&self, id: &str) -> Result<Source, RegistryError> {
        let mut guard = self.lock();
        let st = &mut *guard;
        let source = st.registry.remove(id)?;
        st.states.remove(id);
        st.providers.remove(id);
        st.transitions.forget(id);
        let had_history = self.lock_history().remove_source(id);
        drop(guard);

        if had_history {
            self.persister.schedule();
        }
        tracing::info!(source_id = %id, name = %source.name, "source removed");
        Ok(source)
    }

    // ── Refresh ──

    /// Refresh one source. Failures end up in its state, never in the return value.
    ///
    /// Returns `None` when the source is unknown or was removed/re-pointed while
    /// the fetch was in flight, otherwise whether the fetch succeeded.
    pub async fn refresh(&self, source_id: &str) -> Option<bool> {
        let (source, cached) = {
            let mut guard = self.lock();
            let st = &mut *guard;
            let source = st.registry.get(source_id)?.clone();
            let state = st.states.entry(source_id.to_string()).or_default();
            state.is_loading = true;
            state.last_error = None;
            (source, st.providers.get(source_id).copied())
        };

        let provider = match cached {
            Some(p) => p,
            None => providers::detect(&self.client, &source.base_url).await,
        };
        let result = providers::fetch(&self.client, provider, &source.base_url).await;

        let (event, ok) = {
            let mut guard = self.lock();
            let st = &mut *guard;
            let current = match st.registry.get(source_id) {
                Some(s) if s.base_url == source.base_url => s.clone(),
                _ => {
                    tracing::debug!(source_id, "source changed during refresh, discarding result");
                    return None;
                }
            };
            self.apply(st, &current, provider, result)
        };

        if let Some(payload) = event {
            tracing::info!(
                source_id,
                event = payload.event.as_str(),
                severity = %payload.severity,
                "status transition"
            );
            self.broadcaster.send(EngineEvent::Transition(payload));
        }
        Some(ok)
    }

    fn apply(
        &self,
        st: &mut EngineState,
        source: &Source,
        provider: Provider,
        result: Result<Fetched, FetchError>,
    ) -> (Option<crate::transitions::NotificationPayload>, bool) {
        let now = Utc::now();
        match result {
            Ok(fetched) => {
                let indicator = fetched.summary.indicator();
                let description = fetched.summary.status.description.clone();
                let components = fetched.summary.affected_components();

                st.providers.insert(source.id.clone(), provider);
                let state = st.states.entry(source.id.clone()).or_default();
                state.summary = Some(fetched.summary);
                state.incidents = fetched.incidents;
                state.is_loading = false;
                state.last_error = None;
                state.last_refresh = Some(now);
                state.last_success = Some(now);
                state.is_stale = false;
                state.provider = Some(provider);

                let event = st.transitions.observe(source, indicator, &description, components);
                self.lock_history().record(&source.id, indicator);
                self.persister.schedule();

                tracing::debug!(source_id = %source.id, provider = provider.as_str(), indicator = %indicator, "refreshed");
                (event, true)
            }
            Err(e) => {
                // Force re-detection next cycle.
                st.providers.remove(&source.id);
                let state = st.states.entry(source.id.clone()).or_default();
                state.is_loading = false;
                state.last_error = Some(e.to_string());
                state.last_refresh = Some(now);
                state.is_stale = state.summary.is_some();

                tracing::warn!(source_id = %source.id, url = %source.base_url, provider = provider.as_str(), error = %e, "refresh failed");
                (None, false)
            }
        }
    }

    /// Refresh every registered source concurrently, then publish one `refresh_complete` event.
    pub async fn refresh_all(self: &Arc<Self>) -> RefreshSummary {
        let ids: Vec<String> = self.lock().registry.list().iter().map(|s| s.id.clone()).collect();

        let mut tasks = JoinSet::new();
        for id in ids.iter().cloned() {
            let engine = Arc::clone(self);
            tasks.spawn(async move { engine.refresh(&id).await });
        }

        let mut failed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(false)) => failed += 1,
                Ok(_) => {}
                Err(e) => {
                    failed += 1;
                    tracing::error!(error = %e, "refresh task aborted");
                }
            }
        }

        let worst = self.worst_indicator();
        let summary = RefreshSummary {
            source_count: ids.len(),
            worst,
            failed,
            timestamp: Utc::now(),
        };
        tracing::info!(sources = summary.source_count, failed, worst = %worst, "refresh complete");
        self.broadcaster.send(EngineEvent::RefreshComplete(summary.clone()));
        summary
    }

    /// Worst last-known indicator across all sources, stale data included.
    pub fn worst_indicator(&self) -> Indicator {
        let st = self.lock();
        st.registry
            .list()
            .iter()
            .filter_map(|s| st.states.get(&s.id).and_then(SourceState::indicator))
            .fold(Indicator::None, Indicator::worst)
    }

    // ── History ──

    pub fn checkpoints_since(&self, id: &str, cutoff: DateTime<Utc>) -> Vec<Checkpoint> {
        self.lock_history().checkpoints_since(id, cutoff).to_vec()
    }

    pub fn uptime_fraction(&self, id: &str, cutoff: DateTime<Utc>) -> f64 {
        self.lock_history().uptime_fraction(id, cutoff)
    }

    /// Drop checkpoints past the retention horizon.
    pub fn prune_history(&self) -> usize {
        let removed = self.lock_history().prune_retention(self.retention_days);
        if removed > 0 {
            tracing::debug!(removed, "pruned history");
            self.persister.schedule();
        }
        removed
    }

    pub fn history_json(&self) -> Result<String, HistoryError> {
        self.lock_history().to_json()
    }

    pub fn flush_history(&self) -> Result<(), HistoryError> {
        self.persister.flush_now()
    }
}
