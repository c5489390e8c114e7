//! Per-source checkpoint history.
//!
//! [`HistoryStore`] is the in-memory time series; [`HistoryPersister`] and
//! [`HistoryFlusher`] write it to disk. Writes are coalesced: every
//! `schedule()` restarts a quiescence timer and the file is rewritten only
//! once the timer expires. The file is always replaced atomically
//! (write a uniquely named temp file in the same directory, then rename).

use crate::error::HistoryError;
use crate::models::{Checkpoint, Indicator};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::sync::mpsc;

pub const DEFAULT_RETENTION_DAYS: i64 = 30;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct HistoryStore {
    entries: BTreeMap<String, Vec<Checkpoint>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path`. A missing file is an empty history; an unreadable one is logged and discarded.
    pub fn load(path: &Path) -> Self {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read history, starting empty");
                return Self::new();
            }
        };
        match serde_json::from_slice::<BTreeMap<String, Vec<Checkpoint>>>(&bytes) {
            Ok(mut entries) => {
                entries.retain(|_, cps| !cps.is_empty());
                for cps in entries.values_mut() {
                    cps.sort_by_key(|c| c.timestamp);
                }
                HistoryStore { entries }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "history file is corrupt, starting empty");
                Self::new()
            }
        }
    }

    pub fn record(&mut self, source_id: &str, indicator: Indicator) -> Checkpoint {
        self.record_at(source_id, indicator, Utc::now())
    }

    /// Append a checkpoint. Timestamps never go backwards within a source.
    pub fn record_at(&mut self, source_id: &str, indicator: Indicator, at: DateTime<Utc>) -> Checkpoint {
        let checkpoints = self.entries.entry(source_id.to_string()).or_default();
        let timestamp = match checkpoints.last() {
            Some(last) if last.timestamp > at => last.timestamp,
            _ => at,
        };
        let checkpoint = Checkpoint { timestamp, indicator };
        checkpoints.push(checkpoint);
        checkpoint
    }

    pub fn checkpoints(&self, source_id: &str) -> &[Checkpoint] {
        self.entries.get(source_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Checkpoints at or after `cutoff`, oldest first.
    pub fn checkpoints_since(&self, source_id: &str, cutoff: DateTime<Utc>) -> &[Checkpoint] {
        let all = self.checkpoints(source_id);
        let start = all.partition_point(|c| c.timestamp < cutoff);
        &all[start..]
    }

    /// Share of `none` checkpoints since `cutoff`. An empty window counts as fully up.
    pub fn uptime_fraction(&self, source_id: &str, cutoff: DateTime<Utc>) -> f64 {
        let window = self.checkpoints_since(source_id, cutoff);
        if window.is_empty() {
            return 1.0;
        }
        let up = window.iter().filter(|c| c.indicator == Indicator::None).count();
        up as f64 / window.len() as f64
    }

    /// Drop checkpoints older than `cutoff`; sources left empty are removed. Returns how many were dropped.
    pub fn prune_older_than(&mut self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, checkpoints| {
            let start = checkpoints.partition_point(|c| c.timestamp < cutoff);
            removed += start;
            checkpoints.drain(..start);
            !checkpoints.is_empty()
        });
        removed
    }

    pub fn prune_retention(&mut self, retention_days: i64) -> usize {
        self.prune_older_than(Utc::now() - ChronoDuration::days(retention_days))
    }

    pub fn remove_source(&mut self, source_id: &str) -> bool {
        self.entries.remove(source_id).is_some()
    }

    pub fn entries(&self) -> &BTreeMap<String, Vec<Checkpoint>> {
        &self.entries
    }

    pub fn to_json(&self) -> Result<String, HistoryError> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }
}

/// Replace `path` with `contents` without ever truncating the live file.
/// Concurrent writers each get their own temp file; the last rename wins.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), HistoryError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn flush(store: &Mutex<HistoryStore>, path: &Path) -> Result<(), HistoryError> {
    // Serialize under the lock, write after releasing it.
    let json = {
        let store = store.lock().unwrap_or_else(|e| e.into_inner());
        store.to_json()?
    };
    write_atomic(path, json.as_bytes())
}

/// Handle used by the engine to request a (debounced) save.
pub struct HistoryPersister {
    store: Arc<Mutex<HistoryStore>>,
    path: Option<PathBuf>,
    signal: mpsc::Sender<()>,
}

/// Background half of the persister; run it with `tokio::spawn(flusher.run())`.
pub struct HistoryFlusher {
    store: Arc<Mutex<HistoryStore>>,
    path: Option<PathBuf>,
    quiet_period: Duration,
    signal: mpsc::Receiver<()>,
}

impl HistoryPersister {
    /// `path: None` keeps history in memory only.
    pub fn new(store: Arc<Mutex<HistoryStore>>, path: Option<PathBuf>, quiet_period: Duration) -> (Self, HistoryFlusher) {
        let (tx, rx) = mpsc::channel(1);
        let persister = HistoryPersister { store: store.clone(), path: path.clone(), signal: tx };
        let flusher = HistoryFlusher { store, path, quiet_period, signal: rx };
        (persister, flusher)
    }

    /// Request a save. A pending request already covers this one if the channel is full.
    pub fn schedule(&self) {
        if self.path.is_some() {
            let _ = self.signal.try_send(());
        }
    }

    /// Write immediately, bypassing the quiescence window.
    pub fn flush_now(&self) -> Result<(), HistoryError> {
        match &self.path {
            Some(path) => flush(&self.store, path),
            None => Ok(()),
        }
    }
}

impl HistoryFlusher {
    pub async fn run(mut self) {
        let Some(path) = self.path.clone() else { return };
        loop {
            if self.signal.recv().await.is_none() {
                return;
            }
            // Keep waiting while writes keep arriving.
            let closed = loop {
                match tokio::time::timeout(self.quiet_period, self.signal.recv()).await {
                    Ok(Some(())) => continue,
                    Ok(None) => break true,
                    Err(_) => break false,
                }
            };
            match flush(&self.store, &path) {
                Ok(()) => tracing::debug!(path = %path.display(), "history saved"),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to save history"),
            }
            if closed {
                return;
            }
        }
    }
}
