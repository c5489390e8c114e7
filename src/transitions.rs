use crate::models::{Indicator, Source};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Severity rose relative to the last observation.
    Degraded,
    /// Severity dropped back to `none`.
    Recovered,
    /// First observation of a source that is already unhealthy.
    Incident,
}

impl TransitionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransitionKind::Degraded => "degraded",
            TransitionKind::Recovered => "recovered",
            TransitionKind::Incident => "incident",
        }
    }
}

/// What gets handed to the notification collaborators.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NotificationPayload {
    pub source_id: String,
    pub source: String,
    pub title: String,
    pub body: String,
    pub severity: Indicator,
    pub event: TransitionKind,
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub components: Vec<String>,
}

/// Remembers the last indicator seen per source, independent of refresh state,
/// so a recovery is still detected after a run of failed (stale) refreshes.
#[derive(Debug, Default)]
pub struct TransitionDetector {
    previous: HashMap<String, Indicator>,
}

impl TransitionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous(&self, source_id: &str) -> Option<Indicator> {
        self.previous.get(source_id).copied()
    }

    pub fn forget(&mut self, source_id: &str) {
        self.previous.remove(source_id);
    }

    /// Compare `new` against the last observation and decide what, if anything, to announce.
    pub fn observe(
        &mut self,
        source: &Source,
        new: Indicator,
        description: &str,
        components: Vec<String>,
    ) -> Option<NotificationPayload> {
        let old = self.previous.insert(source.id.clone(), new);
        let kind = classify(old, new, source.alert_level.threshold())?;
        Some(build_payload(source, kind, new, description, components))
    }
}

fn classify(old: Option<Indicator>, new: Indicator, threshold: i8) -> Option<TransitionKind> {
    let new_severity = new.severity();
    if new_severity < threshold {
        return None;
    }
    match old {
        Some(old) if old != new => {
            if new_severity > old.severity() {
                Some(TransitionKind::Degraded)
            } else if new_severity < old.severity() && new == Indicator::None {
                Some(TransitionKind::Recovered)
            } else {
                None
            }
        }
        Some(_) => None,
        None if new_severity > 0 => Some(TransitionKind::Incident),
        None => None,
    }
}

fn build_payload(
    source: &Source,
    kind: TransitionKind,
    severity: Indicator,
    description: &str,
    components: Vec<String>,
) -> NotificationPayload {
    let title = match kind {
        TransitionKind::Degraded => format!("{} is degraded", source.name),
        TransitionKind::Recovered => format!("{} has recovered", source.name),
        TransitionKind::Incident => format!("{} has an active incident", source.name),
    };
    let mut body = description.to_string();
    if !components.is_empty() {
        body.push_str(&format!("\nAffected: {}", components.join(", ")));
    }
    NotificationPayload {
        source_id: source.id.clone(),
        source: source.name.clone(),
        title,
        body,
        severity,
        event: kind,
        url: source.base_url.clone(),
        timestamp: Utc::now(),
        components,
    }
}
