use crate::models::Indicator;
use crate::transitions::NotificationPayload;
use chrono::{DateTime, Utc};
use rocket::response::stream::{Event, EventStream};
use rocket::tokio::sync::broadcast;
use serde::Serialize;

/// Aggregate result of one `refresh_all` pass.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RefreshSummary {
    pub source_count: usize,
    pub worst: Indicator,
    pub failed: usize,
    pub timestamp: DateTime<Utc>,
}

/// Everything the engine publishes to its collaborators.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EngineEvent {
    Transition(NotificationPayload),
    RefreshComplete(RefreshSummary),
}

impl EngineEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            EngineEvent::Transition(p) => p.event.as_str(),
            EngineEvent::RefreshComplete(_) => "refresh_complete",
        }
    }

    pub fn source_id(&self) -> Option<&str> {
        match self {
            EngineEvent::Transition(p) => Some(&p.source_id),
            EngineEvent::RefreshComplete(_) => None,
        }
    }
}

/// Global event broadcaster. Subscribers receive all events.
pub struct EventBroadcaster {
    pub sender: broadcast::Sender<EngineEvent>,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        EventBroadcaster { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    pub fn send(&self, event: EngineEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }
}

/// SSE stream of every engine event.
pub fn global_stream(broadcaster: &EventBroadcaster) -> EventStream![Event + '_] {
    let mut rx = broadcaster.subscribe();
    EventStream! {
        loop {
            match rx.recv().await {
                Ok(evt) => {
                    let data = serde_json::to_string(&evt).unwrap_or_default();
                    yield Event::data(data).event(evt.event_type());
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    yield Event::data(format!("{{\"skipped\":{}}}", n)).event("lag");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

/// SSE stream of transition events for one source.
pub fn source_stream<'a>(broadcaster: &'a EventBroadcaster, source_id: String) -> EventStream![Event + 'a] {
    let mut rx = broadcaster.subscribe();
    EventStream! {
        loop {
            match rx.recv().await {
                Ok(evt) if evt.source_id() == Some(source_id.as_str()) => {
                    let data = serde_json::to_string(&evt).unwrap_or_default();
                    yield Event::data(data).event(evt.event_type());
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    yield Event::data(format!("{{\"skipped\":{}}}", n)).event("lag");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
