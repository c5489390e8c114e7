//! Delivery of engine events to webhooks and hook scripts.
//!
//! The engine only decides *that* something should be announced; this
//! module subscribes to the broadcaster and delivers best-effort. Nothing
//! here feeds back into engine state.

use crate::db::Db;
use crate::error::FetchError;
use crate::hooks::HookRunner;
use crate::models::{PayloadFormat, Webhook};
use crate::retry::RetryPolicy;
use crate::sse::{EngineEvent, EventBroadcaster};
use crate::transitions::{NotificationPayload, TransitionKind};
use rocket::tokio::sync::broadcast;
use std::sync::Arc;
use std::time::Duration;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Format a transition as a human-readable chat message.
pub fn format_chat_message(payload: &NotificationPayload) -> String {
    let emoji = match payload.event {
        TransitionKind::Recovered => "🟢",
        TransitionKind::Degraded | TransitionKind::Incident => match payload.severity.severity() {
            3 => "🔴",
            2 => "🟠",
            _ => "🟡",
        },
    };

    let label = match payload.event {
        TransitionKind::Degraded => "Degraded",
        TransitionKind::Recovered => "Recovered",
        TransitionKind::Incident => "Incident",
    };

    let mut msg = format!("{} **{}** — {}", emoji, payload.source, label);
    if !payload.body.is_empty() {
        msg.push_str(&format!("\n{}", payload.body));
    }
    msg.push_str(&format!("\n{}", payload.url));
    msg
}

fn webhook_body(format: PayloadFormat, payload: &NotificationPayload) -> serde_json::Value {
    match format {
        PayloadFormat::Chat => serde_json::json!({
            "content": format_chat_message(payload),
            "sender": "statusbar"
        }),
        PayloadFormat::Json => serde_json::to_value(payload).unwrap_or_default(),
    }
}

/// POST a transition to every webhook. Each delivery is retried independently; failures are logged and dropped.
pub async fn fire_webhooks(
    client: &reqwest::Client,
    retry: &RetryPolicy,
    webhooks: &[Webhook],
    payload: &NotificationPayload,
) {
    for webhook in webhooks {
        let body = webhook_body(webhook.payload_format, payload);
        let body = &body;
        let url = webhook.url.as_str();
        let result = retry
            .run_if(
                || async move {
                    let resp = client.post(url).json(body).timeout(WEBHOOK_TIMEOUT).send().await?;
                    if resp.status().is_success() {
                        Ok(())
                    } else {
                        Err(FetchError::HttpStatus(resp.status().as_u16()))
                    }
                },
                FetchError::is_retryable,
            )
            .await;

        match result {
            Ok(()) => tracing::debug!(url, event = payload.event.as_str(), "webhook delivered"),
            Err(e) => tracing::warn!(url, event = payload.event.as_str(), error = %e, "webhook delivery failed"),
        }
    }
}

/// Deliver one event to every collaborator.
pub async fn deliver(
    event: &EngineEvent,
    db: &Db,
    client: &reqwest::Client,
    retry: &RetryPolicy,
    hooks: Option<&HookRunner>,
) {
    if let EngineEvent::Transition(payload) = event {
        let webhooks = db.enabled_webhooks();
        if !webhooks.is_empty() {
            fire_webhooks(client, retry, &webhooks, payload).await;
        }
    }
    if let Some(runner) = hooks {
        runner.run_all(event).await;
    }
}

/// Subscribe to the broadcaster and deliver events until shutdown.
pub async fn run_dispatcher(
    broadcaster: Arc<EventBroadcaster>,
    db: Arc<Db>,
    client: reqwest::Client,
    hooks: Option<HookRunner>,
    shutdown: rocket::Shutdown,
) {
    let mut rx = broadcaster.subscribe();
    let retry = RetryPolicy::default();
    loop {
        let event = tokio::select! {
            received = rx.recv() => received,
            _ = shutdown.clone() => return,
        };
        match event {
            Ok(event) => {
                // Deliveries may be slow; don't hold up the receiver.
                let db = db.clone();
                let client = client.clone();
                let hooks = hooks.clone();
                tokio::spawn(async move {
                    deliver(&event, &db, &client, &retry, hooks.as_ref()).await;
                });
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "notification dispatcher lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}
