use serde_json::json;
use statusbar::engine::{Engine, EngineOptions};
use statusbar::models::{AlertLevel, Indicator, Provider};
use statusbar::retry::RetryPolicy;
use statusbar::sse::{EngineEvent, EventBroadcaster};
use statusbar::transitions::TransitionKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_options() -> EngineOptions {
    EngineOptions {
        retry: RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(10),
        },
        request_timeout: Duration::from_secs(5),
        ..EngineOptions::default()
    }
}

fn test_engine() -> (Arc<Engine>, Receiver<EngineEvent>) {
    let broadcaster = Arc::new(EventBroadcaster::new(64));
    let rx = broadcaster.subscribe();
    let (engine, _flusher) = Engine::new(fast_options(), vec![], broadcaster).expect("engine");
    (Arc::new(engine), rx)
}

fn summary_body(indicator: &str, with_time_zone: bool) -> serde_json::Value {
    let mut page = json!({"id": "p1", "name": "Example", "url": "https://status.example.com"});
    if with_time_zone {
        page["time_zone"] = json!("Etc/UTC");
    }
    json!({
        "page": page,
        "status": {"indicator": indicator, "description": format!("Status is {}", indicator)},
        "components": [
            {"id": "c1", "name": "API", "status": if indicator == "none" { "operational" } else { "partial_outage" }, "position": 1}
        ]
    })
}

async fn mount_atlassian(server: &MockServer, indicator: &str, with_time_zone: bool) {
    Mock::given(method("GET"))
        .and(path("/api/v2/summary.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(summary_body(indicator, with_time_zone)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/incidents.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"incidents": []})))
        .mount(server)
        .await;
}

async fn mount_failure(server: &MockServer) {
    Mock::given(any())
        .respond_with(ResponseTemplate::new(503))
        .mount(server)
        .await;
}

fn drain(rx: &mut Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(evt) = rx.try_recv() {
        events.push(evt);
    }
    events
}

fn transitions(events: &[EngineEvent]) -> Vec<TransitionKind> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Transition(p) => Some(p.event),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_refresh_atlassian_page() {
    let server = MockServer::start().await;
    mount_atlassian(&server, "none", true).await;
    let (engine, mut rx) = test_engine();
    let source = engine.add_source("Example", &server.uri(), AlertLevel::All, None).unwrap();

    assert_eq!(engine.refresh(&source.id).await, Some(true));

    assert_eq!(engine.provider(&source.id), Some(Provider::Atlassian));
    let state = engine.state(&source.id).unwrap();
    assert!(!state.is_loading);
    assert!(!state.is_stale);
    assert!(state.last_error.is_none());
    assert_eq!(state.indicator(), Some(Indicator::None));
    assert_eq!(state.provider, Some(Provider::Atlassian));

    let since = chrono::Utc::now() - chrono::Duration::days(1);
    assert_eq!(engine.checkpoints_since(&source.id, since).len(), 1);
    // First observation of "none" is not news.
    assert!(transitions(&drain(&mut rx)).is_empty());
}

#[tokio::test]
async fn test_summary_without_time_zone_is_incident_io_compatible() {
    let server = MockServer::start().await;
    mount_atlassian(&server, "minor", false).await;
    let (engine, _rx) = test_engine();
    let source = engine.add_source("OpenAI", &server.uri(), AlertLevel::All, None).unwrap();

    assert_eq!(engine.refresh(&source.id).await, Some(true));
    assert_eq!(engine.provider(&source.id), Some(Provider::IncidentIoCompatible));
}

#[tokio::test]
async fn test_native_widget_fallback_emits_incident() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/summary.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/proxy/widget"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ongoing_incidents": [
                {"id": "inc1", "name": "API errors", "status": "investigating", "last_update_message": "Looking into it"}
            ]
        })))
        .mount(&server)
        .await;

    let (engine, mut rx) = test_engine();
    let source = engine.add_source("Widget", &server.uri(), AlertLevel::All, None).unwrap();
    assert_eq!(engine.refresh(&source.id).await, Some(true));

    assert_eq!(engine.provider(&source.id), Some(Provider::IncidentIoNative));
    let state = engine.state(&source.id).unwrap();
    assert_eq!(state.indicator(), Some(Indicator::Major));
    assert_eq!(state.incidents.len(), 1);
    assert_eq!(state.summary.as_ref().unwrap().status.description, "1 active incident");

    let events = drain(&mut rx);
    assert_eq!(transitions(&events), vec![TransitionKind::Incident]);

    // Same status again: nothing new to say.
    assert_eq!(engine.refresh(&source.id).await, Some(true));
    assert!(transitions(&drain(&mut rx)).is_empty());
}

#[tokio::test]
async fn test_failure_keeps_stale_data_and_forgets_provider() {
    let server = MockServer::start().await;
    mount_atlassian(&server, "minor", true).await;
    let (engine, _rx) = test_engine();
    let source = engine.add_source("Example", &server.uri(), AlertLevel::All, None).unwrap();
    assert_eq!(engine.refresh(&source.id).await, Some(true));

    server.reset().await;
    mount_failure(&server).await;
    assert_eq!(engine.refresh(&source.id).await, Some(false));

    let state = engine.state(&source.id).unwrap();
    assert!(state.is_stale);
    assert!(!state.is_loading);
    assert!(state.last_error.is_some());
    assert_eq!(state.indicator(), Some(Indicator::Minor));
    assert!(state.last_success < state.last_refresh);
    assert_eq!(engine.provider(&source.id), None);

    // No checkpoint for the failed attempt.
    let since = chrono::Utc::now() - chrono::Duration::days(1);
    assert_eq!(engine.checkpoints_since(&source.id, since).len(), 1);
    assert_eq!(engine.worst_indicator(), Indicator::Minor);
}

#[tokio::test]
async fn test_failure_without_prior_data_is_not_stale() {
    let server = MockServer::start().await;
    mount_failure(&server).await;
    let (engine, _rx) = test_engine();
    let source = engine.add_source("Down", &server.uri(), AlertLevel::All, None).unwrap();

    assert_eq!(engine.refresh(&source.id).await, Some(false));
    let state = engine.state(&source.id).unwrap();
    assert!(!state.is_stale);
    assert!(state.summary.is_none());
    assert!(state.last_error.is_some());
}

#[tokio::test]
async fn test_recovery_after_degradation() {
    let server = MockServer::start().await;
    mount_atlassian(&server, "minor", true).await;
    let (engine, mut rx) = test_engine();
    let source = engine.add_source("Example", &server.uri(), AlertLevel::All, None).unwrap();
    engine.refresh(&source.id).await;
    assert_eq!(transitions(&drain(&mut rx)), vec![TransitionKind::Incident]);

    server.reset().await;
    mount_atlassian(&server, "major", true).await;
    engine.refresh(&source.id).await;
    assert_eq!(transitions(&drain(&mut rx)), vec![TransitionKind::Degraded]);

    server.reset().await;
    mount_atlassian(&server, "none", true).await;
    engine.refresh(&source.id).await;
    let events = drain(&mut rx);
    assert_eq!(transitions(&events), vec![TransitionKind::Recovered]);
    assert_eq!(engine.previous_indicator(&source.id), Some(Indicator::None));

    let EngineEvent::Transition(payload) = &events[0] else { panic!("expected transition") };
    assert_eq!(payload.title, "Example has recovered");
    assert_eq!(payload.url, server.uri());
}

#[tokio::test]
async fn test_alert_threshold_suppresses_but_remembers() {
    let server = MockServer::start().await;
    mount_atlassian(&server, "minor", true).await;
    let (engine, mut rx) = test_engine();
    let source = engine.add_source("Quiet", &server.uri(), AlertLevel::Critical, None).unwrap();

    engine.refresh(&source.id).await;
    assert!(transitions(&drain(&mut rx)).is_empty());
    assert_eq!(engine.previous_indicator(&source.id), Some(Indicator::Minor));
}

#[tokio::test]
async fn test_refresh_all_isolates_failures() {
    let bad = MockServer::start().await;
    mount_failure(&bad).await;
    let good = MockServer::start().await;
    mount_atlassian(&good, "major", true).await;

    let (engine, mut rx) = test_engine();
    let a = engine.add_source("A", &bad.uri(), AlertLevel::All, None).unwrap();
    let b = engine.add_source("B", &good.uri(), AlertLevel::All, None).unwrap();

    let summary = engine.refresh_all().await;
    assert_eq!(summary.source_count, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.worst, Indicator::Major);

    assert!(engine.state(&a.id).unwrap().last_error.is_some());
    let state_b = engine.state(&b.id).unwrap();
    assert!(state_b.last_error.is_none());
    assert_eq!(state_b.indicator(), Some(Indicator::Major));

    // The aggregate event comes after every per-source event.
    let events = drain(&mut rx);
    assert!(matches!(events.last(), Some(EngineEvent::RefreshComplete(_))));
    assert_eq!(transitions(&events), vec![TransitionKind::Incident]);
}

async fn mount_instatus(server: &MockServer, status: &str, components: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/api/v2/summary.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "page": {"name": "Instatus Example", "url": "https://example.instatus.com", "status": status}
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/components.json"))
        .respond_with(components)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_instatus_without_components() {
    let server = MockServer::start().await;
    mount_instatus(&server, "HASISSUES", ResponseTemplate::new(404)).await;

    let (engine, _rx) = test_engine();
    let source = engine.add_source("Instatus", &server.uri(), AlertLevel::All, None).unwrap();
    assert_eq!(engine.refresh(&source.id).await, Some(true));
    assert_eq!(engine.provider(&source.id), Some(Provider::Instatus));

    let state = engine.state(&source.id).unwrap();
    let summary = state.summary.as_ref().unwrap();
    assert!(summary.components.is_empty());
    assert!(summary.incidents.is_empty());
    assert_eq!(summary.page.name, "Instatus Example");
    assert_eq!(state.indicator(), Some(Indicator::Minor));
    assert!(state.last_error.is_none());
}

#[tokio::test]
async fn test_instatus_with_undecodable_components() {
    let server = MockServer::start().await;
    mount_instatus(&server, "UP", ResponseTemplate::new(200).set_body_string("<html>nope</html>")).await;

    let (engine, _rx) = test_engine();
    let source = engine.add_source("Instatus", &server.uri(), AlertLevel::All, None).unwrap();
    assert_eq!(engine.refresh(&source.id).await, Some(true));
    assert_eq!(engine.provider(&source.id), Some(Provider::Instatus));

    let state = engine.state(&source.id).unwrap();
    assert!(state.summary.as_ref().unwrap().components.is_empty());
    assert_eq!(state.indicator(), Some(Indicator::None));
}

#[tokio::test]
async fn test_instatus_component_tree_flattened() {
    let server = MockServer::start().await;
    let tree = json!({"components": [
        {"id": "a", "name": "Platform", "status": "OPERATIONAL", "children": [
            {"id": "a1", "name": "API", "status": "MAJOROUTAGE"}
        ]},
        {"id": "b", "name": "Website", "status": "OPERATIONAL"}
    ]});
    mount_instatus(&server, "MAJOROUTAGE", ResponseTemplate::new(200).set_body_json(tree)).await;

    let (engine, _rx) = test_engine();
    let source = engine.add_source("Instatus", &server.uri(), AlertLevel::All, None).unwrap();
    assert_eq!(engine.refresh(&source.id).await, Some(true));

    let state = engine.state(&source.id).unwrap();
    let components = &state.summary.as_ref().unwrap().components;
    let ids: Vec<&str> = components.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "a1", "b"]);
    assert_eq!(components[1].status, "major_outage");
    assert_eq!(state.indicator(), Some(Indicator::Major));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_source_does_not_delay_others() {
    let slow = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(503).set_delay(Duration::from_secs(1)))
        .mount(&slow)
        .await;
    let good = MockServer::start().await;
    mount_atlassian(&good, "minor", true).await;

    let (engine, _rx) = test_engine();
    let a = engine.add_source("Slow", &slow.uri(), AlertLevel::All, None).unwrap();
    let b = engine.add_source("Fast", &good.uri(), AlertLevel::All, None).unwrap();

    let running = tokio::spawn({
        let engine = engine.clone();
        async move { engine.refresh_all().await }
    });

    let mut fast_state = None;
    for _ in 0..80 {
        if let Some(state) = engine.state(&b.id).filter(|s| s.summary.is_some()) {
            fast_state = Some(state);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let fast_state = fast_state.expect("fast source updated while the slow one was in flight");
    assert!(!running.is_finished());
    assert!(engine.state(&a.id).map_or(true, |s| s.last_error.is_none()));
    assert_eq!(fast_state.indicator(), Some(Indicator::Minor));

    let summary = running.await.unwrap();
    assert_eq!(summary.failed, 1);
    assert!(engine.state(&a.id).unwrap().last_error.is_some());
    let after = engine.state(&b.id).unwrap();
    assert_eq!(
        serde_json::to_value(&after).unwrap(),
        serde_json::to_value(&fast_state).unwrap()
    );
}

#[tokio::test]
async fn test_removal_during_refresh_discards_result() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(summary_body("major", true))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let (engine, mut rx) = test_engine();
    let source = engine.add_source("Slow", &server.uri(), AlertLevel::All, None).unwrap();

    let task = {
        let engine = engine.clone();
        let id = source.id.clone();
        tokio::spawn(async move { engine.refresh(&id).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    engine.remove_source(&source.id).unwrap();

    assert_eq!(task.await.unwrap(), None);
    assert!(engine.state(&source.id).is_none());
    assert!(engine.provider(&source.id).is_none());
    assert!(engine.previous_indicator(&source.id).is_none());
    let since = chrono::Utc::now() - chrono::Duration::days(1);
    assert!(engine.checkpoints_since(&source.id, since).is_empty());
    assert!(transitions(&drain(&mut rx)).is_empty());
}

#[tokio::test]
async fn test_url_change_resets_source_state() {
    let first = MockServer::start().await;
    mount_atlassian(&first, "minor", true).await;
    let (engine, _rx) = test_engine();
    let source = engine.add_source("Moving", &first.uri(), AlertLevel::All, None).unwrap();
    engine.refresh(&source.id).await;
    assert!(engine.state(&source.id).is_some());

    let second = MockServer::start().await;
    let update = statusbar::models::UpdateSource {
        base_url: Some(format!("{}/", second.uri())),
        ..Default::default()
    };
    let updated = engine.update_source(&source.id, &update).unwrap();
    assert_eq!(updated.base_url, second.uri());
    assert!(engine.state(&source.id).is_none());
    assert!(engine.provider(&source.id).is_none());
    assert!(engine.previous_indicator(&source.id).is_none());
}

#[tokio::test]
async fn test_history_persisted_on_flush() {
    let server = MockServer::start().await;
    mount_atlassian(&server, "none", true).await;
    let dir = tempfile::tempdir().unwrap();
    let history_path = dir.path().join("history.json");

    let broadcaster = Arc::new(EventBroadcaster::new(16));
    let options = EngineOptions { history_path: Some(history_path.clone()), ..fast_options() };
    let (engine, _flusher) = Engine::new(options.clone(), vec![], broadcaster.clone()).unwrap();
    let source = engine.add_source("Example", &server.uri(), AlertLevel::All, None).unwrap();
    engine.refresh(&source.id).await;
    engine.flush_history().unwrap();

    let (reloaded, _flusher) = Engine::new(options, vec![source.clone()], broadcaster).unwrap();
    let since = chrono::Utc::now() - chrono::Duration::days(1);
    assert_eq!(reloaded.checkpoints_since(&source.id, since).len(), 1);
    assert_eq!(reloaded.uptime_fraction(&source.id, since), 1.0);
}
