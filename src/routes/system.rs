use rocket::{get, serde::json::Json, State};
use crate::engine::Engine;
use std::sync::Arc;

// ── Health ──

#[get("/health")]
pub fn health(engine: &State<Arc<Engine>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "statusbar",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sources": engine.source_count(),
        "worst_indicator": engine.worst_indicator()
    }))
}
