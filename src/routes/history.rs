use rocket::{get, serde::json::Json, State, http::ContentType};
use crate::engine::Engine;
use crate::models::{Checkpoint, UptimeStats};
use super::{internal, not_found, ApiError};
use chrono::{Duration, Utc};
use std::sync::Arc;

fn window(days: Option<u32>) -> u32 {
    days.unwrap_or(30).clamp(1, 365)
}

// ── Checkpoints ──

#[get("/sources/<id>/history?<days>")]
pub fn source_history(
    id: &str,
    days: Option<u32>,
    engine: &State<Arc<Engine>>,
) -> Result<Json<Vec<Checkpoint>>, ApiError> {
    engine.source(id).ok_or_else(|| not_found("Source"))?;
    let cutoff = Utc::now() - Duration::days(window(days) as i64);
    Ok(Json(engine.checkpoints_since(id, cutoff)))
}

#[get("/sources/<id>/uptime?<days>")]
pub fn source_uptime(
    id: &str,
    days: Option<u32>,
    engine: &State<Arc<Engine>>,
) -> Result<Json<UptimeStats>, ApiError> {
    engine.source(id).ok_or_else(|| not_found("Source"))?;
    let days = window(days);
    let cutoff = Utc::now() - Duration::days(days as i64);
    Ok(Json(UptimeStats {
        source_id: id.to_string(),
        days,
        uptime_fraction: engine.uptime_fraction(id, cutoff),
        total_checkpoints: engine.checkpoints_since(id, cutoff).len(),
    }))
}

/// The whole history document, as persisted.
#[get("/history/export")]
pub fn export_history(engine: &State<Arc<Engine>>) -> Result<(ContentType, String), ApiError> {
    engine.history_json().map(|json| (ContentType::JSON, json)).map_err(internal)
}
