use rocket::{get, post, patch, put, delete, serde::json::Json, State, http::Status};
use crate::db::Db;
use crate::engine::Engine;
use crate::models::{AlertLevel, CreateSource, ReorderSources, SourceView, UpdateSource};
use crate::sse::RefreshSummary;
use super::{api_error, not_found, persist_sources, registry_error, ApiError};
use std::sync::Arc;

fn parse_alert_level(raw: Option<&str>) -> Result<AlertLevel, ApiError> {
    match raw {
        None => Ok(AlertLevel::default()),
        Some(raw) => AlertLevel::parse(raw).ok_or_else(|| api_error(
            Status::BadRequest,
            "VALIDATION_ERROR",
            "alert_level must be one of: all, minor, major, critical",
        )),
    }
}

// ── List / Get ──

#[get("/sources?<group>")]
pub fn list_sources(group: Option<&str>, engine: &State<Arc<Engine>>) -> Json<Vec<SourceView>> {
    let views = engine.views();
    match group {
        Some(g) => Json(views.into_iter().filter(|v| v.source.group.as_deref() == Some(g)).collect()),
        None => Json(views),
    }
}

#[get("/sources/<id>")]
pub fn get_source(id: &str, engine: &State<Arc<Engine>>) -> Result<Json<SourceView>, ApiError> {
    engine.view(id).map(Json).ok_or_else(|| not_found("Source"))
}

// ── Create ──

#[post("/sources", format = "json", data = "<input>")]
pub fn create_source(
    input: Json<CreateSource>,
    engine: &State<Arc<Engine>>,
    db: &State<Arc<Db>>,
) -> Result<(Status, Json<SourceView>), ApiError> {
    let data = input.into_inner();
    let level = parse_alert_level(data.alert_level.as_deref())?;

    let source = engine
        .add_source(&data.name, &data.base_url, level, data.group.as_deref())
        .map_err(registry_error)?;
    persist_sources(db, engine);

    let view = engine.view(&source.id).ok_or_else(|| not_found("Source"))?;
    Ok((Status::Created, Json(view)))
}

// ── Update ──

#[patch("/sources/<id>", format = "json", data = "<input>")]
pub fn update_source(
    id: &str,
    input: Json<UpdateSource>,
    engine: &State<Arc<Engine>>,
    db: &State<Arc<Db>>,
) -> Result<Json<SourceView>, ApiError> {
    let update = input.into_inner();
    engine.update_source(id, &update).map_err(registry_error)?;
    persist_sources(db, engine);
    engine.view(id).map(Json).ok_or_else(|| not_found("Source"))
}

#[put("/sources/order", format = "json", data = "<input>")]
pub fn reorder_sources(
    input: Json<ReorderSources>,
    engine: &State<Arc<Engine>>,
    db: &State<Arc<Db>>,
) -> Result<Json<Vec<SourceView>>, ApiError> {
    engine.reorder(&input.ids).map_err(registry_error)?;
    persist_sources(db, engine);
    Ok(Json(engine.views()))
}

// ── Delete ──

#[delete("/sources/<id>")]
pub fn delete_source(
    id: &str,
    engine: &State<Arc<Engine>>,
    db: &State<Arc<Db>>,
) -> Result<Status, ApiError> {
    engine.remove_source(id).map_err(registry_error)?;
    persist_sources(db, engine);
    Ok(Status::NoContent)
}

// ── Refresh ──

#[post("/sources/<id>/refresh")]
pub async fn refresh_source(id: &str, engine: &State<Arc<Engine>>) -> Result<Json<SourceView>, ApiError> {
    if engine.source(id).is_none() {
        return Err(not_found("Source"));
    }
    engine.refresh(id).await;
    engine.view(id).map(Json).ok_or_else(|| not_found("Source"))
}

#[post("/refresh")]
pub async fn refresh_all(engine: &State<Arc<Engine>>) -> Json<RefreshSummary> {
    Json(engine.inner().refresh_all().await)
}
