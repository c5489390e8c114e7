// Route modules, one per API area.

mod backup;
mod catalog;
mod history;
mod sources;
mod stream;
mod system;
mod webhooks;

pub use backup::{export_config, import_config};
pub use catalog::list_catalog;
pub use history::{export_history, source_history, source_uptime};
pub use sources::{
    create_source, delete_source, get_source, list_sources, refresh_all, refresh_source, reorder_sources,
    update_source,
};
pub use stream::{global_events, source_events};
pub use system::health;
pub use webhooks::{create_webhook, delete_webhook, list_webhooks};

use crate::db::Db;
use crate::engine::Engine;
use crate::error::RegistryError;
use rocket::{http::Status, serde::json::Json};

/// Every API handler, mounted under `/api/v1`.
pub fn api() -> Vec<rocket::Route> {
    rocket::routes![
        health,
        list_catalog,
        list_sources,
        get_source,
        create_source,
        update_source,
        reorder_sources,
        delete_source,
        refresh_source,
        refresh_all,
        source_history,
        source_uptime,
        export_history,
        export_config,
        import_config,
        list_webhooks,
        create_webhook,
        delete_webhook,
        global_events,
        source_events,
    ]
}

pub type ApiError = (Status, Json<serde_json::Value>);

pub(crate) fn api_error(status: Status, code: &str, message: impl Into<String>) -> ApiError {
    (status, Json(serde_json::json!({
        "error": message.into(),
        "code": code
    })))
}

pub(crate) fn not_found(what: &str) -> ApiError {
    api_error(Status::NotFound, "NOT_FOUND", format!("{} not found", what))
}

pub(crate) fn internal(e: impl std::fmt::Display) -> ApiError {
    api_error(Status::InternalServerError, "INTERNAL_ERROR", e.to_string())
}

pub(crate) fn registry_error(e: RegistryError) -> ApiError {
    match e {
        RegistryError::NotFound => not_found("Source"),
        RegistryError::Validation(msg) => api_error(Status::BadRequest, "VALIDATION_ERROR", msg),
        RegistryError::Duplicate(msg) => api_error(Status::Conflict, "DUPLICATE_SOURCE", msg),
    }
}

/// Write the registry back to SQLite. The in-memory registry stays authoritative on failure.
pub(crate) fn persist_sources(db: &Db, engine: &Engine) {
    if let Err(e) = db.save_sources(&engine.sources()) {
        tracing::error!(error = %e, "failed to persist sources");
    }
}
