use rocket::{get, post, serde::json::Json, State};
use crate::db::Db;
use crate::engine::Engine;
use crate::error::RegistryError;
use crate::models::{ExportDocument, ImportResult, Webhook};
use super::{internal, persist_sources, webhooks::validate_webhook_url, ApiError};
use std::sync::Arc;

// ── Export / Import ──

#[get("/export")]
pub fn export_config(engine: &State<Arc<Engine>>, db: &State<Arc<Db>>) -> Result<Json<ExportDocument>, ApiError> {
    Ok(Json(ExportDocument {
        sources: engine.sources(),
        webhooks: db.list_webhooks().map_err(internal)?,
    }))
}

/// Merge an export document. Sources whose id or URL is already registered are skipped,
/// as are webhooks whose URL is already configured.
#[post("/import", format = "json", data = "<input>")]
pub fn import_config(
    input: Json<ExportDocument>,
    engine: &State<Arc<Engine>>,
    db: &State<Arc<Db>>,
) -> Result<Json<ImportResult>, ApiError> {
    let doc = input.into_inner();
    let mut result = ImportResult { sources_added: 0, sources_skipped: 0, webhooks_added: 0 };

    let mut sources = doc.sources;
    sources.sort_by_key(|s| s.sort_order);
    for source in sources {
        match engine.import_source(source) {
            Ok(_) => result.sources_added += 1,
            Err(RegistryError::Duplicate(_)) => result.sources_skipped += 1,
            Err(e) => {
                tracing::warn!(error = %e, "skipping imported source");
                result.sources_skipped += 1;
            }
        }
    }
    if result.sources_added > 0 {
        persist_sources(db, engine);
    }

    let existing = db.list_webhooks().map_err(internal)?;
    for webhook in doc.webhooks {
        let Ok(url) = validate_webhook_url(&webhook.url) else { continue };
        if existing.iter().any(|w| w.url == url) {
            continue;
        }
        let id = if existing.iter().any(|w| w.id == webhook.id) {
            uuid::Uuid::new_v4().to_string()
        } else {
            webhook.id
        };
        let webhook = Webhook { id, url, ..webhook };
        db.insert_webhook(&webhook).map_err(internal)?;
        result.webhooks_added += 1;
    }

    tracing::info!(
        sources_added = result.sources_added,
        sources_skipped = result.sources_skipped,
        webhooks_added = result.webhooks_added,
        "configuration imported"
    );
    Ok(Json(result))
}
