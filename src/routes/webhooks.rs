use rocket::{get, post, delete, serde::json::Json, State, http::Status};
use crate::db::Db;
use crate::models::{CreateWebhook, Webhook};
use super::{api_error, internal, not_found, ApiError};
use std::sync::Arc;

// ── Webhook Channels ──

pub(crate) fn validate_webhook_url(url: &str) -> Result<String, ApiError> {
    let url = url.trim();
    let lower = url.to_lowercase();
    if !lower.starts_with("http://") && !lower.starts_with("https://") {
        return Err(api_error(Status::BadRequest, "VALIDATION_ERROR", "URL must start with http:// or https://"));
    }
    if reqwest::Url::parse(url).is_err() {
        return Err(api_error(Status::BadRequest, "VALIDATION_ERROR", "URL is not valid"));
    }
    Ok(url.to_string())
}

#[post("/webhooks", format = "json", data = "<input>")]
pub fn create_webhook(
    input: Json<CreateWebhook>,
    db: &State<Arc<Db>>,
) -> Result<(Status, Json<Webhook>), ApiError> {
    let data = input.into_inner();
    let webhook = Webhook {
        id: uuid::Uuid::new_v4().to_string(),
        url: validate_webhook_url(&data.url)?,
        payload_format: data.payload_format,
        is_enabled: true,
    };
    db.insert_webhook(&webhook).map_err(internal)?;
    tracing::info!(webhook_id = %webhook.id, "webhook created");
    Ok((Status::Created, Json(webhook)))
}

#[get("/webhooks")]
pub fn list_webhooks(db: &State<Arc<Db>>) -> Result<Json<Vec<Webhook>>, ApiError> {
    db.list_webhooks().map(Json).map_err(internal)
}

#[delete("/webhooks/<id>")]
pub fn delete_webhook(id: &str, db: &State<Arc<Db>>) -> Result<Status, ApiError> {
    if db.delete_webhook(id).map_err(internal)? {
        Ok(Status::NoContent)
    } else {
        Err(not_found("Webhook"))
    }
}
