use rocket::{get, serde::json::Json};
use crate::catalog::{self, CatalogEntry};

#[get("/catalog?<q>")]
pub fn list_catalog(q: Option<&str>) -> Json<Vec<CatalogEntry>> {
    Json(catalog::search(q.unwrap_or("")))
}
