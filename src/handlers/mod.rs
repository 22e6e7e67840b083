pub mod payments;
pub mod providers;
pub mod sipay;
pub mod tokens;
pub mod webhook;

use axum::Json;
use serde_json::{json, Value};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
