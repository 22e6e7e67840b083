use axum::{extract::State, Json};

use crate::metrics::ProviderHealth;
use crate::AppState;

pub async fn providers_health(State(state): State<AppState>) -> Json<Vec<ProviderHealth>> {
    Json(state.health.snapshot())
}
