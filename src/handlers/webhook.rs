use axum::{extract::State, response::IntoResponse, Form, Json};
use serde::Deserialize;

use crate::error::AppError;
use crate::providers::sipay::crypto;
use crate::AppState;

/// Sipay posts the result as a form with the token under either
/// `hash_key` or `hashKey` depending on the flow.
#[derive(Debug, Deserialize)]
pub struct SipayWebhookForm {
    #[serde(default)]
    pub hash_key: Option<String>,
    #[serde(default, rename = "hashKey")]
    pub hash_key_camel: Option<String>,
}

pub async fn sipay_webhook(
    State(state): State<AppState>,
    Form(form): Form<SipayWebhookForm>,
) -> Result<impl IntoResponse, AppError> {
    let token = form
        .hash_key
        .or(form.hash_key_camel)
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("hash_key is required".to_string()))?;

    if state.webhook_secret.is_empty() {
        return Err(AppError::Internal(
            "webhook secret is not configured".to_string(),
        ));
    }

    let payload = crypto::decrypt_hash_key(&token, &state.webhook_secret)
        .ok_or_else(|| AppError::BadRequest("hash_key could not be verified".to_string()))?;

    tracing::info!(
        invoice_id = %payload.invoice_id,
        status = %payload.status,
        "settlement webhook accepted"
    );

    Ok(Json(payload))
}
