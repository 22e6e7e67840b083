//! Thin HTTP passthrough to the Sipay provider's auxiliary endpoints.
//! The upstream response body and status are relayed untouched.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::Value;

use crate::error::AppError;
use crate::providers::ProviderError;
use crate::AppState;

fn relay(result: Result<(String, u16), ProviderError>) -> Result<impl IntoResponse, AppError> {
    let (content, status) = result.map_err(|err| AppError::Internal(err.to_string()))?;
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
    Ok((status, content))
}

pub async fn get_pos(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    relay(state.sipay.get_pos(body).await)
}

pub async fn installments(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    relay(state.sipay.installments(body).await)
}

pub async fn check_status(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    relay(state.sipay.check_status(body).await)
}

pub async fn confirm_payment(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    relay(state.sipay.confirm_payment(body).await)
}

pub async fn refund(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    relay(state.sipay.refund(body).await)
}

pub async fn save_card(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    relay(state.sipay.save_card(body).await)
}

pub async fn pay_by_card_token(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    relay(state.sipay.pay_by_card_token(body).await)
}

pub async fn pay_by_card_token_non_secure(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    relay(state.sipay.pay_by_card_token_non_secure(body).await)
}
