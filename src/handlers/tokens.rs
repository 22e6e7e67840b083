use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TokenizeRequest {
    pub card_number: String,
}

#[derive(Debug, Serialize)]
pub struct TokenizeResponse {
    pub token: String,
    pub masked_card: String,
}

pub async fn create_token(
    State(state): State<AppState>,
    Json(body): Json<TokenizeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let digits = body.card_number.chars().filter(|ch| ch.is_ascii_digit()).count();
    if !(12..=19).contains(&digits) {
        return Err(AppError::Validation(
            "card_number: must contain 12-19 digits".to_string(),
        ));
    }

    let token = state.tokens.tokenize_card(&body.card_number);
    let masked_card = state
        .tokens
        .masked_card(&token)
        .ok_or_else(|| AppError::Internal("token missing after issue".to_string()))?;

    Ok((StatusCode::CREATED, Json(TokenizeResponse { token, masked_card })))
}
