use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::Transaction;
use crate::error::AppError;
use crate::providers::PaymentRequest;
use crate::services::{GetTransactionQuery, ProcessTransactionCommand};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PaymentRequestBody {
    pub idempotency_key: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    pub merchant_id: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub bank_bin: String,
    pub card_token: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub customer_ip: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub approved: bool,
    pub transaction: Transaction,
}

pub async fn process_payment(
    State(state): State<AppState>,
    Json(body): Json<PaymentRequestBody>,
) -> Result<impl IntoResponse, AppError> {
    // rejected before dispatch so no transaction record is created for it
    if body.idempotency_key.trim().is_empty() {
        return Err(AppError::BadRequest(
            "idempotency_key must not be empty".to_string(),
        ));
    }

    // dropping this request future (client disconnect) cancels the token
    // seen by in-flight provider calls
    let cancel = CancellationToken::new();
    let _cancel_guard = cancel.clone().drop_guard();

    let idempotency_key = body.idempotency_key.clone();
    let request = PaymentRequest {
        transaction_id: body
            .transaction_id
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        merchant_id: body.merchant_id,
        amount: body.amount,
        currency: body.currency,
        bank_bin: body.bank_bin,
        card_token: body.card_token,
        customer_email: body.customer_email,
        customer_phone: body.customer_phone,
        customer_ip: body.customer_ip,
    };

    let approved = state
        .dispatcher
        .dispatch_command(
            ProcessTransactionCommand {
                request,
                idempotency_key: idempotency_key.clone(),
            },
            cancel.clone(),
        )
        .await?;

    let transaction = state
        .dispatcher
        .dispatch_query(GetTransactionQuery { idempotency_key }, cancel)
        .await?
        .ok_or_else(|| AppError::Internal("transaction missing after dispatch".to_string()))?;

    Ok((StatusCode::OK, Json(PaymentResponse { approved, transaction })))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(idempotency_key): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let transaction = state
        .dispatcher
        .dispatch_query(
            GetTransactionQuery {
                idempotency_key: idempotency_key.clone(),
            },
            CancellationToken::new(),
        )
        .await?;

    match transaction {
        Some(transaction) => Ok(Json(transaction)),
        None => Err(AppError::NotFound(format!(
            "Transaction for key {} not found",
            idempotency_key
        ))),
    }
}
