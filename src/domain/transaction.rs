//! Transaction domain entity.
//! Framework-agnostic representation of one payment attempt.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a transaction.
///
/// The core only moves a transaction forward through
/// `Pending -> Processing -> Approved | Declined`. `Settled` and
/// `Reconciled` are reached later by webhook reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Processing,
    Approved,
    Declined,
    Settled,
    Reconciled,
}

/// Domain entity representing a payment transaction.
///
/// `idempotency_key`, `amount` and `currency` are immutable after creation;
/// only status and the provider response fields are updated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub merchant_id: String,
    pub provider: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub provider_transaction_id: Option<String>,
    pub response_code: Option<String>,
    pub response_message: Option<String>,
    pub idempotency_key: String,
}

impl Transaction {
    pub fn new(
        merchant_id: String,
        provider: String,
        amount: BigDecimal,
        currency: String,
        idempotency_key: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            merchant_id,
            provider,
            amount,
            currency,
            status: TransactionStatus::Pending,
            created_at: now,
            updated_at: now,
            provider_transaction_id: None,
            response_code: None,
            response_message: None,
            idempotency_key,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(
            self.status,
            TransactionStatus::Pending | TransactionStatus::Processing
        )
    }
}
