//! In-memory transaction store and idempotency index.
//!
//! Creation is keyed by the caller-supplied idempotency key: the entry API
//! serializes concurrent creations for the same key without locking
//! unrelated keys. Transactions are never deleted; retention is an
//! external concern.

use bigdecimal::BigDecimal;
use chrono::Utc;
use dashmap::DashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Transaction, TransactionStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transaction {0} not found")]
    TransactionNotFound(Uuid),
}

/// Optional provider-response fields merged into a transaction on status
/// update. A present field overwrites the stored value, an absent one
/// leaves it untouched.
#[derive(Debug, Default, Clone)]
pub struct StatusUpdate {
    pub provider_transaction_id: Option<String>,
    pub response_code: Option<String>,
    pub response_message: Option<String>,
}

/// Constructor-injected store shared across all in-flight dispatches.
pub struct TransactionStore {
    // primary storage, keyed by idempotency key
    transactions: DashMap<String, Transaction>,
    // generated id -> idempotency key
    ids: DashMap<Uuid, String>,
}

impl TransactionStore {
    pub fn new() -> Self {
        Self {
            transactions: DashMap::new(),
            ids: DashMap::new(),
        }
    }

    /// Returns the existing transaction for `idempotency_key` unchanged,
    /// or atomically creates a new one in `Pending`. Two concurrent calls
    /// with the same key observe the same transaction identity.
    pub fn start_transaction(
        &self,
        merchant_id: &str,
        provider_hint: &str,
        amount: BigDecimal,
        currency: &str,
        idempotency_key: &str,
    ) -> Transaction {
        let entry = self
            .transactions
            .entry(idempotency_key.to_string())
            .or_insert_with(|| {
                let tx = Transaction::new(
                    merchant_id.to_string(),
                    provider_hint.to_string(),
                    amount,
                    currency.to_string(),
                    idempotency_key.to_string(),
                );
                self.ids.insert(tx.id, idempotency_key.to_string());
                tx
            });
        entry.clone()
    }

    /// Overwrites status and the update timestamp, merging any provided
    /// provider-response fields. Transition legality is deliberately not
    /// checked; any overwrite is accepted.
    pub fn update_status(
        &self,
        transaction_id: Uuid,
        status: TransactionStatus,
        update: StatusUpdate,
    ) -> Result<Transaction, StoreError> {
        let key = self
            .ids
            .get(&transaction_id)
            .map(|entry| entry.clone())
            .ok_or(StoreError::TransactionNotFound(transaction_id))?;

        let mut entry = self
            .transactions
            .get_mut(&key)
            .ok_or(StoreError::TransactionNotFound(transaction_id))?;

        entry.status = status;
        entry.updated_at = Utc::now();
        if let Some(provider_transaction_id) = update.provider_transaction_id {
            entry.provider_transaction_id = Some(provider_transaction_id);
        }
        if let Some(response_code) = update.response_code {
            entry.response_code = Some(response_code);
        }
        if let Some(response_message) = update.response_message {
            entry.response_message = Some(response_message);
        }

        Ok(entry.clone())
    }

    pub fn get(&self, transaction_id: Uuid) -> Option<Transaction> {
        let key = self.ids.get(&transaction_id).map(|entry| entry.clone())?;
        self.transactions.get(&key).map(|entry| entry.clone())
    }

    pub fn get_by_idempotency_key(&self, idempotency_key: &str) -> Option<Transaction> {
        self.transactions
            .get(idempotency_key)
            .map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

impl Default for TransactionStore {
    fn default() -> Self {
        Self::new()
    }
}
