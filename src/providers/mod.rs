//! Payment provider capabilities.
//!
//! Each provider owns its wire protocol and absorbs its own wire failures
//! into a boolean settlement outcome so a failing provider can never abort
//! the routing engine's fallback loop.

pub mod example_bank;
pub mod sipay;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use example_bank::ExampleBankProvider;
pub use sipay::SipayProvider;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider token acquisition failed")]
    Token,

    #[error("call canceled by caller")]
    Canceled,
}

/// Inbound payment request payload as submitted by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub transaction_id: String,
    pub merchant_id: String,
    pub amount: BigDecimal,
    pub currency: String,
    /// Leading card digits used for routing decisions.
    pub bank_bin: String,
    pub card_token: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_ip: Option<String>,
}

/// One concrete provider integration. Stateless apart from its own HTTP
/// client; safe to call concurrently from multiple in-flight transactions.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Attempt to settle one payment. `Ok(true)` is an approval,
    /// `Ok(false)` a decline or absorbed wire failure.
    async fn process_payment(
        &self,
        request: &PaymentRequest,
        cancel: &CancellationToken,
    ) -> Result<bool, ProviderError>;
}
