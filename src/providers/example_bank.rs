//! Simulated bank integration used as the default low-cost route.

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{PaymentProvider, PaymentRequest, ProviderError};

const SETTLE_LATENCY: Duration = Duration::from_millis(100);

pub struct ExampleBankProvider;

#[async_trait]
impl PaymentProvider for ExampleBankProvider {
    fn name(&self) -> &str {
        "ExampleBank"
    }

    async fn process_payment(
        &self,
        request: &PaymentRequest,
        cancel: &CancellationToken,
    ) -> Result<bool, ProviderError> {
        tracing::info!(
            transaction_id = %request.transaction_id,
            "processing ExampleBank payment"
        );

        tokio::select! {
            _ = cancel.cancelled() => Err(ProviderError::Canceled),
            _ = tokio::time::sleep(SETTLE_LATENCY) => Ok(true),
        }
    }
}
