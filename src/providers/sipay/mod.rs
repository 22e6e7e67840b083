//! Sipay provider integration.
//!
//! Owns the Sipay wire protocol: bearer-token acquisition, the unified
//! payment path (`paySmart2D`) and raw proxy calls for the remaining
//! endpoints. Wire failures never escape as errors from the unified
//! payment path; they are absorbed into a declined outcome.

pub mod crypto;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{PaymentProvider, PaymentRequest, ProviderError};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const STATUS_OK: i64 = 100;

#[derive(Debug, Clone)]
pub struct SipayConfig {
    pub base_url: String,
    pub app_id: String,
    pub app_secret: String,
    pub merchant_key: String,
    pub merchant_id: String,
}

pub struct SipayProvider {
    client: reqwest::Client,
    config: SipayConfig,
}

impl SipayProvider {
    pub fn new(config: SipayConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

        Ok(Self { client, config })
    }

    /// Fetches a bearer token. Absorbs every failure into `None`.
    async fn get_token(&self) -> Option<String> {
        let url = format!("{}/api/token", self.config.base_url.trim_end_matches('/'));
        let body = json!({
            "app_id": self.config.app_id,
            "app_secret": self.config.app_secret,
        });

        let response = match self.client.post(&url).json(&body).send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(error = %err, "Sipay token request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::error!(status = %response.status(), "Sipay token request rejected");
            return None;
        }

        let value = match response.json::<Value>().await {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(error = %err, "Sipay token response was not JSON");
                return None;
            }
        };

        match token_from_response(&value) {
            Some(token) => Some(token),
            None => {
                tracing::error!("failed to extract token from Sipay response");
                None
            }
        }
    }

    async fn attempt_payment(&self, request: &PaymentRequest) -> bool {
        let token = match self.get_token().await {
            Some(token) => token,
            None => return false,
        };

        let total = request.amount.with_scale(2).to_string();
        let hash_input = format!(
            "{}|1|{}|{}|{}",
            total, request.currency, self.config.merchant_key, request.transaction_id
        );
        let hash_key = match crypto::encrypt_hash_key(&hash_input, &self.config.app_secret) {
            Some(hash_key) => hash_key,
            None => return false,
        };

        let body = json!({
            "card_token": request.card_token,
            "currency_code": request.currency,
            "installments_number": 1,
            "invoice_id": request.transaction_id,
            "invoice_description": format!("Payment for transaction {}", request.transaction_id),
            "total": total,
            "merchant_key": self.config.merchant_key,
            "hash_key": hash_key,
            "bill_email": request.customer_email.as_deref().unwrap_or("customer@example.com"),
            "bill_phone": request.customer_phone.as_deref().unwrap_or("5551234567"),
            "ip": request.customer_ip.as_deref().unwrap_or("127.0.0.1"),
            "response_method": "POST",
        });

        let url = format!(
            "{}/api/paySmart2D",
            self.config.base_url.trim_end_matches('/')
        );
        let response = match self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(
                    transaction_id = %request.transaction_id,
                    error = %err,
                    "Sipay payment request failed"
                );
                return false;
            }
        };

        if !response.status().is_success() {
            tracing::error!(
                transaction_id = %request.transaction_id,
                status = %response.status(),
                "Sipay payment rejected"
            );
            return false;
        }

        match response.json::<Value>().await {
            Ok(value) => payment_approved(&value),
            Err(err) => {
                tracing::error!(
                    transaction_id = %request.transaction_id,
                    error = %err,
                    "Sipay payment response was not JSON"
                );
                false
            }
        }
    }

    /// Raw proxy call to a Sipay endpoint. The response body and status
    /// are returned opaquely; the contract is owned by the provider.
    pub async fn post_proxy(&self, path: &str, body: Value) -> Result<(String, u16), ProviderError> {
        let token = self.get_token().await.ok_or(ProviderError::Token)?;

        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let content = response.text().await?;
        Ok((content, status))
    }

    pub async fn get_pos(&self, body: Value) -> Result<(String, u16), ProviderError> {
        self.post_proxy("/api/getpos", body).await
    }

    pub async fn installments(&self, body: Value) -> Result<(String, u16), ProviderError> {
        self.post_proxy("/api/installments", body).await
    }

    pub async fn check_status(&self, body: Value) -> Result<(String, u16), ProviderError> {
        self.post_proxy("/api/checkstatus", body).await
    }

    pub async fn confirm_payment(&self, body: Value) -> Result<(String, u16), ProviderError> {
        self.post_proxy("/api/confirmPayment", body).await
    }

    pub async fn refund(&self, body: Value) -> Result<(String, u16), ProviderError> {
        self.post_proxy("/api/refund", body).await
    }

    pub async fn save_card(&self, body: Value) -> Result<(String, u16), ProviderError> {
        self.post_proxy("/api/saveCard", body).await
    }

    pub async fn pay_by_card_token(&self, body: Value) -> Result<(String, u16), ProviderError> {
        self.post_proxy("/api/payByCardToken", body).await
    }

    pub async fn pay_by_card_token_non_secure(
        &self,
        body: Value,
    ) -> Result<(String, u16), ProviderError> {
        self.post_proxy("/api/payByCardTokenNonSecure", body).await
    }
}

/// Sipay sometimes answers with the object wrapped in a one-element
/// array; accept both shapes.
fn token_from_response(value: &Value) -> Option<String> {
    let object = match value {
        Value::Array(items) => items.first()?,
        other => other,
    };

    if object.get("status_code")?.as_i64()? != STATUS_OK {
        return None;
    }
    object
        .get("data")?
        .get("token")?
        .as_str()
        .map(str::to_string)
}

fn payment_approved(value: &Value) -> bool {
    let object = match value {
        Value::Array(items) => match items.first() {
            Some(first) => first,
            None => return false,
        },
        other => other,
    };

    let status_ok = object
        .get("status_code")
        .and_then(Value::as_i64)
        .map(|code| code == STATUS_OK)
        .unwrap_or(false);
    let paid = object
        .get("data")
        .and_then(|data| data.get("payment_status"))
        .and_then(Value::as_i64)
        .map(|status| status == 1)
        .unwrap_or(false);

    status_ok && paid
}

#[async_trait]
impl PaymentProvider for SipayProvider {
    fn name(&self) -> &str {
        "Sipay"
    }

    async fn process_payment(
        &self,
        request: &PaymentRequest,
        cancel: &CancellationToken,
    ) -> Result<bool, ProviderError> {
        tracing::info!(
            transaction_id = %request.transaction_id,
            "processing Sipay payment"
        );

        let approved = tokio::select! {
            _ = cancel.cancelled() => return Err(ProviderError::Canceled),
            approved = self.attempt_payment(request) => approved,
        };

        tracing::info!(
            transaction_id = %request.transaction_id,
            approved,
            "Sipay payment result"
        );
        Ok(approved)
    }
}
