//! Rule-based provider routing.
//!
//! Rules are configuration data loaded once at startup and immutable for
//! the process lifetime. Selection filters rules by merchant OR bin,
//! orders by priority then commission rate, and resolves provider names
//! through an explicit name-to-capability map built from configuration.

use bigdecimal::BigDecimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::providers::{PaymentProvider, PaymentRequest};

/// Fixed per-candidate attempt budget in the fallback path, independent
/// of the caller's own cancellation.
pub const FALLBACK_TIMEOUT: Duration = Duration::from_millis(3000);

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("no suitable provider found for merchant {merchant_id} / bin {bank_bin}")]
    NoProviderFound {
        merchant_id: String,
        bank_bin: String,
    },
}

/// Declarative provider-selection criterion. Lower priority wins; equal
/// priorities prefer the cheaper commission.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderRule {
    pub provider: String,
    pub commission_rate: BigDecimal,
    #[serde(default)]
    pub bank_bins: Vec<String>,
    #[serde(default)]
    pub merchant_ids: Vec<String>,
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RoutingConfig {
    pub provider_rules: Vec<ProviderRule>,
}

pub struct RoutingEngine {
    rules: Vec<ProviderRule>,
    providers: HashMap<String, Arc<dyn PaymentProvider>>,
    fallback_timeout: Duration,
}

impl RoutingEngine {
    pub fn new(config: RoutingConfig, providers: HashMap<String, Arc<dyn PaymentProvider>>) -> Self {
        Self {
            rules: config.provider_rules,
            providers,
            fallback_timeout: FALLBACK_TIMEOUT,
        }
    }

    /// Overrides the per-candidate timeout. Used by tests; production
    /// keeps the fixed default.
    pub fn with_fallback_timeout(mut self, timeout: Duration) -> Self {
        self.fallback_timeout = timeout;
        self
    }

    /// Matching rules in preference order: merchant OR bin (inclusive),
    /// ascending priority, commission rate as the tie-break.
    fn candidate_rules(&self, merchant_id: &str, bank_bin: &str) -> Vec<&ProviderRule> {
        let mut rules: Vec<&ProviderRule> = self
            .rules
            .iter()
            .filter(|rule| {
                rule.merchant_ids.iter().any(|m| m == merchant_id)
                    || rule.bank_bins.iter().any(|b| b == bank_bin)
            })
            .collect();
        rules.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.commission_rate.cmp(&b.commission_rate))
        });
        rules
    }

    /// Selects the first matching rule whose provider name resolves to a
    /// registered capability. `_amount` is accepted for future
    /// amount-banded rules but not filtered on.
    pub fn select_provider(
        &self,
        merchant_id: &str,
        bank_bin: &str,
        _amount: &BigDecimal,
    ) -> Result<Arc<dyn PaymentProvider>, RoutingError> {
        for rule in self.candidate_rules(merchant_id, bank_bin) {
            if let Some(provider) = self.providers.get(&rule.provider) {
                return Ok(provider.clone());
            }
        }

        Err(RoutingError::NoProviderFound {
            merchant_id: merchant_id.to_string(),
            bank_bin: bank_bin.to_string(),
        })
    }

    /// Bounded-time failover: each candidate gets exactly one attempt
    /// raced against the fixed timeout. A definitive provider answer
    /// (approval or decline) ends the walk; a timeout or provider error
    /// silently moves on. Exhaustion yields `false`.
    pub async fn process_with_fallback(
        &self,
        merchant_id: &str,
        bank_bin: &str,
        _amount: &BigDecimal,
        request: &PaymentRequest,
        cancel: &CancellationToken,
    ) -> bool {
        for rule in self.candidate_rules(merchant_id, bank_bin) {
            let provider = match self.providers.get(&rule.provider) {
                Some(provider) => provider,
                None => continue,
            };

            match tokio::time::timeout(
                self.fallback_timeout,
                provider.process_payment(request, cancel),
            )
            .await
            {
                Ok(Ok(outcome)) => return outcome,
                Ok(Err(err)) => {
                    tracing::warn!(
                        provider = provider.name(),
                        error = %err,
                        "provider failed, trying next candidate"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        provider = provider.name(),
                        timeout_ms = self.fallback_timeout.as_millis() as u64,
                        "provider timed out, trying next candidate"
                    );
                }
            }
        }

        false
    }
}
