//! Transaction-processing use case.
//!
//! Ties the routing engine and the transaction store together: idempotency
//! check, provider selection, one timed provider attempt, and a terminal
//! status decision. Provider failures are absorbed so a transaction never
//! stays stuck in `Processing`.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::dispatch::{
    Command, CommandHandler, DispatchContext, DispatchError, Query, QueryHandler,
};
use crate::domain::{Transaction, TransactionStatus};
use crate::metrics::ProviderHealthRegistry;
use crate::providers::PaymentRequest;
use crate::routing::RoutingEngine;
use crate::store::{StatusUpdate, TransactionStore};
use crate::validation;

pub struct ProcessTransactionCommand {
    pub request: PaymentRequest,
    pub idempotency_key: String,
}

impl Command for ProcessTransactionCommand {
    type Output = bool;
}

/// Validation rules registered for `ProcessTransactionCommand`.
pub fn payment_command_rules(command: &ProcessTransactionCommand) -> Result<(), Vec<String>> {
    let request = &command.request;
    let checks = [
        validation::validate_required("idempotency_key", &command.idempotency_key),
        validation::validate_max_len(
            "idempotency_key",
            &command.idempotency_key,
            validation::IDEMPOTENCY_KEY_MAX_LEN,
        ),
        validation::validate_required("transaction_id", &request.transaction_id),
        validation::validate_required("merchant_id", &request.merchant_id),
        validation::validate_max_len(
            "merchant_id",
            &request.merchant_id,
            validation::MERCHANT_ID_MAX_LEN,
        ),
        validation::validate_positive_amount(&request.amount),
        validation::validate_currency(&request.currency),
        validation::validate_bank_bin(&request.bank_bin),
        validation::validate_required("card_token", &request.card_token),
    ];

    let violations: Vec<String> = checks
        .into_iter()
        .filter_map(|check| check.err())
        .map(|err| err.to_string())
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

pub struct ProcessTransactionHandler {
    store: Arc<TransactionStore>,
    routing: Arc<RoutingEngine>,
    health: Arc<ProviderHealthRegistry>,
}

impl ProcessTransactionHandler {
    pub fn new(
        store: Arc<TransactionStore>,
        routing: Arc<RoutingEngine>,
        health: Arc<ProviderHealthRegistry>,
    ) -> Self {
        Self {
            store,
            routing,
            health,
        }
    }
}

#[async_trait]
impl CommandHandler<ProcessTransactionCommand> for ProcessTransactionHandler {
    async fn handle(
        &self,
        command: &ProcessTransactionCommand,
        ctx: &DispatchContext<'_>,
    ) -> Result<bool, DispatchError> {
        let request = &command.request;

        // replayed requests with a settled decision answer from the store
        if let Some(existing) = self.store.get_by_idempotency_key(&command.idempotency_key) {
            if existing.status != TransactionStatus::Pending {
                tracing::info!(
                    idempotency_key = %command.idempotency_key,
                    status = ?existing.status,
                    "replay answered from idempotency index"
                );
                return Ok(existing.status == TransactionStatus::Approved);
            }
        }

        let tx = self.store.start_transaction(
            &request.merchant_id,
            &request.bank_bin,
            request.amount.clone(),
            &request.currency,
            &command.idempotency_key,
        );
        self.store
            .update_status(tx.id, TransactionStatus::Processing, StatusUpdate::default())?;

        let provider = match self.routing.select_provider(
            &request.merchant_id,
            &request.bank_bin,
            &request.amount,
        ) {
            Ok(provider) => provider,
            Err(err) => {
                tracing::warn!(
                    transaction_id = %tx.id,
                    error = %err,
                    "routing produced no provider, declining"
                );
                self.store.update_status(
                    tx.id,
                    TransactionStatus::Declined,
                    StatusUpdate {
                        response_message: Some(err.to_string()),
                        ..StatusUpdate::default()
                    },
                )?;
                return Ok(false);
            }
        };

        let started = Instant::now();
        let outcome = provider.process_payment(request, ctx.cancellation()).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let approved = match outcome {
            Ok(approved) => {
                self.health.report_success(provider.name(), elapsed_ms);
                approved
            }
            Err(err) => {
                self.health.report_error(provider.name());
                tracing::warn!(
                    transaction_id = %tx.id,
                    provider = provider.name(),
                    error = %err,
                    "provider call failed, declining"
                );
                false
            }
        };

        let status = if approved {
            TransactionStatus::Approved
        } else {
            TransactionStatus::Declined
        };
        self.store
            .update_status(tx.id, status, StatusUpdate::default())?;

        tracing::info!(
            transaction_id = %tx.id,
            provider = provider.name(),
            approved,
            elapsed_ms,
            "payment attempt finished"
        );
        Ok(approved)
    }
}

pub struct GetTransactionQuery {
    pub idempotency_key: String,
}

impl Query for GetTransactionQuery {
    type Output = Option<Transaction>;
}

pub struct GetTransactionHandler {
    store: Arc<TransactionStore>,
}

impl GetTransactionHandler {
    pub fn new(store: Arc<TransactionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl QueryHandler<GetTransactionQuery> for GetTransactionHandler {
    async fn handle(
        &self,
        query: &GetTransactionQuery,
        _ctx: &DispatchContext<'_>,
    ) -> Result<Option<Transaction>, DispatchError> {
        Ok(self.store.get_by_idempotency_key(&query.idempotency_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Dispatcher;
    use crate::providers::{PaymentProvider, ProviderError};
    use crate::routing::{ProviderRule, RoutingConfig};
    use bigdecimal::BigDecimal;
    use std::collections::HashMap;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;

    struct CountingProvider {
        approves: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PaymentProvider for CountingProvider {
        fn name(&self) -> &str {
            "Sipay"
        }

        async fn process_payment(
            &self,
            _request: &PaymentRequest,
            _cancel: &CancellationToken,
        ) -> Result<bool, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.approves)
        }
    }

    fn request(key_suffix: &str) -> PaymentRequest {
        PaymentRequest {
            transaction_id: format!("tx-{}", key_suffix),
            merchant_id: "M1".to_string(),
            amount: BigDecimal::from_str("100.00").expect("valid decimal"),
            currency: "TRY".to_string(),
            bank_bin: "450803".to_string(),
            card_token: "tok-1".to_string(),
            customer_email: None,
            customer_phone: None,
            customer_ip: None,
        }
    }

    fn fixture(approves: bool) -> (Arc<TransactionStore>, Arc<CountingProvider>, Dispatcher) {
        let store = Arc::new(TransactionStore::new());
        let provider = Arc::new(CountingProvider {
            approves,
            calls: AtomicUsize::new(0),
        });
        let mut providers: HashMap<String, Arc<dyn PaymentProvider>> = HashMap::new();
        providers.insert("Sipay".to_string(), provider.clone());

        let routing = Arc::new(RoutingEngine::new(
            RoutingConfig {
                provider_rules: vec![ProviderRule {
                    provider: "Sipay".to_string(),
                    commission_rate: BigDecimal::from_str("0.02").expect("valid decimal"),
                    bank_bins: vec!["450803".to_string()],
                    merchant_ids: vec![],
                    priority: 1,
                }],
            },
            providers,
        ));
        let health = Arc::new(ProviderHealthRegistry::new(["Sipay"]));

        let dispatcher = Dispatcher::builder()
            .command::<ProcessTransactionCommand, _>(ProcessTransactionHandler::new(
                store.clone(),
                routing,
                health,
            ))
            .query::<GetTransactionQuery, _>(GetTransactionHandler::new(store.clone()))
            .build();

        (store, provider, dispatcher)
    }

    #[tokio::test]
    async fn approved_payment_reaches_terminal_status() {
        let (store, provider, dispatcher) = fixture(true);

        let approved = dispatcher
            .dispatch_command(
                ProcessTransactionCommand {
                    request: request("a"),
                    idempotency_key: "idem-a".to_string(),
                },
                CancellationToken::new(),
            )
            .await
            .expect("dispatch succeeds");

        assert!(approved);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        let tx = store
            .get_by_idempotency_key("idem-a")
            .expect("transaction stored");
        assert_eq!(tx.status, TransactionStatus::Approved);
    }

    #[tokio::test]
    async fn replay_of_decided_transaction_skips_the_provider() {
        let (_store, provider, dispatcher) = fixture(true);

        for _ in 0..3 {
            let approved = dispatcher
                .dispatch_command(
                    ProcessTransactionCommand {
                        request: request("b"),
                        idempotency_key: "idem-b".to_string(),
                    },
                    CancellationToken::new(),
                )
                .await
                .expect("dispatch succeeds");
            assert!(approved);
        }

        // only the first dispatch reached the provider
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unroutable_request_declines_without_error() {
        let (store, provider, dispatcher) = fixture(true);

        let mut unroutable = request("c");
        unroutable.bank_bin = "999999".to_string();

        let approved = dispatcher
            .dispatch_command(
                ProcessTransactionCommand {
                    request: unroutable,
                    idempotency_key: "idem-c".to_string(),
                },
                CancellationToken::new(),
            )
            .await
            .expect("no-provider is a decline, not an error");

        assert!(!approved);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        let tx = store
            .get_by_idempotency_key("idem-c")
            .expect("transaction stored");
        assert_eq!(tx.status, TransactionStatus::Declined);
        assert!(tx
            .response_message
            .as_deref()
            .unwrap_or_default()
            .contains("no suitable provider"));
    }

    #[tokio::test]
    async fn declined_payment_is_remembered_for_replays() {
        let (store, _provider, dispatcher) = fixture(false);

        let first = dispatcher
            .dispatch_command(
                ProcessTransactionCommand {
                    request: request("d"),
                    idempotency_key: "idem-d".to_string(),
                },
                CancellationToken::new(),
            )
            .await
            .expect("dispatch succeeds");
        let second = dispatcher
            .dispatch_command(
                ProcessTransactionCommand {
                    request: request("d"),
                    idempotency_key: "idem-d".to_string(),
                },
                CancellationToken::new(),
            )
            .await
            .expect("dispatch succeeds");

        assert!(!first);
        assert!(!second);
        let tx = store
            .get_by_idempotency_key("idem-d")
            .expect("transaction stored");
        assert_eq!(tx.status, TransactionStatus::Declined);
    }

    #[tokio::test]
    async fn query_returns_stored_transaction() {
        let (_store, _provider, dispatcher) = fixture(true);

        dispatcher
            .dispatch_command(
                ProcessTransactionCommand {
                    request: request("e"),
                    idempotency_key: "idem-e".to_string(),
                },
                CancellationToken::new(),
            )
            .await
            .expect("dispatch succeeds");

        let found = dispatcher
            .dispatch_query(
                GetTransactionQuery {
                    idempotency_key: "idem-e".to_string(),
                },
                CancellationToken::new(),
            )
            .await
            .expect("query succeeds");
        assert!(found.is_some());

        let missing = dispatcher
            .dispatch_query(
                GetTransactionQuery {
                    idempotency_key: "idem-missing".to_string(),
                },
                CancellationToken::new(),
            )
            .await
            .expect("query succeeds");
        assert!(missing.is_none());
    }

    #[test]
    fn command_rules_join_all_violations() {
        let command = ProcessTransactionCommand {
            request: PaymentRequest {
                transaction_id: "".to_string(),
                merchant_id: "M1".to_string(),
                amount: BigDecimal::from(-5),
                currency: "TRY".to_string(),
                bank_bin: "450803".to_string(),
                card_token: "tok-1".to_string(),
                customer_email: None,
                customer_phone: None,
                customer_ip: None,
            },
            idempotency_key: "idem-1".to_string(),
        };

        let violations = payment_command_rules(&command).expect_err("two fields are invalid");
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().any(|v| v.starts_with("transaction_id")));
        assert!(violations.iter().any(|v| v.starts_with("amount")));
    }
}
