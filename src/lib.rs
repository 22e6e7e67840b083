pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod providers;
pub mod routing;
pub mod services;
pub mod store;
pub mod validation;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};

use dispatch::middleware::{LoggingMiddleware, TransactionalMiddleware, ValidationMiddleware};
use dispatch::unit_of_work::InMemoryUnitOfWork;
use dispatch::Dispatcher;
use metrics::ProviderHealthRegistry;
use providers::SipayProvider;
use routing::RoutingEngine;
use services::{
    GetTransactionHandler, GetTransactionQuery, ProcessTransactionCommand,
    ProcessTransactionHandler, TokenizationService,
};
use store::TransactionStore;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub store: Arc<TransactionStore>,
    pub health: Arc<ProviderHealthRegistry>,
    pub tokens: Arc<TokenizationService>,
    pub sipay: Arc<SipayProvider>,
    pub api_key: String,
    pub webhook_secret: String,
}

/// Standard dispatcher wiring: logging, per-command validation and a unit
/// of work around every pipeline, plus the payment command and query
/// handlers.
pub fn build_dispatcher(
    store: Arc<TransactionStore>,
    routing: Arc<RoutingEngine>,
    health: Arc<ProviderHealthRegistry>,
) -> Dispatcher {
    Dispatcher::builder()
        .middleware(LoggingMiddleware)
        .middleware(ValidationMiddleware::new().validator(services::payment_command_rules))
        .middleware(TransactionalMiddleware::new(Arc::new(InMemoryUnitOfWork)))
        .command::<ProcessTransactionCommand, _>(ProcessTransactionHandler::new(
            store.clone(),
            routing,
            health,
        ))
        .query::<GetTransactionQuery, _>(GetTransactionHandler::new(store))
        .build()
}

pub fn create_app(state: AppState) -> Router {
    // merchant-facing routes sit behind the API key; the webhook
    // authenticates through its encrypted hash key instead
    let protected = Router::new()
        .route("/payments", post(handlers::payments::process_payment))
        .route(
            "/transactions/:idempotency_key",
            get(handlers::payments::get_transaction),
        )
        .route("/tokens", post(handlers::tokens::create_token))
        .route("/providers/health", get(handlers::providers::providers_health))
        .route("/sipay/getpos", post(handlers::sipay::get_pos))
        .route("/sipay/installments", post(handlers::sipay::installments))
        .route("/sipay/checkstatus", post(handlers::sipay::check_status))
        .route("/sipay/confirmPayment", post(handlers::sipay::confirm_payment))
        .route("/sipay/refund", post(handlers::sipay::refund))
        .route("/sipay/saveCard", post(handlers::sipay::save_card))
        .route("/sipay/payByCardToken", post(handlers::sipay::pay_by_card_token))
        .route(
            "/sipay/payByCardTokenNonSecure",
            post(handlers::sipay::pay_by_card_token_non_secure),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::api_key_auth,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/webhooks/sipay", post(handlers::webhook::sipay_webhook))
        .merge(protected)
        .layer(axum_middleware::from_fn(
            middleware::request_logger::request_logger_middleware,
        ))
        .with_state(state)
}
