use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paygate_core::config::Config;
use paygate_core::metrics::ProviderHealthRegistry;
use paygate_core::providers::{ExampleBankProvider, PaymentProvider, SipayProvider};
use paygate_core::routing::RoutingEngine;
use paygate_core::services::TokenizationService;
use paygate_core::store::TransactionStore;
use paygate_core::{build_dispatcher, create_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let routing_config = config.load_routing_config()?;
    tracing::info!(
        rules = routing_config.provider_rules.len(),
        path = %config.routing_config_path,
        "routing rules loaded"
    );

    let sipay = Arc::new(SipayProvider::new(config.sipay.clone())?);
    let mut providers: HashMap<String, Arc<dyn PaymentProvider>> = HashMap::new();
    providers.insert("ExampleBank".to_string(), Arc::new(ExampleBankProvider));
    providers.insert("Sipay".to_string(), sipay.clone());
    tracing::info!(providers = providers.len(), "payment providers registered");

    let health = Arc::new(ProviderHealthRegistry::new(providers.keys().cloned()));
    let routing = Arc::new(RoutingEngine::new(routing_config, providers));
    let store = Arc::new(TransactionStore::new());
    let dispatcher = Arc::new(build_dispatcher(store.clone(), routing, health.clone()));

    let state = AppState {
        dispatcher,
        store,
        health,
        tokens: Arc::new(TokenizationService::new()),
        sipay,
        api_key: config.api_key.clone(),
        webhook_secret: config.sipay.app_secret.clone(),
    };
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
