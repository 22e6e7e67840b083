use anyhow::Context;
use dotenvy::dotenv;
use std::env;
use url::Url;

use crate::providers::sipay::SipayConfig;
use crate::routing::RoutingConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub api_key: String,
    pub sipay: SipayConfig,
    pub routing_config_path: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let base_url = env::var("SIPAY_BASE_URL")
            .unwrap_or_else(|_| "https://provisioning.sipay.com.tr/ccpayment".to_string());
        Url::parse(&base_url).context("SIPAY_BASE_URL must be a valid URL")?;

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            api_key: env::var("API_KEY").context("API_KEY must be set")?,
            sipay: SipayConfig {
                base_url,
                app_id: env::var("SIPAY_APP_ID").unwrap_or_default(),
                app_secret: env::var("SIPAY_APP_SECRET").unwrap_or_default(),
                merchant_key: env::var("SIPAY_MERCHANT_KEY").unwrap_or_default(),
                merchant_id: env::var("SIPAY_MERCHANT_ID").unwrap_or_default(),
            },
            routing_config_path: env::var("ROUTING_CONFIG_PATH")
                .unwrap_or_else(|_| "routing.json".to_string()),
        })
    }

    /// Reads the provider routing rules from the configured JSON file.
    pub fn load_routing_config(&self) -> anyhow::Result<RoutingConfig> {
        let raw = std::fs::read_to_string(&self.routing_config_path).with_context(|| {
            format!(
                "failed to read routing config at {}",
                self.routing_config_path
            )
        })?;
        let config = serde_json::from_str(&raw).context("routing config is not valid JSON")?;
        Ok(config)
    }
}
