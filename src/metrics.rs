//! Per-provider health counters.
//!
//! Populated by the transaction use case as a side observation of each
//! payment attempt and exposed read-only over HTTP for an external
//! reporting collaborator.

use dashmap::DashMap;
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderHealth {
    pub provider: String,
    pub transaction_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub total_response_time_ms: u64,
    pub success_rate: f64,
    pub average_response_time_ms: f64,
}

impl ProviderHealth {
    fn recompute(&mut self) {
        if self.transaction_count == 0 {
            self.success_rate = 0.0;
            self.average_response_time_ms = 0.0;
        } else {
            self.success_rate = self.success_count as f64 / self.transaction_count as f64;
            self.average_response_time_ms =
                self.total_response_time_ms as f64 / self.transaction_count as f64;
        }
    }
}

pub struct ProviderHealthRegistry {
    health: DashMap<String, ProviderHealth>,
}

impl ProviderHealthRegistry {
    pub fn new<I, S>(provider_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let health = DashMap::new();
        for name in provider_names {
            let name = name.into();
            health.insert(
                name.clone(),
                ProviderHealth {
                    provider: name,
                    ..ProviderHealth::default()
                },
            );
        }
        Self { health }
    }

    pub fn report_success(&self, provider: &str, response_time_ms: u64) {
        let mut entry = self.health.entry(provider.to_string()).or_insert_with(|| {
            ProviderHealth {
                provider: provider.to_string(),
                ..ProviderHealth::default()
            }
        });
        entry.transaction_count += 1;
        entry.success_count += 1;
        entry.total_response_time_ms += response_time_ms;
        entry.recompute();
    }

    pub fn report_error(&self, provider: &str) {
        let mut entry = self.health.entry(provider.to_string()).or_insert_with(|| {
            ProviderHealth {
                provider: provider.to_string(),
                ..ProviderHealth::default()
            }
        });
        entry.transaction_count += 1;
        entry.error_count += 1;
        entry.recompute();
    }

    pub fn snapshot(&self) -> Vec<ProviderHealth> {
        let mut all: Vec<ProviderHealth> =
            self.health.iter().map(|entry| entry.clone()).collect();
        all.sort_by(|a, b| a.provider.cmp(&b.provider));
        all
    }

    pub fn get(&self, provider: &str) -> Option<ProviderHealth> {
        self.health.get(provider).map(|entry| entry.clone())
    }
}
