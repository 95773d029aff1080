/*!
Utilitaires de test pour l'orchestrateur Vigil

- Builder d'événements de découverte
- Builder de documents de règle JSON
- Init du logging pour les tests
*/

use std::collections::HashMap;
use vigil_orchestrator::models::{DiscoveryEvent, ADDRESS_ATTRIBUTE};

/// Initialise tracing pour les tests. Idempotent : les appels suivants sont
/// des no-ops.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Builder d'événements de découverte.
pub struct DeviceEventBuilder {
    event: DiscoveryEvent,
}

impl DeviceEventBuilder {
    pub fn new(asset_id: &str) -> Self {
        Self {
            event: DiscoveryEvent {
                asset_id: asset_id.to_string(),
                ts: time::OffsetDateTime::now_utc().unix_timestamp(),
                ttl: 3600,
                attributes: HashMap::new(),
            },
        }
    }

    pub fn ip(self, ip: &str) -> Self {
        self.attribute(ADDRESS_ATTRIBUTE, ip)
    }

    pub fn group(self, index: u32, group: &str) -> Self {
        self.attribute(&format!("group.{index}"), group)
    }

    pub fn model(self, model: &str) -> Self {
        self.attribute("device.part", model)
    }

    pub fn attribute(mut self, key: &str, value: &str) -> Self {
        self.event.attributes.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> DiscoveryEvent {
        self.event
    }
}

/// Document de règle JSON minimal : matche les assets listés, une routine
/// d'évaluation factice, multiplicateur de polling 1.
pub fn rule_document(name: &str, assets: &[&str]) -> String {
    rule_document_with_polling(name, assets, 1)
}

pub fn rule_document_with_polling(name: &str, assets: &[&str], polling: u32) -> String {
    serde_json::json!({
        "name": name,
        "description": format!("test rule {name}"),
        "assets": assets,
        "groups": [],
        "models": [],
        "evaluation": "function main (host) end",
        "polling": polling,
    })
    .to_string()
}
