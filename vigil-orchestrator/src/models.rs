use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Clé d'attribut portant l'adresse de polling d'un asset.
pub const ADDRESS_ATTRIBUTE: &str = "ip.1";

/// Événement de découverte d'asset reçu sur le bus (stream devices).
/// Transient : consommé une fois, jamais stocké.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryEvent {
    pub asset_id: String,
    pub ts: i64,
    pub ttl: u32,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl DiscoveryEvent {
    /// Adresse de polling de l'asset, si l'événement en porte une.
    pub fn address(&self) -> Option<&str> {
        self.attributes.get(ADDRESS_ATTRIBUTE).map(String::as_str)
    }
}

/// Rapport METRIC émis par un worker vers l'orchestrateur.
#[derive(Debug, Clone)]
pub struct MetricReport {
    pub element: String,
    pub metric: String,
    pub value: String,
    pub units: String,
    /// Multiplicateur de polling fourni au worker à la configuration.
    pub poll_frequency: u32,
    pub description: Option<String>,
}

/// Événement métrique publié sur le bus sortant, TTL calculé inclus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricOut {
    pub element: String,
    pub ts: i64,
    pub ttl: u32,
    #[serde(rename = "type")]
    pub metric: String,
    pub value: String,
    pub units: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl MetricOut {
    /// Sujet de publication : "<type>@<element>".
    pub fn subject(&self) -> String {
        format!("{}@{}", self.metric, self.element)
    }
}
