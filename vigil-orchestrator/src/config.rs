/**
 * CONFIGURATION - Chargement YAML de l'orchestrateur
 *
 * RÔLE : Regrouper les paramètres de déploiement (broker, streams, TTL,
 * cadence de polling, chemins des règles et credentials) et les traduire en
 * commandes de contrôle au démarrage.
 *
 * FONCTIONNEMENT : Fichier YAML, chemin surchargeable par la variable
 * d'environnement VIGIL_ORCH_CONFIG. Toute erreur de lecture ou de parsing
 * est loguée et remplacée par les valeurs par défaut : l'orchestrateur
 * démarre toujours.
 */

use crate::control::ControlHandle;
use crate::server::DEFAULT_TTL_BASE;
use serde::Deserialize;

const CONFIG_ENV: &str = "VIGIL_ORCH_CONFIG";
const CONFIG_DEFAULT_PATH: &str = "orchestrator.yaml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Hôte du broker MQTT
    pub mqtt_host: String,
    /// Port du broker MQTT
    pub mqtt_port: u16,
    /// Identité du client sur le bus
    pub identity: String,
    /// Stream des événements de découverte
    pub device_stream: String,
    /// Stream de publication des métriques
    pub metric_stream: String,
    /// Pattern d'abonnement sur le stream devices
    pub consumer_pattern: String,
    /// Base de TTL des métriques publiées, en secondes
    pub ttl_base: u32,
    /// Période du tick de polling des workers, en secondes
    pub poll_interval_seconds: u64,
    /// Dossier de règles à charger au démarrage (optionnel)
    pub rules_dir: Option<String>,
    /// Fichier de credentials à charger au démarrage (optionnel)
    pub credentials_file: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "localhost".to_string(),
            mqtt_port: 1883,
            identity: "vigil-orchestrator".to_string(),
            device_stream: "vigil/devices".to_string(),
            metric_stream: "vigil/metrics".to_string(),
            consumer_pattern: "#".to_string(),
            ttl_base: DEFAULT_TTL_BASE,
            poll_interval_seconds: 60,
            rules_dir: None,
            credentials_file: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.mqtt_host, self.mqtt_port)
    }
}

/// Charge la configuration depuis le fichier désigné par VIGIL_ORCH_CONFIG
/// (défaut : orchestrator.yaml). Valeurs par défaut en cas d'erreur.
pub fn load_config() -> OrchestratorConfig {
    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| CONFIG_DEFAULT_PATH.to_string());
    match std::fs::read_to_string(&path) {
        Ok(content) => match serde_yaml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path, error = %e, "invalid config file, using defaults");
                OrchestratorConfig::default()
            }
        },
        Err(e) => {
            tracing::warn!(path, error = %e, "cannot read config file, using defaults");
            OrchestratorConfig::default()
        }
    }
}

/// Traduit la configuration en séquence de commandes de contrôle :
/// connexion, streams, TTL, puis chargements initiaux.
pub fn apply_config(handle: &ControlHandle, config: &OrchestratorConfig) {
    handle.bind(&config.endpoint(), &config.identity);
    handle.producer(&config.metric_stream);
    handle.consumer(&config.device_stream, &config.consumer_pattern);
    handle.ttl(config.ttl_base);
    if let Some(dir) = &config.rules_dir {
        handle.load_rules(dir);
    }
    if let Some(file) = &config.credentials_file {
        handle.load_credentials(file);
    }
}
