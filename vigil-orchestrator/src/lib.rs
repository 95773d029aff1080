/**
 * VIGIL ORCHESTRATOR - Collecte de télémétrie pilotée par règles
 *
 * RÔLE : Cœur du collecteur Vigil. Écoute les événements de découverte
 * d'assets sur le bus, confronte chaque asset aux règles de collecte,
 * détecte ses credentials SNMP, et entretient un worker de polling par asset
 * surveillé. Les métriques produites par les workers sont republiées sur le
 * bus avec un TTL calculé.
 *
 * FONCTIONNEMENT : Une boucle de contrôle unique (server) multiplexe le
 * canal de contrôle, le bus et le canal fan-in des workers. Les
 * collaborateurs lourds — client bus, sonde SNMP, moteur d'évaluation —
 * sont derrière des traits et fournis par l'hôte au démarrage.
 */

pub mod bus;
pub mod config;
pub mod control;
pub mod credentials;
pub mod detect;
pub mod lifecycle;
pub mod matcher;
pub mod models;
pub mod rules;
pub mod server;
pub mod worker;

pub use bus::{BusClient, BusEvent, MqttBus};
pub use config::{apply_config, load_config, OrchestratorConfig};
pub use control::ControlHandle;
pub use credentials::{Credential, CredentialStore, SnmpVersion};
pub use detect::CredentialProbe;
pub use models::{DiscoveryEvent, MetricOut};
pub use rules::{Rule, RuleStore};
pub use server::Orchestrator;
pub use worker::{Evaluator, MetricSample, PollTarget};
