/*!
# Vigil DevKit - Stubs et Utilitaires de Test

Bibliothèque facilitant les tests de l'orchestrateur Vigil avec:
- Bus mock pour tests sans broker MQTT
- Sonde de détection de credentials scriptée
- Moteur d'évaluation mock
- Builders d'événements et de règles de test
*/

pub mod bus_stub;
pub mod eval_stub;
pub mod probe_stub;
pub mod test_utils;

pub use bus_stub::{MockBus, MockPublish};
pub use eval_stub::{EvalCall, FailingEvaluator, MockEvaluator};
pub use probe_stub::{ProbeAttempt, ScriptedProbe};
pub use test_utils::{init_test_logging, rule_document, rule_document_with_polling, DeviceEventBuilder};
