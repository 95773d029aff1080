/*!
Moteur d'évaluation mock

Remplace le moteur Lua/SNMP de production : rend des mesures fixées à la
construction et journalise chaque appel (source du script, cible) pour les
assertions de tests.
*/

use parking_lot::Mutex;
use vigil_orchestrator::credentials::Credential;
use vigil_orchestrator::worker::{Evaluator, MetricSample, PollTarget};

/// Un appel d'évaluation enregistré.
#[derive(Debug, Clone)]
pub struct EvalCall {
    pub script: String,
    pub ip: String,
    pub credential: Option<Credential>,
}

/// Évaluateur qui rend toujours les mêmes mesures.
pub struct MockEvaluator {
    samples: Vec<MetricSample>,
    calls: Mutex<Vec<EvalCall>>,
}

impl MockEvaluator {
    pub fn returning(samples: Vec<MetricSample>) -> Self {
        Self {
            samples,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Une seule mesure, sans description.
    pub fn single(metric: &str, value: &str, units: &str) -> Self {
        Self::returning(vec![MetricSample {
            metric: metric.to_string(),
            value: value.to_string(),
            units: units.to_string(),
            description: None,
        }])
    }

    pub fn calls(&self) -> Vec<EvalCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Evaluator for MockEvaluator {
    fn evaluate(&self, script: &str, target: &PollTarget) -> anyhow::Result<Vec<MetricSample>> {
        self.calls.lock().push(EvalCall {
            script: script.to_string(),
            ip: target.ip.clone(),
            credential: target.credential.clone(),
        });
        Ok(self.samples.clone())
    }
}

/// Évaluateur en échec permanent, pour tester la tolérance aux scripts cassés.
pub struct FailingEvaluator;

impl Evaluator for FailingEvaluator {
    fn evaluate(&self, _script: &str, _target: &PollTarget) -> anyhow::Result<Vec<MetricSample>> {
        anyhow::bail!("evaluation failure (mock)")
    }
}
