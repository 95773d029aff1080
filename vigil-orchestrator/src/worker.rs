/**
 * WORKER - Task de polling dédiée à un asset
 *
 * RÔLE : Chaque asset surveillé a exactement un worker. Le worker reçoit sa
 * configuration par messages (nom d'asset, scripts d'évaluation, adresse,
 * credentials) et produit périodiquement des rapports METRIC via le canal
 * fan-in partagé avec l'orchestrateur.
 *
 * FONCTIONNEMENT :
 * - État privé au worker, aucun accès aux stores de l'orchestrateur ; il ne
 *   reçoit que des copies (nom de règle, source du script, ip, credential).
 * - Un tick de base ; un script de multiplicateur n n'est évalué qu'un tick
 *   sur n. WAKEUP déclenche une passe complète hors cycle.
 * - L'évaluation elle-même (Lua + SNMP côté production) est un collaborateur
 *   externe derrière le trait Evaluator.
 */

use crate::credentials::Credential;
use crate::models::MetricReport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Commandes orchestrateur → worker. Rendition typée des trames texte
/// ASSETNAME / LUA / DROPLUA / IP / CREDENTIALS / WAKEUP.
#[derive(Debug, Clone)]
pub enum WorkerCommand {
    /// ASSETNAME <id> : nom rapporté comme élément des métriques
    AssetName(String),
    /// LUA <règle> <source> : installe une routine d'évaluation nommée
    InstallScript {
        rule: String,
        source: String,
        polling: u32,
    },
    /// DROPLUA : jette toutes les routines installées avant une nouvelle passe
    DropScripts,
    /// IP <adresse>
    Ip(String),
    /// CREDENTIALS <version> <communauté> ; None = marqueur "aucun credential
    /// détecté" (version 0, secret vide sur le fil)
    Credentials(Option<Credential>),
    /// WAKEUP : passe d'évaluation immédiate, hors cycle
    Wakeup,
}

/// Messages worker → orchestrateur sur le canal fan-in.
#[derive(Debug)]
pub enum WorkerEvent {
    Metric {
        asset_id: String,
        report: MetricReport,
    },
}

/// Cible de polling transmise à l'évaluateur : tout ce que le worker sait de
/// son asset au moment de la passe.
#[derive(Debug, Clone)]
pub struct PollTarget {
    pub ip: String,
    pub credential: Option<Credential>,
}

/// Une mesure produite par l'évaluation d'un script.
#[derive(Debug, Clone)]
pub struct MetricSample {
    pub metric: String,
    pub value: String,
    pub units: String,
    pub description: Option<String>,
}

/// Moteur d'évaluation embarqué — collaborateur externe. Reçoit le source du
/// script et la cible, rend les mesures. Bloquant par nature (requêtes SNMP).
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, script: &str, target: &PollTarget) -> anyhow::Result<Vec<MetricSample>>;
}

struct InstalledScript {
    rule: String,
    source: String,
    polling: u32,
}

/// État privé d'un worker.
struct WorkerState {
    asset_id: String,
    asset_name: Option<String>,
    scripts: Vec<InstalledScript>,
    ip: Option<String>,
    credential: Option<Credential>,
    evaluator: Arc<dyn Evaluator>,
    events: mpsc::UnboundedSender<WorkerEvent>,
    tick: u64,
}

impl WorkerState {
    fn apply(&mut self, command: WorkerCommand) {
        match command {
            WorkerCommand::AssetName(name) => self.asset_name = Some(name),
            WorkerCommand::InstallScript { rule, source, polling } => {
                // pas de déduplication : la même règle installée deux fois
                // tourne deux fois
                self.scripts.push(InstalledScript {
                    rule,
                    source,
                    polling: polling.max(1),
                });
            }
            WorkerCommand::DropScripts => self.scripts.clear(),
            WorkerCommand::Ip(ip) => self.ip = Some(ip),
            WorkerCommand::Credentials(credential) => self.credential = credential,
            WorkerCommand::Wakeup => self.evaluate_all(),
        }
    }

    /// Passe périodique : seuls les scripts dont le multiplicateur divise le
    /// tick courant sont évalués.
    fn poll_cycle(&mut self) {
        self.tick += 1;
        let due: Vec<usize> = self
            .scripts
            .iter()
            .enumerate()
            .filter(|(_, s)| self.tick % u64::from(s.polling) == 0)
            .map(|(i, _)| i)
            .collect();
        for index in due {
            self.evaluate_script(index);
        }
    }

    /// Passe complète, multiplicateurs ignorés (WAKEUP).
    fn evaluate_all(&mut self) {
        for index in 0..self.scripts.len() {
            self.evaluate_script(index);
        }
    }

    fn evaluate_script(&self, index: usize) {
        let script = &self.scripts[index];
        let Some(ip) = self.ip.clone() else {
            tracing::debug!(asset = %self.asset_id, rule = %script.rule, "no address yet, skipping evaluation");
            return;
        };
        let target = PollTarget {
            ip,
            credential: self.credential.clone(),
        };
        match self.evaluator.evaluate(&script.source, &target) {
            Ok(samples) => {
                let element = self.asset_name.clone().unwrap_or_else(|| self.asset_id.clone());
                for sample in samples {
                    let report = MetricReport {
                        element: element.clone(),
                        metric: sample.metric,
                        value: sample.value,
                        units: sample.units,
                        poll_frequency: script.polling,
                        description: sample.description,
                    };
                    let event = WorkerEvent::Metric {
                        asset_id: self.asset_id.clone(),
                        report,
                    };
                    if self.events.send(event).is_err() {
                        // orchestrateur parti, le worker sera aborté sous peu
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(asset = %self.asset_id, rule = %script.rule, error = %e, "evaluation failed");
            }
        }
    }
}

/// Boucle principale d'un worker. Se termine quand le canal de commandes est
/// fermé (destruction par le lifecycle manager).
pub(crate) async fn run_worker(
    asset_id: String,
    mut commands: mpsc::UnboundedReceiver<WorkerCommand>,
    events: mpsc::UnboundedSender<WorkerEvent>,
    evaluator: Arc<dyn Evaluator>,
    poll_interval: Duration,
) {
    let mut state = WorkerState {
        asset_id,
        asset_name: None,
        scripts: Vec::new(),
        ip: None,
        credential: None,
        evaluator,
        events,
        tick: 0,
    };

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // le premier tick d'un interval tokio est immédiat ; on le consomme pour
    // ne pas évaluer avant d'avoir reçu la configuration
    ticker.tick().await;

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => state.apply(command),
                None => break,
            },
            _ = ticker.tick() => state.poll_cycle(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::SnmpVersion;
    use std::sync::Mutex;

    // évaluateur minimal ; le devkit fournit la version complète pour les
    // tests d'intégration
    struct FixedEvaluator {
        samples: Vec<MetricSample>,
        calls: Mutex<Vec<PollTarget>>,
    }

    impl FixedEvaluator {
        fn new(samples: Vec<MetricSample>) -> Arc<Self> {
            Arc::new(Self { samples, calls: Mutex::new(Vec::new()) })
        }
    }

    impl Evaluator for FixedEvaluator {
        fn evaluate(&self, _script: &str, target: &PollTarget) -> anyhow::Result<Vec<MetricSample>> {
            self.calls.lock().unwrap().push(target.clone());
            Ok(self.samples.clone())
        }
    }

    fn sample() -> MetricSample {
        MetricSample {
            metric: "temperature".to_string(),
            value: "10".to_string(),
            units: "C".to_string(),
            description: None,
        }
    }

    fn spawn(
        evaluator: Arc<FixedEvaluator>,
    ) -> (
        mpsc::UnboundedSender<WorkerCommand>,
        mpsc::UnboundedReceiver<WorkerEvent>,
        tokio::task::JoinHandle<()>,
    ) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_worker(
            "mydevice".to_string(),
            commands_rx,
            events_tx,
            evaluator,
            Duration::from_secs(3600),
        ));
        (commands_tx, events_rx, task)
    }

    #[tokio::test]
    async fn test_wakeup_emits_metrics() {
        let evaluator = FixedEvaluator::new(vec![sample()]);
        let (commands, mut events, task) = spawn(evaluator.clone());

        commands.send(WorkerCommand::AssetName("mydevice".into())).unwrap();
        commands
            .send(WorkerCommand::InstallScript {
                rule: "r1".into(),
                source: "function main (host) end".into(),
                polling: 5,
            })
            .unwrap();
        commands.send(WorkerCommand::Ip("127.0.0.1".into())).unwrap();
        commands
            .send(WorkerCommand::Credentials(Some(Credential {
                version: SnmpVersion::V2c,
                community: "private".into(),
            })))
            .unwrap();
        commands.send(WorkerCommand::Wakeup).unwrap();

        let WorkerEvent::Metric { asset_id, report } = events.recv().await.unwrap();
        assert_eq!(asset_id, "mydevice");
        assert_eq!(report.element, "mydevice");
        assert_eq!(report.metric, "temperature");
        assert_eq!(report.poll_frequency, 5);

        let calls = evaluator.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].ip, "127.0.0.1");
        assert_eq!(calls[0].credential.as_ref().unwrap().community, "private");

        task.abort();
    }

    #[tokio::test]
    async fn test_no_evaluation_without_address() {
        let evaluator = FixedEvaluator::new(vec![sample()]);
        let (commands, _events, task) = spawn(evaluator.clone());

        commands
            .send(WorkerCommand::InstallScript {
                rule: "r1".into(),
                source: "".into(),
                polling: 1,
            })
            .unwrap();
        commands.send(WorkerCommand::Wakeup).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(evaluator.calls.lock().unwrap().is_empty());
        task.abort();
    }

    #[tokio::test]
    async fn test_drop_scripts_clears_everything() {
        let evaluator = FixedEvaluator::new(vec![sample()]);
        let (commands, _events, task) = spawn(evaluator.clone());

        commands.send(WorkerCommand::Ip("127.0.0.1".into())).unwrap();
        for _ in 0..2 {
            commands
                .send(WorkerCommand::InstallScript {
                    rule: "r1".into(),
                    source: "".into(),
                    polling: 1,
                })
                .unwrap();
        }
        commands.send(WorkerCommand::DropScripts).unwrap();
        commands.send(WorkerCommand::Wakeup).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(evaluator.calls.lock().unwrap().is_empty());
        task.abort();
    }

    #[tokio::test]
    async fn test_duplicate_scripts_both_run() {
        let evaluator = FixedEvaluator::new(vec![sample()]);
        let (commands, mut events, task) = spawn(evaluator.clone());

        commands.send(WorkerCommand::Ip("127.0.0.1".into())).unwrap();
        for _ in 0..2 {
            commands
                .send(WorkerCommand::InstallScript {
                    rule: "r1".into(),
                    source: "".into(),
                    polling: 1,
                })
                .unwrap();
        }
        commands.send(WorkerCommand::Wakeup).unwrap();

        assert!(events.recv().await.is_some());
        assert!(events.recv().await.is_some());
        assert_eq!(evaluator.calls.lock().unwrap().len(), 2);
        task.abort();
    }

    #[tokio::test]
    async fn test_closing_commands_ends_worker() {
        let evaluator = FixedEvaluator::new(vec![]);
        let (commands, _events, task) = spawn(evaluator);
        drop(commands);
        task.await.unwrap();
    }

    // laisse tourner le worker sans faire avancer l'horloge
    async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_multiplier_gates_ticks() {
        let evaluator = FixedEvaluator::new(vec![sample()]);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_worker(
            "mydevice".to_string(),
            commands_rx,
            events_tx,
            evaluator.clone(),
            Duration::from_secs(60),
        ));

        commands_tx.send(WorkerCommand::Ip("127.0.0.1".into())).unwrap();
        commands_tx
            .send(WorkerCommand::InstallScript {
                rule: "every-tick".into(),
                source: "".into(),
                polling: 1,
            })
            .unwrap();
        commands_tx
            .send(WorkerCommand::InstallScript {
                rule: "every-other-tick".into(),
                source: "".into(),
                polling: 2,
            })
            .unwrap();
        // configuration appliquée et tick immédiat consommé avant d'avancer
        settle().await;
        assert_eq!(evaluator.calls.lock().unwrap().len(), 0);

        // tick 1 : seul le multiplicateur 1 est dû
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(evaluator.calls.lock().unwrap().len(), 1);

        // tick 2 : les deux scripts
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(evaluator.calls.lock().unwrap().len(), 3);

        // tick 3 : multiplicateur 1 seulement
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(evaluator.calls.lock().unwrap().len(), 4);

        // tick 4 : les deux à nouveau
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(evaluator.calls.lock().unwrap().len(), 6);

        task.abort();
    }
}
