/**
 * ORCHESTRATOR - Boucle de contrôle centrale
 *
 * RÔLE : Propriétaire unique de tout l'état partagé (règles, credentials,
 * workers, base de TTL). Multiplexe trois sources d'événements — canal de
 * contrôle, bus, canal fan-in des workers — et les traite une à la fois.
 *
 * FONCTIONNEMENT : Coopératif mono-thread : toute mutation d'état se fait
 * dans une itération de boucle, aucun verrou nécessaire. Le seul point de
 * suspension est le select ; le matching, la détection de credentials et le
 * dispatch s'exécutent d'une traite. Les workers ne reçoivent que des copies
 * de fragments d'état, jamais de référence vive.
 */

use crate::bus::{BusClient, BusEvent};
use crate::control::{control_channel, ControlCommand, ControlHandle};
use crate::credentials::CredentialStore;
use crate::detect::{detect_credentials, CredentialProbe};
use crate::lifecycle::WorkerSet;
use crate::matcher::rule_matches;
use crate::models::{DiscoveryEvent, MetricOut, MetricReport};
use crate::rules::RuleStore;
use crate::worker::{Evaluator, WorkerCommand, WorkerEvent};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::mpsc;

/// Base de TTL par défaut, en secondes.
pub const DEFAULT_TTL_BASE: u32 = 60;

pub struct Orchestrator {
    bus: Box<dyn BusClient>,
    probe: Arc<dyn CredentialProbe>,
    rules: RuleStore,
    credentials: CredentialStore,
    workers: WorkerSet,
    control: mpsc::UnboundedReceiver<Vec<String>>,
    worker_events: mpsc::UnboundedReceiver<WorkerEvent>,
    /// Base de TTL, mutable à chaud via la commande TTL ; lue au moment du
    /// relais d'une métrique, jamais snapshotée à la création d'un worker.
    ttl_base: u32,
}

impl Orchestrator {
    pub fn new(
        bus: Box<dyn BusClient>,
        probe: Arc<dyn CredentialProbe>,
        evaluator: Arc<dyn Evaluator>,
        poll_interval: Duration,
    ) -> (Self, ControlHandle) {
        let (handle, control) = control_channel();
        let (events_tx, worker_events) = mpsc::unbounded_channel();
        let workers = WorkerSet::new(events_tx, evaluator, poll_interval);
        let orchestrator = Self {
            bus,
            probe,
            rules: RuleStore::new(),
            credentials: CredentialStore::new(),
            workers,
            control,
            worker_events,
            ttl_base: DEFAULT_TTL_BASE,
        };
        (orchestrator, handle)
    }

    /// Boucle principale. Tourne jusqu'à $TERM, abandon de toutes les
    /// poignées de contrôle, ou perte définitive du bus. Pas de phase de
    /// drain : les messages en vol sont abandonnés.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                frames = self.control.recv() => {
                    let Some(frames) = frames else {
                        tracing::debug!("all control handles dropped, stopping");
                        break;
                    };
                    match ControlCommand::decode(&frames) {
                        Some(ControlCommand::Terminate) => break,
                        Some(command) => self.handle_control(command).await,
                        None => tracing::debug!(?frames, "unrecognized control command ignored"),
                    }
                }
                event = self.bus.recv() => {
                    match event {
                        Some(BusEvent::Device(event)) => self.handle_device_event(event),
                        None => {
                            tracing::warn!("bus connection lost, stopping");
                            break;
                        }
                    }
                }
                Some(event) = self.worker_events.recv() => {
                    self.handle_worker_event(event).await;
                }
            }
        }
    }

    async fn handle_control(&mut self, command: ControlCommand) {
        tracing::debug!(?command, "control command");
        match command {
            ControlCommand::Bind { endpoint, identity } => {
                if let Err(e) = self.bus.connect(&endpoint, &identity).await {
                    tracing::error!(endpoint, error = %e, "bus connect failed");
                }
            }
            ControlCommand::Producer { stream } => {
                if let Err(e) = self.bus.set_producer(&stream).await {
                    tracing::error!(stream, error = %e, "set producer failed");
                }
            }
            ControlCommand::Consumer { stream, pattern } => {
                if let Err(e) = self.bus.set_consumer(&stream, &pattern).await {
                    tracing::error!(stream, error = %e, "set consumer failed");
                }
            }
            ControlCommand::LoadRules { dir } => self.rules.load_directory(&dir).await,
            ControlCommand::LoadCredentials { file } => self.credentials.load_file(&file).await,
            ControlCommand::Ttl { base } => self.ttl_base = base,
            ControlCommand::Rule { document } => self.rules.parse_and_add(&document),
            ControlCommand::Wakeup => self.workers.broadcast_wakeup(),
            ControlCommand::Terminate => unreachable!("handled by the main loop"),
        }
    }

    /// Traite un événement de découverte : passe de règles, cycle de vie du
    /// worker, adresse et credentials.
    fn handle_device_event(&mut self, event: DiscoveryEvent) {
        let asset_id = event.asset_id.clone();
        let existing = self.workers.contains(&asset_id);
        if existing {
            // une nouvelle passe va réinstaller uniquement les règles qui
            // matchent encore : purge d'abord
            self.workers.send(&asset_id, WorkerCommand::DropScripts);
        }

        // sans adresse on ne touche plus à rien ce tour-ci, même si un worker
        // existe — il reste sans scripts jusqu'au prochain événement valide
        let Some(ip) = event.address().map(str::to_string) else {
            tracing::debug!(asset = %asset_id, "discovery event without ip.1, skipped");
            return;
        };

        let mut matched = false;
        for rule in self.rules.all() {
            if !rule_matches(rule, &event) {
                continue;
            }
            matched = true;
            if !self.workers.contains(&asset_id) {
                self.workers.spawn(&asset_id);
            }
            tracing::debug!(rule = %rule.name, asset = %asset_id, "sending evaluation script to worker");
            self.workers.send(
                &asset_id,
                WorkerCommand::InstallScript {
                    rule: rule.name.clone(),
                    source: rule.evaluation.clone(),
                    polling: rule.polling,
                },
            );
        }

        if !matched {
            tracing::debug!(asset = %asset_id, "no rule for this asset");
            if existing {
                self.workers.remove(&asset_id);
            }
            return;
        }

        self.workers.send(&asset_id, WorkerCommand::Ip(ip.clone()));

        // détection synchrone : bloque la boucle le temps de la tournée de
        // sondes, compromis assumé du design
        let detected = detect_credentials(&self.credentials, self.probe.as_ref(), &ip);
        if detected.is_none() {
            tracing::error!(asset = %asset_id, ip = %ip, "cannot detect credentials");
        }
        self.workers.send(&asset_id, WorkerCommand::Credentials(detected));
    }

    /// Relaie un rapport METRIC sur le bus avec le TTL calculé.
    async fn handle_worker_event(&mut self, event: WorkerEvent) {
        let WorkerEvent::Metric { asset_id, report } = event;
        if !self.workers.contains(&asset_id) {
            // message résiduel d'un worker détruit entre-temps
            tracing::debug!(asset = %asset_id, "dropping metric from removed worker");
            return;
        }
        self.publish_metric(report).await;
    }

    async fn publish_metric(&mut self, report: MetricReport) {
        let metric = MetricOut {
            element: report.element,
            ts: OffsetDateTime::now_utc().unix_timestamp(),
            ttl: self.ttl_base.saturating_mul(report.poll_frequency),
            metric: report.metric,
            value: report.value,
            units: report.units,
            description: report.description,
        };
        let subject = metric.subject();
        let payload = match serde_json::to_vec(&metric) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(subject, error = %e, "cannot encode metric");
                return;
            }
        };
        if let Err(e) = self.bus.publish(&subject, payload).await {
            tracing::error!(subject, error = %e, "metric publish failed");
        }
    }
}
