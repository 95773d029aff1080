/**
 * WORKER LIFECYCLE MANAGER - Cycle de vie des workers par asset
 *
 * RÔLE : Propriétaire exclusif de la map asset_id → WorkerHandle. Crée un
 * worker quand une première règle matche un asset adressable, le détruit
 * quand plus aucune règle ne matche. Invariant : au plus un worker vivant
 * par asset_id.
 *
 * FONCTIONNEMENT : Chaque worker est une task tokio avec son canal de
 * commandes dédié. Tous les workers partagent un clone de l'émetteur du canal
 * fan-in d'événements ; l'orchestrateur n'a donc qu'une seule source à
 * surveiller quel que soit le nombre de workers, et la destruction d'un
 * worker ne demande aucune reconstruction de poller.
 */

use crate::worker::{run_worker, Evaluator, WorkerCommand, WorkerEvent};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Poignée vers le worker d'un asset. Possédée uniquement par le WorkerSet.
pub struct WorkerHandle {
    pub asset_id: String,
    /// ID d'instance pour les logs (un nouvel uuid à chaque déploiement)
    pub instance_id: String,
    commands: mpsc::UnboundedSender<WorkerCommand>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    fn send(&self, command: WorkerCommand) {
        if self.commands.send(command).is_err() {
            tracing::warn!(asset = %self.asset_id, instance = %self.instance_id, "worker channel closed");
        }
    }

    /// Libère le canal et arrête la task, de façon synchrone pour l'appelant.
    fn shutdown(self) {
        drop(self.commands);
        self.task.abort();
    }
}

/// Map supervisée des workers vivants.
pub struct WorkerSet {
    workers: HashMap<String, WorkerHandle>,
    events: mpsc::UnboundedSender<WorkerEvent>,
    evaluator: Arc<dyn Evaluator>,
    poll_interval: Duration,
}

impl WorkerSet {
    pub fn new(
        events: mpsc::UnboundedSender<WorkerEvent>,
        evaluator: Arc<dyn Evaluator>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            workers: HashMap::new(),
            events,
            evaluator,
            poll_interval,
        }
    }

    pub fn contains(&self, asset_id: &str) -> bool {
        self.workers.contains_key(asset_id)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Déploie un worker pour cet asset et lui envoie son nom. Ne fait rien
    /// si un worker existe déjà (au plus un par asset_id).
    pub fn spawn(&mut self, asset_id: &str) {
        if self.workers.contains_key(asset_id) {
            return;
        }
        let instance_id = Uuid::new_v4().to_string();
        tracing::debug!(asset = %asset_id, instance = %instance_id, "deploying worker");

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_worker(
            asset_id.to_string(),
            commands_rx,
            self.events.clone(),
            self.evaluator.clone(),
            self.poll_interval,
        ));
        let handle = WorkerHandle {
            asset_id: asset_id.to_string(),
            instance_id,
            commands: commands_tx,
            task,
        };
        handle.send(WorkerCommand::AssetName(asset_id.to_string()));
        self.workers.insert(asset_id.to_string(), handle);
    }

    /// Envoie une commande au worker de cet asset, s'il existe.
    pub fn send(&self, asset_id: &str, command: WorkerCommand) {
        if let Some(handle) = self.workers.get(asset_id) {
            handle.send(command);
        }
    }

    /// Détruit le worker de cet asset : canal fermé et task arrêtée avant de
    /// rendre la main, pas de teardown différé.
    pub fn remove(&mut self, asset_id: &str) {
        if let Some(handle) = self.workers.remove(asset_id) {
            tracing::debug!(asset = %asset_id, instance = %handle.instance_id, "destroying worker");
            handle.shutdown();
        }
    }

    /// WAKEUP vers tous les workers vivants.
    pub fn broadcast_wakeup(&self) {
        for handle in self.workers.values() {
            handle.send(WorkerCommand::Wakeup);
        }
    }
}

impl Drop for WorkerSet {
    fn drop(&mut self) {
        for (_, handle) in self.workers.drain() {
            handle.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::{MetricSample, PollTarget};

    struct NullEvaluator;

    impl Evaluator for NullEvaluator {
        fn evaluate(&self, _script: &str, _target: &PollTarget) -> anyhow::Result<Vec<MetricSample>> {
            Ok(vec![])
        }
    }

    fn set() -> (WorkerSet, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            WorkerSet::new(events_tx, Arc::new(NullEvaluator), Duration::from_secs(3600)),
            events_rx,
        )
    }

    #[tokio::test]
    async fn test_at_most_one_worker_per_asset() {
        let (mut workers, _events) = set();
        workers.spawn("mydevice");
        let first_instance = workers.workers.get("mydevice").unwrap().instance_id.clone();
        workers.spawn("mydevice");
        assert_eq!(workers.len(), 1);
        assert_eq!(workers.workers.get("mydevice").unwrap().instance_id, first_instance);
    }

    #[tokio::test]
    async fn test_remove_is_synchronous() {
        let (mut workers, _events) = set();
        workers.spawn("mydevice");
        assert!(workers.contains("mydevice"));
        workers.remove("mydevice");
        assert!(!workers.contains("mydevice"));
        assert!(workers.is_empty());
        // destruction d'un asset inconnu : no-op
        workers.remove("ghost");
    }

    #[tokio::test]
    async fn test_spawn_after_remove_is_new_instance() {
        let (mut workers, _events) = set();
        workers.spawn("mydevice");
        let first = workers.workers.get("mydevice").unwrap().instance_id.clone();
        workers.remove("mydevice");
        workers.spawn("mydevice");
        assert_ne!(workers.workers.get("mydevice").unwrap().instance_id, first);
    }
}
