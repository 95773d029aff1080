/*!
Mock du bus pour développement sans broker

Permet de tester l'orchestrateur sans démarrer un broker MQTT réel.
Enregistre tous les messages publiés et permet de simuler la réception
d'événements de découverte.
*/

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use vigil_orchestrator::bus::{BusClient, BusError, BusEvent};
use vigil_orchestrator::models::DiscoveryEvent;

#[derive(Debug, Clone)]
pub struct MockPublish {
    pub topic: String,
    pub payload: Vec<u8>,
}

struct MockBusInner {
    published: Mutex<Vec<MockPublish>>,
    connections: Mutex<Vec<(String, String)>>,
    producer_stream: Mutex<Option<String>>,
    consumers: Mutex<Vec<(String, String)>>,
    // garde l'émetteur vivant pour que recv() attende au lieu de rendre None
    incoming_tx: mpsc::UnboundedSender<DiscoveryEvent>,
}

/// Mock du BusClient. Clonable : garder un clone dans le test pour injecter
/// des événements et inspecter les publications pendant que l'orchestrateur
/// possède l'original.
#[derive(Clone)]
pub struct MockBus {
    inner: Arc<MockBusInner>,
    incoming_rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<DiscoveryEvent>>>,
}

impl MockBus {
    pub fn new() -> Self {
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(MockBusInner {
                published: Mutex::new(Vec::new()),
                connections: Mutex::new(Vec::new()),
                producer_stream: Mutex::new(None),
                consumers: Mutex::new(Vec::new()),
                incoming_tx,
            }),
            incoming_rx: Arc::new(tokio::sync::Mutex::new(incoming_rx)),
        }
    }

    /// Simule l'arrivée d'un événement de découverte sur le stream devices.
    pub fn push_device_event(&self, event: DiscoveryEvent) {
        let _ = self.inner.incoming_tx.send(event);
    }

    /// Tous les messages publiés (pour assertions de tests).
    pub fn published(&self) -> Vec<MockPublish> {
        self.inner.published.lock().clone()
    }

    /// Les connexions demandées, couples (endpoint, identité).
    pub fn connections(&self) -> Vec<(String, String)> {
        self.inner.connections.lock().clone()
    }

    /// Les abonnements demandés, couples (stream, pattern).
    pub fn consumers(&self) -> Vec<(String, String)> {
        self.inner.consumers.lock().clone()
    }

    /// Messages publiés sur un topic donné.
    pub fn find_by_topic(&self, topic: &str) -> Vec<MockPublish> {
        self.inner
            .published
            .lock()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    /// Parse le dernier message d'un topic en JSON.
    pub fn last_json<T>(&self, topic: &str) -> Option<T>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        let messages = self.find_by_topic(topic);
        let last = messages.last()?;
        serde_json::from_slice(&last.payload).ok()
    }

    /// Attend qu'au moins `count` messages soient publiés sur un topic.
    pub async fn wait_for_topic(&self, topic: &str, count: usize, timeout_ms: u64) -> Vec<MockPublish> {
        let start = std::time::Instant::now();
        while start.elapsed() < Duration::from_millis(timeout_ms) {
            let messages = self.find_by_topic(topic);
            if messages.len() >= count {
                return messages;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.find_by_topic(topic)
    }

    /// Attend que le nombre total de publications atteigne `count`.
    pub async fn wait_for_published(&self, count: usize, timeout_ms: u64) -> Vec<MockPublish> {
        let start = std::time::Instant::now();
        while start.elapsed() < Duration::from_millis(timeout_ms) {
            let messages = self.published();
            if messages.len() >= count {
                return messages;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.published()
    }

    /// Reset des messages enregistrés.
    pub fn clear(&self) {
        self.inner.published.lock().clear();
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BusClient for MockBus {
    async fn connect(&mut self, endpoint: &str, identity: &str) -> Result<(), BusError> {
        self.inner
            .connections
            .lock()
            .push((endpoint.to_string(), identity.to_string()));
        Ok(())
    }

    async fn set_producer(&mut self, stream: &str) -> Result<(), BusError> {
        *self.inner.producer_stream.lock() = Some(stream.to_string());
        Ok(())
    }

    async fn set_consumer(&mut self, stream: &str, pattern: &str) -> Result<(), BusError> {
        self.inner
            .consumers
            .lock()
            .push((stream.to_string(), pattern.to_string()));
        Ok(())
    }

    async fn recv(&mut self) -> Option<BusEvent> {
        // l'émetteur interne reste vivant : recv attend tant que le test
        // n'injecte rien, sans jamais clôturer la source
        let mut rx = self.incoming_rx.lock().await;
        rx.recv().await.map(BusEvent::Device)
    }

    async fn publish(&mut self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        let Some(stream) = self.inner.producer_stream.lock().clone() else {
            return Err(BusError::NoProducer);
        };
        let topic = format!("{stream}/{subject}");
        self.inner.published.lock().push(MockPublish { topic, payload });
        Ok(())
    }
}
