/**
 * BUS CLIENT - Connexion publish/subscribe au bus de télémétrie
 *
 * RÔLE : Abstraire le bus pour l'orchestrateur : "recevoir le prochain
 * événement entrant" et "publier un événement sur un sujet". L'implémentation
 * de production parle MQTT via rumqttc ; le devkit fournit un bus mock pour
 * les tests.
 *
 * FONCTIONNEMENT : Les streams sont des préfixes de topic. CONSUMER
 * (stream, pattern) s'abonne à "<stream>/<pattern>" ; PRODUCER mémorise le
 * préfixe sous lequel les métriques sortantes sont publiées, le sujet final
 * étant "<stream>/<type>@<element>". Seuls les publishes du stream devices
 * portant kind == "device" sont décodés en événements de découverte, le
 * reste est ignoré.
 */

use crate::models::DiscoveryEvent;
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use std::time::Duration;

/// Genre de message attendu sur le stream devices.
const DEVICE_KIND: &str = "device";

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("bus not connected")]
    NotConnected,
    #[error("no producer stream registered")]
    NoProducer,
    #[error("invalid endpoint: {0}")]
    Endpoint(String),
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Événement entrant décodé depuis le bus.
#[derive(Debug)]
pub enum BusEvent {
    Device(DiscoveryEvent),
}

/// Collaborateur bus vu de l'orchestrateur.
#[async_trait]
pub trait BusClient: Send {
    /// BIND : connecte le client au bus sous une identité.
    async fn connect(&mut self, endpoint: &str, identity: &str) -> Result<(), BusError>;
    /// PRODUCER : enregistre le stream de publication des métriques.
    async fn set_producer(&mut self, stream: &str) -> Result<(), BusError>;
    /// CONSUMER : s'abonne à un stream selon un pattern.
    async fn set_consumer(&mut self, stream: &str, pattern: &str) -> Result<(), BusError>;
    /// Prochain événement entrant décodé. Ne résout jamais avant connexion ;
    /// `None` signifie que la connexion est définitivement perdue.
    async fn recv(&mut self) -> Option<BusEvent>;
    /// Publie un payload sous "<stream producteur>/<subject>".
    async fn publish(&mut self, subject: &str, payload: Vec<u8>) -> Result<(), BusError>;
}

/// Décode un payload du stream devices. None si ce n'est pas un événement de
/// découverte reconnu (kind absent ou différent, JSON invalide).
pub fn decode_device_event(payload: &[u8]) -> Option<DiscoveryEvent> {
    let value: serde_json::Value = serde_json::from_slice(payload).ok()?;
    if value.get("kind").and_then(|k| k.as_str()) != Some(DEVICE_KIND) {
        return None;
    }
    serde_json::from_value(value).ok()
}

/// Implémentation de production sur MQTT.
pub struct MqttBus {
    connection: Option<(AsyncClient, EventLoop)>,
    device_stream: Option<String>,
    metric_stream: Option<String>,
}

impl MqttBus {
    pub fn new() -> Self {
        Self {
            connection: None,
            device_stream: None,
            metric_stream: None,
        }
    }

    fn parse_endpoint(endpoint: &str) -> Result<(String, u16), BusError> {
        match endpoint.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .map_err(|_| BusError::Endpoint(endpoint.to_string()))?;
                Ok((host.to_string(), port))
            }
            None => Ok((endpoint.to_string(), 1883)),
        }
    }
}

impl Default for MqttBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BusClient for MqttBus {
    async fn connect(&mut self, endpoint: &str, identity: &str) -> Result<(), BusError> {
        let (host, port) = Self::parse_endpoint(endpoint)?;
        let mut options = MqttOptions::new(identity, host, port);
        options.set_keep_alive(Duration::from_secs(15));
        let (client, eventloop) = AsyncClient::new(options, 10);
        self.connection = Some((client, eventloop));
        tracing::debug!(endpoint, identity, "bus client connected");
        Ok(())
    }

    async fn set_producer(&mut self, stream: &str) -> Result<(), BusError> {
        if self.connection.is_none() {
            return Err(BusError::NotConnected);
        }
        self.metric_stream = Some(stream.to_string());
        Ok(())
    }

    async fn set_consumer(&mut self, stream: &str, pattern: &str) -> Result<(), BusError> {
        let Some((client, _)) = &self.connection else {
            return Err(BusError::NotConnected);
        };
        let filter = format!("{stream}/{pattern}");
        client.subscribe(&filter, QoS::AtLeastOnce).await?;
        self.device_stream = Some(stream.to_string());
        tracing::debug!(filter, "subscribed to device stream");
        Ok(())
    }

    async fn recv(&mut self) -> Option<BusEvent> {
        let Some((_, eventloop)) = &mut self.connection else {
            // pas encore de connexion : cette source n'est jamais prête
            return std::future::pending().await;
        };
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(publish))) => {
                    let on_device_stream = self
                        .device_stream
                        .as_deref()
                        .map(|stream| publish.topic.starts_with(stream))
                        .unwrap_or(false);
                    if !on_device_stream {
                        continue;
                    }
                    match decode_device_event(&publish.payload) {
                        Some(event) => return Some(BusEvent::Device(event)),
                        None => {
                            tracing::debug!(topic = %publish.topic, "ignoring non-device message");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "MQTT connection error, retrying");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    }

    async fn publish(&mut self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        let Some((client, _)) = &self.connection else {
            return Err(BusError::NotConnected);
        };
        let Some(stream) = &self.metric_stream else {
            return Err(BusError::NoProducer);
        };
        let topic = format!("{stream}/{subject}");
        client.publish(&topic, QoS::AtLeastOnce, false, payload).await?;
        Ok(())
    }
}
