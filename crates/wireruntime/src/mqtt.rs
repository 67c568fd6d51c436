use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use wirecore::TransportError;

/// An inbound broker message handed to a subscription.
#[derive(Debug, Clone)]
pub struct MqttPublish {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Broker seam the deploy manager and mqtt-out node talk through. One
/// subscription per topic; `subscription_count` backs the no-leaked-listeners
/// assertions.
#[async_trait]
pub trait MqttTransport: Send + Sync {
    async fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<MqttPublish>, TransportError>;

    async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError>;

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    fn subscription_count(&self) -> usize;
}

const CHANNEL_CAPACITY: usize = 64;

/// rumqttc-backed transport. The event loop runs in a background task and
/// routes inbound publishes to the per-topic channel.
pub struct RumqttcTransport {
    client: AsyncClient,
    routes: Arc<Mutex<HashMap<String, mpsc::Sender<MqttPublish>>>>,
}

impl RumqttcTransport {
    pub fn connect(client_id: &str, host: &str, port: u16) -> Self {
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(30));
        let (client, mut event_loop) = AsyncClient::new(options, CHANNEL_CAPACITY);

        let routes: Arc<Mutex<HashMap<String, mpsc::Sender<MqttPublish>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let loop_routes = routes.clone();
        tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let sender = loop_routes
                            .lock()
                            .expect("mqtt routes poisoned")
                            .get(&publish.topic)
                            .cloned();
                        if let Some(sender) = sender {
                            let _ = sender
                                .send(MqttPublish {
                                    topic: publish.topic.clone(),
                                    payload: publish.payload.to_vec(),
                                })
                                .await;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("mqtt event loop error: {}, retrying", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Self { client, routes }
    }
}

#[async_trait]
impl MqttTransport for RumqttcTransport {
    async fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<MqttPublish>, TransportError> {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        self.client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| TransportError::MqttSubscribe {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;
        self.routes
            .lock()
            .expect("mqtt routes poisoned")
            .insert(topic.to_string(), sender);
        Ok(receiver)
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.routes
            .lock()
            .expect("mqtt routes poisoned")
            .remove(topic);
        self.client
            .unsubscribe(topic)
            .await
            .map_err(|e| TransportError::MqttSubscribe {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| TransportError::MqttPublish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    fn subscription_count(&self) -> usize {
        self.routes.lock().expect("mqtt routes poisoned").len()
    }
}

/// Loopback transport for tests and broker-less operation: publishes are
/// recorded and delivered to an exact-match local subscription if one exists.
pub struct InMemoryTransport {
    subscriptions: Mutex<HashMap<String, mpsc::Sender<MqttPublish>>>,
    published: Mutex<Vec<MqttPublish>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(HashMap::new()),
            published: Mutex::new(Vec::new()),
        }
    }

    /// Everything published so far, in publish order.
    pub fn published(&self) -> Vec<MqttPublish> {
        self.published.lock().expect("publish log poisoned").clone()
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MqttTransport for InMemoryTransport {
    async fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<MqttPublish>, TransportError> {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        self.subscriptions
            .lock()
            .expect("subscriptions poisoned")
            .insert(topic.to_string(), sender);
        Ok(receiver)
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.subscriptions
            .lock()
            .expect("subscriptions poisoned")
            .remove(topic);
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let publish = MqttPublish {
            topic: topic.to_string(),
            payload,
        };
        self.published
            .lock()
            .expect("publish log poisoned")
            .push(publish.clone());

        let sender = self
            .subscriptions
            .lock()
            .expect("subscriptions poisoned")
            .get(topic)
            .cloned();
        if let Some(sender) = sender {
            sender
                .send(publish)
                .await
                .map_err(|e| TransportError::MqttPublish {
                    topic: topic.to_string(),
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }

    fn subscription_count(&self) -> usize {
        self.subscriptions.lock().expect("subscriptions poisoned").len()
    }
}
