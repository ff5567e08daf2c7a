use anyhow::{Context, Result};
use async_nats::Client;
use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{BusMessage, MessageBus};
use crate::config::BusConfig;

/// NATS-backed message bus
///
/// Connection is retried with backoff up to the configured attempt budget;
/// once established, the client reconnects automatically across transient
/// broker drops.
pub struct NatsBus {
    client: Client,
}

impl NatsBus {
    /// Connect to the broker, retrying with backoff
    pub async fn connect(cfg: &BusConfig) -> Result<Self> {
        let mut last_err = None;

        for attempt in 1..=cfg.connect_attempts {
            info!(
                "Connecting to NATS at {} (attempt {}/{})",
                cfg.url, attempt, cfg.connect_attempts
            );

            match async_nats::connect(&cfg.url).await {
                Ok(client) => {
                    info!("Connected to NATS successfully");
                    return Ok(Self { client });
                }
                Err(e) => {
                    warn!("NATS connection attempt {} failed: {}", attempt, e);
                    last_err = Some(e);
                    if attempt < cfg.connect_attempts {
                        tokio::time::sleep(std::time::Duration::from_millis(
                            cfg.backoff_ms * attempt as u64,
                        ))
                        .await;
                    }
                }
            }
        }

        Err(last_err
            .map(anyhow::Error::from)
            .unwrap_or_else(|| anyhow::anyhow!("no connection attempts configured"))
            .context(format!(
                "failed to connect to NATS at {} after {} attempts",
                cfg.url, cfg.connect_attempts
            )))
    }

    /// Underlying client, for request/reply collaborators
    pub fn client(&self) -> Client {
        self.client.clone()
    }
}

#[async_trait::async_trait]
impl MessageBus for NatsBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.client
            .publish(topic.to_string(), payload.into())
            .await
            .with_context(|| format!("failed to publish to {}", topic))?;
        debug!("Published message to {}", topic);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<BusMessage>> {
        let mut subscriber = self
            .client
            .subscribe(topic.to_string())
            .await
            .with_context(|| format!("failed to subscribe to {}", topic))?;

        info!("Subscribed to {}", topic);

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                let message = BusMessage {
                    topic: msg.subject.to_string(),
                    payload: msg.payload.to_vec(),
                };
                if tx.send(message).await.is_err() {
                    break; // receiver dropped, stop forwarding
                }
            }
        });

        Ok(rx)
    }
}
