use anyhow::Result;
use std::collections::HashMap;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use super::{BusMessage, MessageBus};

/// In-process message bus for tests and broker-less development
///
/// Supports exact subjects and the NATS trailing `>` wildcard.
pub struct MemoryBus {
    subscribers: Mutex<HashMap<String, Vec<mpsc::Sender<BusMessage>>>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MessageBus for MemoryBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let mut subscribers = self.subscribers.lock().await;

        for (pattern, senders) in subscribers.iter_mut() {
            if !topic_matches(pattern, topic) {
                continue;
            }
            // Drop subscribers whose receivers are gone; a full buffer only
            // loses the message, never the subscription
            senders.retain(|tx| {
                match tx.try_send(BusMessage {
                    topic: topic.to_string(),
                    payload: payload.clone(),
                }) {
                    Ok(()) => true,
                    Err(TrySendError::Full(_)) => true,
                    Err(TrySendError::Closed(_)) => false,
                }
            });
        }

        debug!("Published message to {} (in-process)", topic);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<BusMessage>> {
        let (tx, rx) = mpsc::channel(64);
        self.subscribers
            .lock()
            .await
            .entry(topic.to_string())
            .or_default()
            .push(tx);
        Ok(rx)
    }
}

/// Match a subject against a subscription pattern with a trailing `>` token
fn topic_matches(pattern: &str, topic: &str) -> bool {
    if pattern == topic {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix('>') {
        return topic.starts_with(prefix);
    }
    false
}
