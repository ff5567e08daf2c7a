//! Publish/subscribe transport: NATS client, in-process bus, wire messages

pub mod memory;
pub mod messages;
pub mod nats;
pub mod stt;

pub use memory::MemoryBus;
pub use messages::{ActionMessage, SpeechMessage, TranscriptMessage, UtteranceMessage};
pub use nats::NatsBus;
pub use stt::{BusDecoder, BusSpeaker};

use anyhow::Result;
use tokio::sync::mpsc;

/// A message delivered from the bus
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Pub/sub broker contract consumed by the core
#[async_trait::async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    /// Subscribe to a topic; inbound messages arrive on the returned channel
    async fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<BusMessage>>;
}
