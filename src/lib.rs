pub mod audio;
pub mod bus;
pub mod config;
pub mod dispatch;
pub mod http;
pub mod pipeline;
pub mod plugins;
pub mod router;
pub mod wake;

pub use audio::{
    AudioFrame, CompletionReason, EnergyVad, FrameSource, ScriptedSource, Segmenter,
    SegmenterConfig, SpeechDetector, Utterance,
};
pub use bus::{BusMessage, MemoryBus, MessageBus, NatsBus};
pub use config::Config;
pub use dispatch::{ActionDispatcher, ActionHandler};
pub use http::{create_router, AppState};
pub use pipeline::{AssistantPipeline, Decoder, Speaker, Transcript};
pub use plugins::{PluginRegistration, PluginRegistry, Registrar};
pub use router::{
    Embedder, HashEmbedder, IndexedEntry, IntentRouter, MemoryIndex, RoutingResult, VectorIndex,
};
pub use wake::{PhraseTable, WakeMatch};
