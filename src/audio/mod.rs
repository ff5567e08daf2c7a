//! Audio capture and utterance segmentation

pub mod frame;
#[cfg(feature = "audio-io")]
pub mod mic;
pub mod segmenter;
pub mod vad;

pub use frame::{AudioFrame, FrameSource, ScriptedSource};
#[cfg(feature = "audio-io")]
pub use mic::MicSource;
pub use segmenter::{CompletionReason, Segmenter, SegmenterConfig, Utterance};
pub use vad::{EnergyVad, SpeechDetector};
#[cfg(feature = "vad-silero")]
pub use vad::SileroVad;
