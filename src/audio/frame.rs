use anyhow::Result;
use tokio::sync::mpsc;

/// Fixed-size block of PCM samples produced by a capture device
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, mono)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Frame duration in milliseconds, derived from the sample count
    pub fn duration_ms(&self) -> u64 {
        (self.samples.len() as u64 * 1000) / self.sample_rate as u64
    }
}

/// Source of audio frames
///
/// Implementations:
/// - cpal microphone capture (`MicSource`, behind the `audio-io` feature)
/// - scripted frame sequences for tests (`ScriptedSource`)
#[async_trait::async_trait]
pub trait FrameSource: Send + Sync {
    /// Acquire the device and start producing frames
    ///
    /// The source owns the input device exclusively until `stop` is called.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Release the device and stop producing frames
    async fn stop(&mut self) -> Result<()>;

    /// Source name for logging
    fn name(&self) -> &str;
}

/// Frame source that replays a fixed sequence of frames, then closes
///
/// Used by tests and offline runs; frames are delivered as fast as the
/// consumer drains them.
pub struct ScriptedSource {
    frames: Vec<AudioFrame>,
}

impl ScriptedSource {
    pub fn new(frames: Vec<AudioFrame>) -> Self {
        Self { frames }
    }
}

#[async_trait::async_trait]
impl FrameSource for ScriptedSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        let (tx, rx) = mpsc::channel(32);
        let frames = std::mem::take(&mut self.frames);

        tokio::spawn(async move {
            for frame in frames {
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
