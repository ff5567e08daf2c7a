use anyhow::Result;

/// Per-frame speech/non-speech classification
///
/// The segmenter treats this as an external collaborator. `SileroVad` is the
/// default production detector; `EnergyVad` is a deterministic stand-in for
/// scripted frame sequences.
pub trait SpeechDetector: Send + Sync {
    /// Classify one frame of mono i16 samples
    fn is_speech(&mut self, samples: &[i16]) -> Result<bool>;

    /// Reset detector state between utterances
    fn reset(&mut self) {}
}

/// Model-based detector backed by Silero VAD
///
/// Frames should match the model's chunk size (512 samples at 16kHz, 256 at
/// 8kHz); shorter frames are zero-padded by the model runner.
#[cfg(feature = "vad-silero")]
pub struct SileroVad {
    detector: voice_activity_detector::VoiceActivityDetector,
    threshold: f32,
}

#[cfg(feature = "vad-silero")]
impl SileroVad {
    /// Build a detector for the given sample rate and speech-probability
    /// threshold
    pub fn new(sample_rate: u32, threshold: f32) -> Result<Self> {
        if ![8000, 16000].contains(&sample_rate) {
            anyhow::bail!(
                "silero vad supports 8000 or 16000 Hz, got {}",
                sample_rate
            );
        }

        let chunk_size: usize = if sample_rate == 8000 { 256 } else { 512 };

        let detector = voice_activity_detector::VoiceActivityDetector::builder()
            .sample_rate(sample_rate as i32)
            .chunk_size(chunk_size)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to initialize silero vad: {:?}", e))?;

        Ok(Self {
            detector,
            threshold,
        })
    }
}

#[cfg(feature = "vad-silero")]
impl SpeechDetector for SileroVad {
    fn is_speech(&mut self, samples: &[i16]) -> Result<bool> {
        let probability = self.detector.predict(samples.iter().copied());
        Ok(probability >= self.threshold)
    }

    fn reset(&mut self) {
        self.detector.reset();
    }
}

/// Energy detector with webrtc-style aggressiveness levels
///
/// RMS thresholding only; kept for scripted tests and builds without the
/// `vad-silero` feature, where model inference is unavailable.
pub struct EnergyVad {
    threshold: f32,
}

// RMS thresholds per aggressiveness level, tuned for 16-bit speech capture
const LEVEL_THRESHOLDS: [f32; 4] = [80.0, 140.0, 200.0, 280.0];

impl EnergyVad {
    pub fn new(level: u8) -> Self {
        let level = level.min(3) as usize;
        Self {
            threshold: LEVEL_THRESHOLDS[level],
        }
    }

    /// Detector with an explicit RMS threshold
    pub fn with_threshold(threshold: f32) -> Self {
        Self { threshold }
    }

    fn rms(samples: &[i16]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        (sum / samples.len() as f64).sqrt() as f32
    }
}

impl SpeechDetector for EnergyVad {
    fn is_speech(&mut self, samples: &[i16]) -> Result<bool> {
        Ok(Self::rms(samples) >= self.threshold)
    }
}
