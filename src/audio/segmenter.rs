use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::frame::{AudioFrame, FrameSource};
use super::vad::SpeechDetector;
use crate::config::AudioConfig;

/// Why an utterance capture completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    /// Trailing silence reached the configured timeout
    SilenceTimeout,
    /// The hard duration cap was hit during continuous speech
    MaxDuration,
}

/// One captured, VAD-bounded span of audio
#[derive(Debug, Clone)]
pub struct Utterance {
    /// Concatenated PCM bytes (i16 little-endian, mono)
    pub pcm: Vec<u8>,
    pub sample_rate: u32,
    pub reason: CompletionReason,
}

impl Utterance {
    pub fn duration_ms(&self) -> u64 {
        let samples = (self.pcm.len() / 2) as u64;
        samples * 1000 / self.sample_rate as u64
    }
}

/// Segmenter configuration, derived from the `[audio]` config section
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    pub silence_timeout_ms: u64,
    pub max_utterance_ms: u64,
    pub archive_dir: Option<PathBuf>,
}

impl From<&AudioConfig> for SegmenterConfig {
    fn from(cfg: &AudioConfig) -> Self {
        Self {
            silence_timeout_ms: cfg.silence_timeout_ms,
            max_utterance_ms: cfg.max_utterance_ms,
            archive_dir: cfg.archive_dir.as_ref().map(PathBuf::from),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureState {
    Idle,
    Speech,
    TrailingSilence,
}

/// Segments a continuous frame stream into discrete utterances
///
/// State machine: `Idle → Speech → TrailingSilence → complete`. Nothing is
/// buffered until the first speech frame; from then on every frame is
/// buffered (speech and silence) until trailing silence reaches the timeout
/// or the utterance hits the hard duration cap.
///
/// Silence time is accumulated from frame sample counts rather than wall
/// clock, so capture behaves identically on live devices and scripted
/// sources.
pub struct Segmenter {
    config: SegmenterConfig,
    vad: Box<dyn SpeechDetector>,
    captured: u64,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig, vad: Box<dyn SpeechDetector>) -> Self {
        Self {
            config,
            vad,
            captured: 0,
        }
    }

    /// Capture one complete utterance, blocking until it is bounded
    ///
    /// Owns the audio input device exclusively for the duration of the call;
    /// device-acquisition failure is fatal to this call only and the caller
    /// may retry.
    pub async fn capture(&mut self, source: &mut dyn FrameSource) -> Result<Utterance> {
        let mut rx = source
            .start()
            .await
            .with_context(|| format!("failed to acquire audio source '{}'", source.name()))?;

        let result = self.run(&mut rx).await;

        // Release the device regardless of how the capture ended
        if let Err(e) = source.stop().await {
            warn!("Failed to stop audio source: {}", e);
        }

        let utterance = result?;

        if let Some(dir) = self.config.archive_dir.clone() {
            if let Err(e) = self.archive(&dir, &utterance) {
                warn!("Failed to archive utterance: {}", e);
            }
        }

        info!(
            "Captured utterance: {}ms, reason {:?}",
            utterance.duration_ms(),
            utterance.reason
        );

        Ok(utterance)
    }

    async fn run(&mut self, rx: &mut mpsc::Receiver<AudioFrame>) -> Result<Utterance> {
        let mut state = CaptureState::Idle;
        let mut buffer: Vec<i16> = Vec::new();
        let mut sample_rate = 0u32;
        let mut buffered_ms = 0u64;
        let mut silence_ms = 0u64;

        self.vad.reset();

        while let Some(frame) = rx.recv().await {
            let is_speech = self.vad.is_speech(&frame.samples)?;
            let frame_ms = frame.duration_ms();

            match state {
                CaptureState::Idle => {
                    if !is_speech {
                        continue; // ambient silence, nothing buffered
                    }
                    debug!("Speech onset at frame t={}ms", frame.timestamp_ms);
                    state = CaptureState::Speech;
                    sample_rate = frame.sample_rate;
                    buffer.extend_from_slice(&frame.samples);
                    buffered_ms += frame_ms;
                }
                CaptureState::Speech => {
                    buffer.extend_from_slice(&frame.samples);
                    buffered_ms += frame_ms;
                    if !is_speech {
                        state = CaptureState::TrailingSilence;
                        silence_ms = frame_ms;
                        if silence_ms >= self.config.silence_timeout_ms {
                            return Ok(self.complete(buffer, sample_rate, CompletionReason::SilenceTimeout));
                        }
                    }
                }
                CaptureState::TrailingSilence => {
                    buffer.extend_from_slice(&frame.samples);
                    buffered_ms += frame_ms;
                    if is_speech {
                        // Speaker resumed; clear the silence clock
                        state = CaptureState::Speech;
                        silence_ms = 0;
                    } else {
                        silence_ms += frame_ms;
                        if silence_ms >= self.config.silence_timeout_ms && !buffer.is_empty() {
                            return Ok(self.complete(buffer, sample_rate, CompletionReason::SilenceTimeout));
                        }
                    }
                }
            }

            if state != CaptureState::Idle && buffered_ms >= self.config.max_utterance_ms {
                warn!(
                    "Utterance hit the {}ms duration cap",
                    self.config.max_utterance_ms
                );
                return Ok(self.complete(buffer, sample_rate, CompletionReason::MaxDuration));
            }
        }

        bail!("audio stream ended before an utterance completed");
    }

    fn complete(
        &mut self,
        samples: Vec<i16>,
        sample_rate: u32,
        reason: CompletionReason,
    ) -> Utterance {
        self.captured += 1;

        let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();

        Utterance {
            pcm,
            sample_rate,
            reason,
        }
    }

    /// Write the utterance to the archive directory as a WAV file
    fn archive(&self, dir: &PathBuf, utterance: &Utterance) -> Result<()> {
        std::fs::create_dir_all(dir).context("failed to create archive directory")?;

        let path = dir.join(format!("utterance-{:06}.wav", self.captured));
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: utterance.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(&path, spec)
            .with_context(|| format!("failed to create WAV file: {:?}", path))?;

        for chunk in utterance.pcm.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([chunk[0], chunk[1]]))?;
        }
        writer.finalize().context("failed to finalize WAV file")?;

        debug!("Archived utterance to {:?}", path);
        Ok(())
    }
}
