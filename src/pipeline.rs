//! The alert cycle: capture, classify, and — on a positive verdict —
//! synthesize and play the warning.
//!
//! Stages sit behind trait seams so the cycle can be exercised against
//! stubs. Every stage failure maps to the safe default for that stage:
//! no frame aborts the cycle, a classifier failure counts as no human
//! (fail-safe-to-quiet), a synthesis failure skips playback, and a
//! playback failure is logged and swallowed.

use crate::camera::{CameraError, FrameGrabber};
use crate::playback::{AudioPlayer, PlaybackError};
use crate::tts::{ElevenLabsTts, TtsError};
use crate::vision::{GeminiVision, Verdict, VisionError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// The fixed sentence spoken when a human is confirmed.
pub const WARNING_TEXT: &str = "Warning: Unidentified human detected at the perimeter.";

#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Capture one frame and return the path it was persisted to.
    async fn capture_frame(&self) -> Result<PathBuf, CameraError>;
}

#[async_trait]
pub trait HumanClassifier: Send + Sync {
    async fn classify(&self, image: &Path) -> Result<Verdict, VisionError>;
}

#[async_trait]
pub trait AlertSynthesizer: Send + Sync {
    /// Synthesize `text` and return the path of the written clip.
    async fn synthesize(&self, text: &str) -> Result<PathBuf, TtsError>;
}

#[async_trait]
pub trait AlertPlayer: Send + Sync {
    async fn play(&self, clip: &Path) -> Result<(), PlaybackError>;
}

/// How one trigger cycle ended. The loop re-arms unconditionally
/// whatever the outcome; this exists for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No frame could be captured; nothing else ran.
    CaptureFailed,
    /// The classifier completed and confirmed no human.
    NoHuman,
    /// The classifier errored; treated as quiet, but distinguishable.
    ClassifierUnavailable,
    /// Human confirmed but no audio could be produced.
    AlertSilent,
    /// Human confirmed, warning synthesized and handed to the player.
    AlertPlayed,
}

pub struct AlertPipeline<F, C, S, P> {
    frames: F,
    classifier: C,
    synthesizer: Option<S>,
    player: P,
}

impl<F, C, S, P> AlertPipeline<F, C, S, P>
where
    F: FrameSource,
    C: HumanClassifier,
    S: AlertSynthesizer,
    P: AlertPlayer,
{
    /// `synthesizer` is `None` when no speech client was configured at
    /// startup; alert cycles then run silent.
    pub fn new(frames: F, classifier: C, synthesizer: Option<S>, player: P) -> Self {
        Self {
            frames,
            classifier,
            synthesizer,
            player,
        }
    }

    /// Run one full trigger cycle. Infallible by design: every stage
    /// failure is absorbed into the outcome.
    pub async fn run_cycle(&self) -> CycleOutcome {
        println!("\n--- [!!] SENSOR TRIGGERED [!!] ---");

        let snapshot = match self.frames.capture_frame().await {
            Ok(path) => path,
            Err(e) => {
                log::error!("Failed to capture image, cannot perform analysis: {}", e);
                return CycleOutcome::CaptureFailed;
            }
        };

        let verdict = match self.classifier.classify(&snapshot).await {
            Ok(v) => v,
            Err(e) => {
                // Never alert on an inference failure.
                log::error!("Classification failed, treating as no human: {}", e);
                return CycleOutcome::ClassifierUnavailable;
            }
        };

        if verdict == Verdict::NoHuman {
            println!("*** [RESULT]: No Human Detected. (False Alarm) ***\n");
            return CycleOutcome::NoHuman;
        }

        println!("*** [RESULT]: HUMAN DETECTED! ***");
        println!("--- Initiating Audio Alert ---");

        let outcome = match &self.synthesizer {
            None => {
                log::warn!("No speech client configured, skipping alert audio");
                CycleOutcome::AlertSilent
            }
            Some(synth) => match synth.synthesize(WARNING_TEXT).await {
                Ok(clip) => {
                    if let Err(e) = self.player.play(&clip).await {
                        log::error!("Error playing audio: {}", e);
                    }
                    CycleOutcome::AlertPlayed
                }
                Err(e) => {
                    log::error!("Error generating audio: {}", e);
                    CycleOutcome::AlertSilent
                }
            },
        };

        println!("--- Alert Sequence Complete ---\n");
        outcome
    }

    /// Run one cycle, bailing out if `shutdown` completes first.
    ///
    /// Returns `None` when shutdown won; the in-flight stage is dropped
    /// mid-await, matching an interrupt landing mid-pipeline.
    pub async fn run_cycle_until<Sh>(&self, shutdown: Sh) -> Option<CycleOutcome>
    where
        Sh: std::future::Future,
    {
        tokio::select! {
            _ = shutdown => {
                log::info!("Shutdown requested mid-cycle, abandoning the alert sequence");
                None
            }
            outcome = self.run_cycle() => Some(outcome),
        }
    }
}

/// Production frame source: one HTTP grab per trigger, persisted to the
/// fixed snapshot path.
pub struct CameraStage {
    pub grabber: FrameGrabber,
    pub url: String,
    pub snapshot_path: PathBuf,
}

#[async_trait]
impl FrameSource for CameraStage {
    async fn capture_frame(&self) -> Result<PathBuf, CameraError> {
        self.grabber.capture(&self.url, &self.snapshot_path).await
    }
}

pub struct VisionStage {
    pub vision: GeminiVision,
}

#[async_trait]
impl HumanClassifier for VisionStage {
    async fn classify(&self, image: &Path) -> Result<Verdict, VisionError> {
        self.vision.classify(image).await
    }
}

/// Production synthesizer: fixed voice and model, fixed clip path.
pub struct TtsStage {
    pub tts: ElevenLabsTts,
    pub clip_path: PathBuf,
}

#[async_trait]
impl AlertSynthesizer for TtsStage {
    async fn synthesize(&self, text: &str) -> Result<PathBuf, TtsError> {
        self.tts.synthesize_to_file(text, &self.clip_path).await
    }
}

pub struct PlayerStage {
    pub player: AudioPlayer,
}

#[async_trait]
impl AlertPlayer for PlayerStage {
    async fn play(&self, clip: &Path) -> Result<(), PlaybackError> {
        self.player.play(clip).await
    }
}
