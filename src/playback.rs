//! Local playback of the alert clip.
//!
//! The output device is probed once at startup; when none is present
//! the player is disabled for the lifetime of the process and every
//! play call becomes a logged no-op. Nothing in this module may take
//! the watch loop down.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("No audio output device available")]
    NoDevice,

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("MP3 decode error: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Plays alert clips through the default output device.
pub struct AudioPlayer {
    available: bool,
}

impl AudioPlayer {
    /// Probe the default output device once. A missing device disables
    /// playback for the whole run instead of erroring per call.
    pub fn probe() -> Self {
        let available = cpal::default_host().default_output_device().is_some();
        if available {
            log::info!("Audio output device available, playback enabled");
        } else {
            log::warn!("No audio output device found, alert playback disabled");
        }
        Self { available }
    }

    #[cfg(test)]
    pub fn disabled() -> Self {
        Self { available: false }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Play an MP3 file synchronously; returns once playback finished.
    pub async fn play(&self, path: &Path) -> Result<(), PlaybackError> {
        if !self.available {
            log::info!("Playback disabled, skipping {}", path.display());
            return Ok(());
        }

        log::info!("Playing alert from {}...", path.display());
        let mp3_data = tokio::fs::read(path).await?;
        let (samples, sample_rate) = decode_mp3(&mp3_data)?;

        tokio::task::spawn_blocking(move || play_samples_blocking(&samples, sample_rate))
            .await
            .map_err(|e| PlaybackError::Device(e.to_string()))??;

        log::info!("Alert playback finished");
        Ok(())
    }
}

/// Push decoded samples through a cpal output stream and wait for the
/// buffer to drain.
fn play_samples_blocking(samples: &[f32], sample_rate: u32) -> Result<(), PlaybackError> {
    if samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(PlaybackError::NoDevice)?;

    let supported = device
        .supported_output_configs()
        .map_err(|e| PlaybackError::Device(e.to_string()))?
        .find(|c| {
            c.min_sample_rate() <= SampleRate(sample_rate)
                && c.max_sample_rate() >= SampleRate(sample_rate)
        })
        .ok_or_else(|| {
            PlaybackError::Device(format!("no output config supports {} Hz", sample_rate))
        })?;

    let config = supported.with_sample_rate(SampleRate(sample_rate)).config();
    let channels = config.channels as usize;

    let queue: Arc<Mutex<(Vec<f32>, usize)>> = Arc::new(Mutex::new((samples.to_vec(), 0)));
    let finished = Arc::new(Mutex::new(false));
    let queue_cb = Arc::clone(&queue);
    let finished_cb = Arc::clone(&finished);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut guard = queue_cb.lock().unwrap();
                let (samples, pos) = &mut *guard;
                for frame in data.chunks_mut(channels) {
                    let sample = if *pos < samples.len() {
                        let s = samples[*pos];
                        *pos += 1;
                        s
                    } else {
                        *finished_cb.lock().unwrap() = true;
                        0.0
                    };
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }
            },
            |err| {
                log::error!("Audio playback stream error: {}", err);
            },
            None,
        )
        .map_err(|e| PlaybackError::Device(e.to_string()))?;

    stream
        .play()
        .map_err(|e| PlaybackError::Device(e.to_string()))?;

    // Wait for the clip duration, bounded in case the device stalls.
    let duration_ms = (samples.len() as u64 * 1000) / u64::from(sample_rate);
    let deadline = std::time::Instant::now() + Duration::from_millis(duration_ms + 500);
    while !*finished.lock().unwrap() {
        if std::time::Instant::now() > deadline {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    std::thread::sleep(Duration::from_millis(100));

    drop(stream);
    Ok(())
}

/// Decode MP3 bytes to mono f32 samples plus the source sample rate.
fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32), PlaybackError> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 0u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate == 0 {
                    sample_rate = frame.sample_rate as u32;
                }
                if frame.channels == 2 {
                    // Stereo: average channels down to mono
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        (left + right) / 2.0
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(PlaybackError::Decode(e.to_string())),
        }
    }

    if sample_rate == 0 {
        return Err(PlaybackError::Decode("no decodable frames".to_string()));
    }
    Ok((samples, sample_rate))
}
