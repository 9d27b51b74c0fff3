//! Warning-speech synthesis via the ElevenLabs API.
//!
//! The returned audio stream is written chunk by chunk to the alert
//! clip path, overwriting the previous clip. A returned path is the
//! only authoritative signal of success; on any failure callers get an
//! error and must not touch whatever partial file may exist.

use reqwest::Client;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum TtsError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to write audio file: {0}")]
    Write(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub voice_id: String,
    pub model: String,
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(), // Rachel voice
            model: "eleven_multilingual_v2".to_string(),
            stability: 0.5,
            similarity_boost: 0.75,
            style: 0.0,
            use_speaker_boost: true,
        }
    }
}

pub struct ElevenLabsTts {
    client: Client,
    api_key: String,
    base_url: String,
    config: TtsConfig,
}

impl ElevenLabsTts {
    pub fn new(api_key: String) -> Result<Self, TtsError> {
        Self::with_config(api_key, TtsConfig::default())
    }

    pub fn with_config(api_key: String, config: TtsConfig) -> Result<Self, TtsError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: "https://api.elevenlabs.io/v1".to_string(),
            config,
        })
    }

    /// Synthesize `text` and stream the MP3 response into `dest`.
    /// Returns the absolute path of the written clip.
    pub async fn synthesize_to_file(&self, text: &str, dest: &Path) -> Result<PathBuf, TtsError> {
        let url = format!("{}/text-to-speech/{}", self.base_url, self.config.voice_id);

        let payload = json!({
            "text": text,
            "model_id": self.config.model,
            "voice_settings": {
                "stability": self.config.stability,
                "similarity_boost": self.config.similarity_boost,
                "style": self.config.style,
                "use_speaker_boost": self.config.use_speaker_boost
            }
        });

        log::info!("Generating speech for: {:?}...", text);
        let mut response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "audio/mpeg")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TtsError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0usize;
        while let Some(chunk) = response.chunk().await? {
            if chunk.is_empty() {
                continue;
            }
            file.write_all(&chunk).await?;
            written += chunk.len();
        }
        file.flush().await?;

        let abs = tokio::fs::canonicalize(dest).await?;
        log::info!("Audio clip saved to {} ({} bytes)", abs.display(), written);
        Ok(abs)
    }
}
