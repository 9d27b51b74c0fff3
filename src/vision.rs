//! Human-presence check via the Gemini vision API.
//!
//! One image, one fixed prompt, one constrained YES/NO answer. The
//! classifier itself reports errors as errors; collapsing them to a
//! quiet "no human" is the orchestrator's call, so a remote outage
//! stays distinguishable from a genuine negative.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Prompt engineered to get a single-word YES/NO answer.
const HUMAN_PROMPT: &str = "Analyze this image from a home security sensor. \
     Is there a real human, not any digital object, in this image? \
     Respond with only the single word 'YES' or the single word 'NO'.";

/// Default vision-capable model.
pub const DEFAULT_VISION_MODEL: &str = "gemini-2.5-flash";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Image file not found at {0}")]
    ImageNotFound(PathBuf),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Malformed API response: {0}")]
    MalformedResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a classification that actually completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Human,
    NoHuman,
}

/// Map the model's free text onto a verdict.
///
/// Exact match on "YES" after trim + uppercase; everything else,
/// including hedged answers like "MAYBE", counts as no human.
pub fn parse_verdict(text: &str) -> Verdict {
    if text.trim().to_uppercase() == "YES" {
        Verdict::Human
    } else {
        Verdict::NoHuman
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Deserialize)]
struct ContentPart {
    text: Option<String>,
}

pub struct GeminiVision {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiVision {
    pub fn new(api_key: String) -> Result<Self, VisionError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: DEFAULT_VISION_MODEL.to_string(),
        })
    }

    /// Submit the snapshot for analysis and return the model's verdict.
    pub async fn classify(&self, image_path: &Path) -> Result<Verdict, VisionError> {
        if !image_path.exists() {
            return Err(VisionError::ImageNotFound(image_path.to_path_buf()));
        }

        log::info!("Uploading {} for analysis...", image_path.display());
        let image_bytes = tokio::fs::read(image_path).await?;

        let body = json!({
            "contents": [{
                "parts": [
                    {
                        "inline_data": {
                            "mime_type": "image/jpeg",
                            "data": BASE64.encode(&image_bytes),
                        }
                    },
                    { "text": HUMAN_PROMPT }
                ]
            }]
        });

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(VisionError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| VisionError::MalformedResponse(e.to_string()))?;

        let answer = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .and_then(|p| p.text.as_deref())
            .ok_or_else(|| {
                VisionError::MalformedResponse("response carried no text part".to_string())
            })?;

        log::info!("Vision model answered: {:?}", answer.trim());
        Ok(parse_verdict(answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_yes_means_human() {
        assert_eq!(parse_verdict("YES"), Verdict::Human);
        assert_eq!(parse_verdict("  yes \n"), Verdict::Human);
    }

    #[test]
    fn anything_else_means_no_human() {
        assert_eq!(parse_verdict("NO"), Verdict::NoHuman);
        assert_eq!(parse_verdict("MAYBE"), Verdict::NoHuman);
        assert_eq!(parse_verdict("YES."), Verdict::NoHuman);
        assert_eq!(parse_verdict("Yes, there is a person."), Verdict::NoHuman);
        assert_eq!(parse_verdict(""), Verdict::NoHuman);
    }

    #[test]
    fn missing_image_is_a_distinct_error() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let vision = GeminiVision::new("test_key_0123456789abcdef".to_string()).unwrap();
        let result = rt.block_on(vision.classify(Path::new("definitely/not/here.jpg")));
        assert!(matches!(result, Err(VisionError::ImageNotFound(_))));
    }
}
