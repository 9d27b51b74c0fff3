//! Startup configuration: CLI settings plus environment-sourced API keys.
//!
//! Every value the pipeline needs is resolved here, once, and handed to
//! the components by reference. Component code never reads the
//! environment on its own.

use clap::Parser;
use secrecy::{ExposeSecret, SecretBox};
use std::env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid API key format for {service}: {reason}")]
    InvalidKeyFormat { service: String, reason: String },
}

/// Runtime settings for the watch loop.
#[derive(Parser, Debug, Clone)]
#[command(name = "sentinel-edge", about = "Serial-triggered perimeter watcher")]
pub struct Settings {
    /// Video stream or still-image URL of the IP camera
    #[arg(long, env = "SENTINEL_CAMERA_URL", default_value = "http://10.11.20.70:4747/video")]
    pub camera_url: String,

    /// Serial device the motion sensor is attached to
    #[arg(long, env = "SENTINEL_SERIAL_PORT", default_value = "/dev/ttyUSB0")]
    pub serial_port: String,

    /// Baud rate of the sensor link
    #[arg(long, env = "SENTINEL_SERIAL_BAUD", default_value_t = 9600)]
    pub serial_baud: u32,

    /// Poll interval between serial checks, in milliseconds
    #[arg(long, env = "SENTINEL_POLL_INTERVAL_MS", default_value_t = 10)]
    pub poll_interval_ms: u64,

    /// Where the captured frame is written (overwritten each cycle)
    #[arg(long, default_value = "snapshot.jpg")]
    pub snapshot_path: PathBuf,

    /// Where the synthesized alert clip is written (overwritten each cycle)
    #[arg(long, default_value = "warning_audio.mp3")]
    pub alert_audio_path: PathBuf,
}

/// Configuration for API services.
///
/// The Gemini key is mandatory: without it the classifier cannot run and
/// startup fails. The ElevenLabs key is best-effort: when it is missing
/// the synthesizer is never initialized and every alert cycle skips the
/// audio stages.
#[derive(Debug)]
pub struct ApiConfig {
    gemini_key: SecretBox<String>,
    elevenlabs_key: Option<SecretBox<String>>,
}

impl ApiConfig {
    /// Load API configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (for development)
        dotenvy::dotenv().ok();

        let gemini_key = Self::load_api_key("GEMINI_API_KEY", "Gemini")?;

        // The speech client is best-effort: a missing or unusable key
        // disables audio alerts, it never blocks startup.
        let elevenlabs_key = match Self::load_api_key("ELEVENLABS_API_KEY", "ElevenLabs") {
            Ok(key) => Some(key),
            Err(e) => {
                log::warn!("ElevenLabs key unavailable ({}), audio alerts will be disabled", e);
                None
            }
        };

        Ok(Self {
            gemini_key,
            elevenlabs_key,
        })
    }

    /// Load and validate a single API key from the environment.
    fn load_api_key(env_var: &str, service_name: &str) -> Result<SecretBox<String>, ConfigError> {
        let key = env::var(env_var).map_err(|_| ConfigError::MissingEnvVar(env_var.to_string()))?;

        if key.trim().is_empty() {
            return Err(ConfigError::InvalidKeyFormat {
                service: service_name.to_string(),
                reason: "API key cannot be empty".to_string(),
            });
        }

        Self::validate_key_format(&key, service_name)?;

        Ok(SecretBox::new(Box::new(key)))
    }

    /// Sanity-check key shape per service before any network call is made.
    fn validate_key_format(key: &str, service: &str) -> Result<(), ConfigError> {
        match service {
            "Gemini" => {
                if key.len() < 20 {
                    return Err(ConfigError::InvalidKeyFormat {
                        service: service.to_string(),
                        reason: "Gemini keys should be at least 20 characters".to_string(),
                    });
                }
            }
            "ElevenLabs" => {
                if key.len() < 10 {
                    return Err(ConfigError::InvalidKeyFormat {
                        service: service.to_string(),
                        reason: "ElevenLabs keys should be at least 10 characters".to_string(),
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Get the Gemini API key (use only when making API calls).
    pub fn gemini_key(&self) -> &str {
        self.gemini_key.expose_secret()
    }

    /// Get the ElevenLabs API key, if one was configured.
    pub fn elevenlabs_key(&self) -> Option<&str> {
        self.elevenlabs_key.as_ref().map(|k| k.expose_secret().as_str())
    }
}

/// Load configuration with helpful error messages for development.
pub fn load_config() -> Result<ApiConfig, ConfigError> {
    match ApiConfig::load() {
        Ok(config) => {
            log::info!("Successfully loaded API configuration");
            Ok(config)
        }
        Err(ConfigError::MissingEnvVar(var)) => {
            log::error!("Missing required environment variable: {}", var);
            log::error!("Create a .env file in the project root with:");
            log::error!("{}=your_api_key_here", var);
            Err(ConfigError::MissingEnvVar(var))
        }
        Err(e) => {
            log::error!("Configuration error: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_validation() {
        assert!(ApiConfig::validate_key_format("AIzaSyA-0123456789abcdef", "Gemini").is_ok());
        assert!(ApiConfig::validate_key_format("short", "Gemini").is_err());

        assert!(ApiConfig::validate_key_format("1234567890abcdef", "ElevenLabs").is_ok());
        assert!(ApiConfig::validate_key_format("short", "ElevenLabs").is_err());
    }

    #[test]
    fn bad_elevenlabs_key_degrades_to_silent() {
        env::set_var("GEMINI_API_KEY", "test-gemini-key-0123456789");
        env::set_var("ELEVENLABS_API_KEY", "short");
        let config = ApiConfig::load().unwrap();
        assert!(config.elevenlabs_key().is_none());
        env::remove_var("ELEVENLABS_API_KEY");
    }

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::parse_from(["sentinel-edge"]);
        assert_eq!(settings.serial_baud, 9600);
        assert_eq!(settings.poll_interval_ms, 10);
        assert_eq!(settings.snapshot_path, PathBuf::from("snapshot.jpg"));
        assert_eq!(settings.alert_audio_path, PathBuf::from("warning_audio.mp3"));
    }

    #[test]
    fn settings_fall_back_to_environment() {
        env::set_var("SENTINEL_SERIAL_PORT", "/dev/ttyACM9");
        let settings = Settings::parse_from(["sentinel-edge"]);
        assert_eq!(settings.serial_port, "/dev/ttyACM9");

        // An explicit flag still wins over the environment
        let settings = Settings::parse_from(["sentinel-edge", "--serial-port", "/dev/ttyS7"]);
        assert_eq!(settings.serial_port, "/dev/ttyS7");
        env::remove_var("SENTINEL_SERIAL_PORT");
    }
}
