use thiserror::Error;

pub type Result<T> = std::result::Result<T, SentinelError>;

#[derive(Error, Debug)]
pub enum SentinelError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Camera error: {0}")]
    Camera(#[from] crate::camera::CameraError),

    #[error("Vision error: {0}")]
    Vision(#[from] crate::vision::VisionError),

    #[error("TTS error: {0}")]
    Tts(#[from] crate::tts::TtsError),
}
