pub mod camera;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod playback;
pub mod sensor;
pub mod tts;
pub mod vision;

pub use error::{Result, SentinelError};
