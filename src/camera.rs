//! Single-frame capture from an HTTP camera.
//!
//! Works against both MJPEG streams (DroidCam's `/video` endpoint,
//! `multipart/x-mixed-replace`) and plain still-image endpoints. Either
//! way exactly one JPEG frame is pulled, written to the snapshot path,
//! and the connection is dropped before returning.

use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// JPEG start-of-image marker.
const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// JPEG end-of-image marker.
const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// Give up if no complete frame shows up within this many bytes.
const MAX_SCAN_BYTES: usize = 8 * 1024 * 1024;

/// Whole-capture deadline, connection included.
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Unable to open camera stream: {0}")]
    Connect(#[from] reqwest::Error),

    #[error("Camera returned HTTP {0}")]
    BadStatus(u16),

    #[error("Failed to capture a frame from the stream: {0}")]
    NoFrame(String),

    #[error("Failed to write snapshot: {0}")]
    Write(#[from] std::io::Error),
}

/// Locate the first complete JPEG in `buf`, returned as `(start, end)`
/// byte offsets with `end` pointing one past the EOI marker.
pub fn find_jpeg_frame(buf: &[u8]) -> Option<(usize, usize)> {
    let start = buf.windows(2).position(|w| w == JPEG_SOI)?;
    let rel_end = buf[start + 2..].windows(2).position(|w| w == JPEG_EOI)?;
    Some((start, start + 2 + rel_end + 2))
}

/// Pulls single frames from an HTTP camera endpoint.
pub struct FrameGrabber {
    client: Client,
}

impl FrameGrabber {
    pub fn new() -> Result<Self, CameraError> {
        let client = Client::builder().timeout(CAPTURE_TIMEOUT).build()?;
        Ok(Self { client })
    }

    /// Capture one frame from `url` and persist it to `dest`,
    /// overwriting any previous snapshot. Returns the snapshot path.
    pub async fn capture(&self, url: &str, dest: &Path) -> Result<PathBuf, CameraError> {
        log::info!("Connecting to camera at {}...", url);
        let mut response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CameraError::BadStatus(status.as_u16()));
        }

        // Read until one complete JPEG is in the buffer. A still-image
        // endpoint yields it in the first body; an MJPEG stream yields
        // it a few chunks in.
        let mut buf: Vec<u8> = Vec::new();
        let frame = loop {
            if let Some((start, end)) = find_jpeg_frame(&buf) {
                break buf[start..end].to_vec();
            }
            if buf.len() > MAX_SCAN_BYTES {
                return Err(CameraError::NoFrame(format!(
                    "no complete frame within {} bytes",
                    MAX_SCAN_BYTES
                )));
            }
            match response.chunk().await {
                Ok(Some(chunk)) => buf.extend_from_slice(&chunk),
                Ok(None) => {
                    return Err(CameraError::NoFrame(
                        "stream ended before a complete frame arrived".to_string(),
                    ))
                }
                Err(e) => return Err(CameraError::NoFrame(e.to_string())),
            }
        };
        drop(response);

        tokio::fs::write(dest, &frame).await?;
        log::info!("Snapshot saved to {} ({} bytes)", dest.display(), frame.len());
        Ok(dest.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg(payload: &[u8]) -> Vec<u8> {
        let mut v = JPEG_SOI.to_vec();
        v.extend_from_slice(payload);
        v.extend_from_slice(&JPEG_EOI);
        v
    }

    #[test]
    fn finds_frame_in_plain_body() {
        let body = jpeg(b"frame-data");
        let (start, end) = find_jpeg_frame(&body).unwrap();
        assert_eq!(start, 0);
        assert_eq!(end, body.len());
    }

    #[test]
    fn finds_first_frame_in_mjpeg_part() {
        let mut stream = b"--boundary\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        let frame = jpeg(b"payload");
        stream.extend_from_slice(&frame);
        stream.extend_from_slice(b"\r\n--boundary");
        let (start, end) = find_jpeg_frame(&stream).unwrap();
        assert_eq!(&stream[start..end], frame.as_slice());
    }

    #[test]
    fn incomplete_frame_is_not_matched() {
        let mut partial = JPEG_SOI.to_vec();
        partial.extend_from_slice(b"truncated");
        assert!(find_jpeg_frame(&partial).is_none());
        assert!(find_jpeg_frame(b"no markers here").is_none());
        assert!(find_jpeg_frame(&[]).is_none());
    }

    #[test]
    fn eoi_before_soi_is_ignored() {
        let mut buf = JPEG_EOI.to_vec();
        buf.extend_from_slice(&jpeg(b"x"));
        let (start, end) = find_jpeg_frame(&buf).unwrap();
        assert_eq!(start, 2);
        assert_eq!(&buf[start..end], jpeg(b"x").as_slice());
    }
}
