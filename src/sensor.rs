//! Serial link to the motion sensor.
//!
//! The sensor firmware prints one line per reading, e.g.
//! `The value of pin is: 0`. Only the value after the last colon
//! matters, and only `0` arms the pipeline. Lines without the marker
//! phrase are chatter and dropped without comment.

use serialport::SerialPort;
use std::io::{ErrorKind, Read};
use std::time::Duration;
use thiserror::Error;

/// Marker phrase the sensor firmware prefixes every reading with.
pub const TRIGGER_MARKER: &str = "The value of pin is:";

/// Signal value meaning "motion detected" (active-low pin).
pub const TRIGGER_VALUE: &str = "0";

/// Read timeout on the port. Short, so the poll loop never stalls.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Bytes pulled from the port per read.
const READ_CHUNK: usize = 256;

/// Cap on buffered bytes with no line terminator. A device streaming
/// garbage without `\n` framing gets its backlog dropped, not hoarded.
const MAX_PENDING: usize = 4096;

#[derive(Error, Debug)]
pub enum SensorError {
    #[error("Failed to open serial port {port}: {source}")]
    Open {
        port: String,
        source: serialport::Error,
    },

    #[error("Serial connection lost: {0}")]
    ConnectionLost(String),
}

/// Extract the signal value from a sensor line, if the line carries one.
///
/// Returns the trimmed substring after the final `:` for lines that
/// contain [`TRIGGER_MARKER`], `None` for everything else.
pub fn parse_signal_value(line: &str) -> Option<&str> {
    if !line.contains(TRIGGER_MARKER) {
        return None;
    }
    line.rsplit(':').next().map(str::trim)
}

/// Whether a raw sensor line is a trigger reading.
pub fn is_trigger_line(line: &str) -> bool {
    parse_signal_value(line) == Some(TRIGGER_VALUE)
}

/// Accumulates raw serial bytes and evaluates each completed line.
#[derive(Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append bytes and consume any completed lines. Returns true when
    /// one of them was a trigger reading.
    fn push(&mut self, bytes: &[u8]) -> bool {
        self.pending.extend_from_slice(bytes);

        let mut triggered = false;
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            log::debug!("Serial line: {:?}", line);
            if is_trigger_line(line) {
                triggered = true;
            }
        }

        if self.pending.len() > MAX_PENDING {
            log::warn!(
                "Dropping {} bytes of unterminated serial data",
                self.pending.len()
            );
            self.pending.clear();
        }

        triggered
    }

    #[cfg(test)]
    fn buffered(&self) -> usize {
        self.pending.len()
    }
}

/// Owns the open serial port and turns its byte stream into trigger events.
pub struct SensorListener {
    port: Box<dyn SerialPort>,
    buffer: LineBuffer,
}

impl SensorListener {
    /// Open the serial port. Failure here is fatal to startup.
    pub fn open(path: &str, baud: u32) -> Result<Self, SensorError> {
        let port = serialport::new(path, baud)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|source| SensorError::Open {
                port: path.to_string(),
                source,
            })?;
        log::info!("Serial port {} opened at {} baud", path, baud);
        Ok(Self {
            port,
            buffer: LineBuffer::default(),
        })
    }

    /// Non-blocking poll: returns `Ok(true)` when a trigger line arrived.
    ///
    /// Any I/O error other than a read timeout means the link is gone,
    /// which the caller treats as fatal.
    pub fn poll_trigger(&mut self) -> Result<bool, SensorError> {
        let waiting = self
            .port
            .bytes_to_read()
            .map_err(|e| SensorError::ConnectionLost(e.to_string()))?;
        if waiting == 0 {
            return Ok(false);
        }

        let mut scratch = [0_u8; READ_CHUNK];
        match self.port.read(&mut scratch) {
            Ok(0) => Ok(false),
            Ok(n) => Ok(self.buffer.push(&scratch[..n])),
            Err(err) => match err.kind() {
                ErrorKind::WouldBlock | ErrorKind::TimedOut => Ok(false),
                _ => Err(SensorError::ConnectionLost(err.to_string())),
            },
        }
    }

    /// Name of the underlying device, for log messages.
    pub fn port_name(&self) -> String {
        self.port.name().unwrap_or_else(|| "<unknown>".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_lines_yield_signal_value() {
        assert_eq!(parse_signal_value("The value of pin is: 0"), Some("0"));
        assert_eq!(parse_signal_value("The value of pin is: 1"), Some("1"));
        assert_eq!(parse_signal_value("The value of pin is:  0  "), Some("0"));
    }

    #[test]
    fn non_marker_lines_are_ignored() {
        assert_eq!(parse_signal_value("booting sensor v2"), None);
        assert_eq!(parse_signal_value(""), None);
        assert_eq!(parse_signal_value("pin is 0"), None);
    }

    #[test]
    fn only_zero_triggers() {
        assert!(is_trigger_line("The value of pin is: 0"));
        assert!(!is_trigger_line("The value of pin is: 1"));
        assert!(!is_trigger_line("The value of pin is: 00"));
        assert!(!is_trigger_line("The value of pin is:"));
        assert!(!is_trigger_line("random chatter"));
    }

    #[test]
    fn value_after_final_colon_wins() {
        assert!(is_trigger_line("12:30 The value of pin is: 0"));
        assert!(!is_trigger_line("The value of pin is: 0: 1"));
    }

    #[test]
    fn lines_split_across_reads_still_trigger() {
        let mut buffer = LineBuffer::default();
        assert!(!buffer.push(b"The value of pin"));
        assert!(buffer.push(b" is: 0\n"));
        assert_eq!(buffer.buffered(), 0);
    }

    #[test]
    fn unterminated_garbage_is_dropped_at_the_cap() {
        let mut buffer = LineBuffer::default();
        let garbage = vec![b'x'; MAX_PENDING + 1];
        assert!(!buffer.push(&garbage));
        assert_eq!(buffer.buffered(), 0);

        // The buffer keeps working after a flood
        assert!(buffer.push(b"The value of pin is: 0\n"));
    }

    #[test]
    fn short_unterminated_data_is_retained() {
        let mut buffer = LineBuffer::default();
        assert!(!buffer.push(b"partial"));
        assert_eq!(buffer.buffered(), 7);
    }
}
