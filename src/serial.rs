// Serial line source: blocking access to the sensor's newline-framed ASCII stream.
// All methods block; callers run them on the blocking pool (see ingestor).

use crate::config::DeviceConfig;
use crate::error::PipelineError;
use serialport::{ClearBuffer, SerialPort};
use std::fmt::Display;
use std::io::Read;
use std::time::Duration;

/// Most recent bytes kept from one drain. Older bytes past this are dropped from the front.
const MAX_DRAIN_BYTES: usize = 64 * 1024;

/// Upper bound on bytes read in one drain, so a device that never goes quiet cannot keep
/// the blocking thread busy.
const MAX_READ_PER_DRAIN: usize = 4 * MAX_DRAIN_BYTES;

pub trait LineSource: Send {
    /// Reads everything currently buffered and returns the complete lines, oldest first.
    fn drain_lines(&mut self) -> Result<Vec<String>, PipelineError>;

    /// Drops whatever is still pending in the inbound buffer.
    fn discard_input(&mut self) -> Result<(), PipelineError>;
}

pub struct SerialLineSource {
    port: Box<dyn SerialPort>,
}

impl SerialLineSource {
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self, serialport::Error> {
        let port = serialport::new(path, baud_rate).timeout(timeout).open()?;
        Ok(Self { port })
    }
}

impl LineSource for SerialLineSource {
    fn drain_lines(&mut self) -> Result<Vec<String>, PipelineError> {
        let mut raw = Vec::new();
        let mut chunk = [0u8; 1024];
        let mut total = 0;
        while total < MAX_READ_PER_DRAIN {
            let available = self.port.bytes_to_read()? as usize;
            if available == 0 {
                break;
            }
            let len = available.min(chunk.len());
            let n = self.port.read(&mut chunk[..len])?;
            if n == 0 {
                break;
            }
            total += n;
            push_tail(&mut raw, &chunk[..n], MAX_DRAIN_BYTES);
        }
        Ok(split_lines(&raw))
    }

    fn discard_input(&mut self) -> Result<(), PipelineError> {
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }
}

/// Appends `bytes` to `buf`, then drops from the front so at most `cap` of the newest
/// bytes remain.
pub fn push_tail(buf: &mut Vec<u8>, bytes: &[u8], cap: usize) {
    buf.extend_from_slice(bytes);
    if buf.len() > cap {
        let excess = buf.len() - cap;
        buf.drain(..excess);
    }
}

/// Splits raw bytes into trimmed, non-empty lines. A trailing fragment without `\n` is
/// incomplete and dropped.
pub fn split_lines(raw: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(raw);
    let mut parts: Vec<&str> = text.split('\n').collect();
    parts.pop();
    parts
        .into_iter()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Tries each candidate in order with `open`; returns the first that succeeds along with
/// its name, or DeviceUnavailable listing everything tried.
pub fn probe<T, E: Display>(
    candidates: &[String],
    mut open: impl FnMut(&str) -> Result<T, E>,
) -> Result<(String, T), PipelineError> {
    for name in candidates {
        match open(name) {
            Ok(dev) => {
                tracing::info!(port = %name, "Serial port opened");
                return Ok((name.clone(), dev));
            }
            Err(e) => {
                tracing::warn!(port = %name, error = %e, "Could not open serial port");
            }
        }
    }
    Err(PipelineError::DeviceUnavailable {
        tried: candidates.to_vec(),
    })
}

/// Probes `config.candidate_ports` for a real serial device.
pub fn open_first_available(
    config: &DeviceConfig,
) -> Result<(String, SerialLineSource), PipelineError> {
    let timeout = Duration::from_millis(config.read_timeout_ms);
    probe(&config.candidate_ports, |path| {
        SerialLineSource::open(path, config.baud_rate, timeout)
    })
}
