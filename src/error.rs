// Pipeline error taxonomy. Everything except DeviceUnavailable is a steady-state,
// non-fatal failure: log it and carry on with the next tick or entry.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// No candidate serial port could be opened at startup.
    #[error("no serial device available (tried: {})", tried.join(", "))]
    DeviceUnavailable { tried: Vec<String> },

    #[error("serial read failed: {0}")]
    ReadFailure(String),

    #[error("serial read timed out after {0} ms")]
    ReadTimeout(u64),

    #[error("publish to topic '{topic}' failed: {reason}")]
    PublishFailure { topic: String, reason: String },

    #[error("consume from topic '{topic}' failed: {reason}")]
    ConsumeFailure { topic: String, reason: String },

    #[error("relay delivery of offset {offset} failed: {reason}")]
    RelayDeliveryFailure { offset: i64, reason: String },
}

impl PipelineError {
    /// Only failing to acquire a device at startup stops the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::DeviceUnavailable { .. })
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::ReadFailure(e.to_string())
    }
}

impl From<serialport::Error> for PipelineError {
    fn from(e: serialport::Error) -> Self {
        PipelineError::ReadFailure(e.to_string())
    }
}
