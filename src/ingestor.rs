// Poll-side stage: take the freshest serial line, parse it, append a sample to the window.

use crate::error::PipelineError;
use crate::models::SensorSample;
use crate::serial::LineSource;
use crate::stats::PipelineStats;
use crate::window::{self, SharedWindow};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SENSOR_MARKER: &str = "Sensor Value:";

/// Parses `Sensor Value:<integer>` (whitespace around the number allowed).
pub fn parse_reading(line: &str) -> Option<i64> {
    let (_, rest) = line.split_once(SENSOR_MARKER)?;
    rest.trim().parse().ok()
}

#[derive(Debug)]
pub enum PollOutcome {
    /// The freshest line parsed; its value was appended to the window.
    Sampled(i64),
    /// The freshest line did not match the sensor pattern.
    Ignored(String),
    /// Nothing was buffered on the channel.
    NoData,
    /// The read failed or timed out; the window is unchanged.
    Failed(PipelineError),
}

pub struct SampleIngestor {
    source: Arc<Mutex<Box<dyn LineSource>>>,
    window: SharedWindow,
    read_timeout: Duration,
    stats: Arc<PipelineStats>,
}

impl SampleIngestor {
    pub fn new(
        source: Box<dyn LineSource>,
        window: SharedWindow,
        read_timeout: Duration,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            source: Arc::new(Mutex::new(source)),
            window,
            read_timeout,
            stats,
        }
    }

    /// One poll tick. The inbound buffer is discarded after every drain, whether or not
    /// the drain succeeded.
    pub async fn poll(&self) -> PollOutcome {
        let source = self.source.clone();
        let read = tokio::task::spawn_blocking(move || {
            let mut src = source
                .lock()
                .map_err(|e| PipelineError::ReadFailure(format!("serial lock poisoned: {}", e)))?;
            let lines = src.drain_lines();
            if let Err(e) = src.discard_input() {
                tracing::warn!(error = %e, operation = "discard_input", "Serial buffer flush failed");
            }
            lines
        });

        let lines = match tokio::time::timeout(self.read_timeout, read).await {
            Ok(Ok(Ok(lines))) => lines,
            Ok(Ok(Err(e))) => return self.read_failed(e),
            Ok(Err(join)) => {
                return self.read_failed(PipelineError::ReadFailure(format!(
                    "serial task join: {}",
                    join
                )));
            }
            Err(_) => {
                return self.read_failed(PipelineError::ReadTimeout(
                    self.read_timeout.as_millis() as u64,
                ));
            }
        };

        self.ingest_lines(lines, Utc::now())
    }

    /// Keeps only the last line; earlier lines in the same drain are stale.
    pub fn ingest_lines(&self, lines: Vec<String>, now: DateTime<Utc>) -> PollOutcome {
        let Some(latest) = lines.into_iter().next_back() else {
            tracing::debug!("No data in serial buffer");
            return PollOutcome::NoData;
        };

        match parse_reading(&latest) {
            Some(value) => {
                window::lock(&self.window).push(SensorSample::new(value, now));
                PipelineStats::incr(&self.stats.samples_ingested_total);
                tracing::info!(value, "Latest sensor reading");
                PollOutcome::Sampled(value)
            }
            None => {
                tracing::info!(line = %latest, "No valid data found in buffer");
                PollOutcome::Ignored(latest)
            }
        }
    }

    fn read_failed(&self, e: PipelineError) -> PollOutcome {
        PipelineStats::incr(&self.stats.read_failures_total);
        tracing::warn!(error = %e, operation = "poll", "Serial read failed; skipping tick");
        PollOutcome::Failed(e)
    }
}

#[cfg(test)]
mod tests {
    use super::parse_reading;

    #[test]
    fn parses_sensor_lines() {
        assert_eq!(parse_reading("Sensor Value: 120"), Some(120));
        assert_eq!(parse_reading("Sensor Value:130"), Some(130));
        assert_eq!(parse_reading("Sensor Value: -4 "), Some(-4));
    }

    #[test]
    fn rejects_other_lines() {
        assert_eq!(parse_reading("Booting..."), None);
        assert_eq!(parse_reading("Sensor Value:"), None);
        assert_eq!(parse_reading("Sensor Value: 12.5"), None);
        assert_eq!(parse_reading("Sensor Value: abc"), None);
        assert_eq!(parse_reading("sensor value: 12"), None);
    }
}
