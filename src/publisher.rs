// Append envelopes to the topic. Fire-and-forget: a failed append is logged and the
// envelope dropped, never retried or queued locally.

use crate::error::PipelineError;
use crate::models::Envelope;
use crate::stats::PipelineStats;
use crate::topic::Topic;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Envelopes waiting for the publisher task. Overflow is dropped by the pipeline.
pub const ENVELOPE_CHANNEL_CAPACITY: usize = 16;

pub struct Publisher {
    topic: Arc<Topic>,
    topic_name: String,
    timeout: Duration,
    stats: Arc<PipelineStats>,
}

impl Publisher {
    pub fn new(
        topic: Arc<Topic>,
        topic_name: impl Into<String>,
        timeout: Duration,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            topic,
            topic_name: topic_name.into(),
            timeout,
            stats,
        }
    }

    /// Serializes and appends one envelope. Returns the assigned offset.
    pub async fn publish(&self, envelope: &Envelope) -> Result<i64, PipelineError> {
        let result = self.append(envelope).await;
        match &result {
            Ok(offset) => {
                PipelineStats::incr(&self.stats.envelopes_published_total);
                tracing::info!(
                    topic = %self.topic_name,
                    offset,
                    device_id = envelope.device_id,
                    water_level = envelope.water_level,
                    "Sent to topic"
                );
            }
            Err(e) => {
                PipelineStats::incr(&self.stats.publish_failures_total);
                tracing::warn!(
                    error = %e,
                    operation = "publish",
                    water_level = envelope.water_level,
                    "Envelope dropped"
                );
            }
        }
        result
    }

    async fn append(&self, envelope: &Envelope) -> Result<i64, PipelineError> {
        let failure = |reason: String| PipelineError::PublishFailure {
            topic: self.topic_name.clone(),
            reason,
        };
        let json = envelope.to_json().map_err(|e| failure(e.to_string()))?;
        match tokio::time::timeout(self.timeout, self.topic.append(&self.topic_name, &json)).await
        {
            Ok(Ok(offset)) => Ok(offset),
            Ok(Err(e)) => Err(failure(e.to_string())),
            Err(_) => Err(failure(format!(
                "timed out after {} ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

/// Spawns the task that publishes envelopes handed over by the pipeline.
/// Exits once the pipeline drops its sender and the channel is drained.
pub fn spawn_publisher(
    mut rx: mpsc::Receiver<Envelope>,
    publisher: Publisher,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            // Outcome is already logged and counted inside publish.
            let _ = publisher.publish(&envelope).await;
        }
        tracing::debug!("Publisher shutting down");
    })
}
