// Relay: a single sequential consumer that forwards topic entries verbatim to the HTTP sink.
//
// Delivery is at-least-once. The commit position is the lowest offset not yet delivered;
// it only moves across a contiguous run of successes. A failed entry is not retried in
// the same run (the cursor moves on), but it holds the commit position, so the next run
// replays from it. Entries after it that did get through are recorded as delivered and
// skipped on that replay. Once retention prunes a failed entry it no longer holds the
// commit position.

use crate::error::PipelineError;
use crate::models::{DeliveryOutcome, RelayRecord, TopicEntry};
use crate::topic::{Topic, now_ms};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Entries fetched from the log per read.
const FETCH_BATCH: u32 = 100;

pub struct HttpSink {
    client: reqwest::Client,
    url: String,
}

impl HttpSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POSTs `body` as-is with a JSON content type. Any 2xx is success.
    pub async fn post(&self, offset: i64, body: &str) -> Result<StatusCode, PipelineError> {
        let failure = |reason: String| PipelineError::RelayDeliveryFailure { offset, reason };
        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_owned())
            .send()
            .await
            .map_err(|e| failure(e.to_string()))?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if status.is_success() {
            tracing::debug!(offset, status = %status, response = %text, "Sink accepted entry");
            Ok(status)
        } else {
            Err(failure(format!("HTTP {} - {}", status, text)))
        }
    }
}

pub struct Relay {
    topic: Arc<Topic>,
    sink: HttpSink,
    topic_name: String,
    group_id: String,
    poll_interval: Duration,
    /// Next offset to read in this run.
    cursor: i64,
    /// Next offset to replay from after a restart.
    commit_position: i64,
    /// Offsets that failed in this run and are still retained. The lowest one holds the
    /// commit position.
    failed: BTreeSet<i64>,
    /// Offsets at or above the commit position already delivered by an earlier run.
    delivered: BTreeSet<i64>,
}

impl Relay {
    /// Resumes from the group's commit position, or from the earliest retained entry on
    /// the group's first run.
    pub async fn start(
        topic: Arc<Topic>,
        sink: HttpSink,
        topic_name: impl Into<String>,
        group_id: impl Into<String>,
        poll_interval: Duration,
    ) -> anyhow::Result<Self> {
        let topic_name = topic_name.into();
        let group_id = group_id.into();
        let start = match topic.committed_offset(&group_id, &topic_name).await? {
            Some(offset) => {
                tracing::info!(group_id = %group_id, offset, "Resuming from committed offset");
                offset
            }
            None => {
                let earliest = topic.earliest_offset(&topic_name).await?.unwrap_or(0);
                tracing::info!(
                    group_id = %group_id,
                    offset = earliest,
                    "No committed offset; replaying from earliest retained entry"
                );
                earliest
            }
        };
        let delivered = topic.delivered_offsets(&group_id, &topic_name, start).await?;
        Ok(Self {
            topic,
            sink,
            topic_name,
            group_id,
            poll_interval,
            cursor: start,
            commit_position: start,
            failed: BTreeSet::new(),
            delivered,
        })
    }

    pub fn commit_position(&self) -> i64 {
        self.commit_position
    }

    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    /// Reads one batch from the cursor and forwards each entry in order.
    /// Returns how many entries were handled; 0 means caught up.
    pub async fn step(&mut self) -> Result<usize, PipelineError> {
        self.release_pruned().await?;
        let entries = self
            .topic
            .fetch_from(&self.topic_name, self.cursor, FETCH_BATCH)
            .await
            .map_err(|e| self.consume_failure(e))?;
        let n = entries.len();
        for entry in entries {
            self.handle(entry).await;
        }
        Ok(n)
    }

    /// Steps until caught up. Consume failures are returned to the caller.
    pub async fn drain_available(&mut self) -> Result<usize, PipelineError> {
        let mut total = 0;
        loop {
            let n = self.step().await?;
            if n == 0 {
                return Ok(total);
            }
            total += n;
        }
    }

    /// Consumes until shutdown. A failed entry or read never ends the loop.
    pub async fn run(mut self, mut shutdown_rx: tokio::sync::oneshot::Receiver<()>) {
        tracing::info!(
            topic = %self.topic_name,
            group_id = %self.group_id,
            url = %self.sink.url(),
            "Listening for topic entries"
        );
        loop {
            let idle = tokio::select! {
                r = self.step() => match r {
                    Ok(n) => n == 0,
                    Err(e) => {
                        tracing::warn!(error = %e, operation = "consume", "Topic read failed");
                        true
                    }
                },
                _ = &mut shutdown_rx => break,
            };
            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => {}
                    _ = &mut shutdown_rx => break,
                }
            }
        }
        tracing::info!(
            commit_position = self.commit_position,
            cursor = self.cursor,
            "Relay shutting down"
        );
    }

    async fn handle(&mut self, entry: TopicEntry) {
        let offset = entry.offset;
        self.cursor = offset + 1;

        if self.delivered.remove(&offset) {
            tracing::debug!(offset, "Already delivered by an earlier run; skipping");
            if self.failed.is_empty() {
                self.advance_commit(offset + 1).await;
            }
            return;
        }

        tracing::info!(offset, payload = %entry.payload, "Received from topic");
        let outcome = match self.sink.post(offset, &entry.payload).await {
            Ok(status) => {
                tracing::info!(offset, status = %status, "Forwarded to sink");
                DeliveryOutcome::Delivered
            }
            Err(e) => {
                tracing::warn!(error = %e, operation = "relay_delivery", "Delivery failed; moving on");
                self.failed.insert(offset);
                DeliveryOutcome::Failed
            }
        };

        let advance = self.failed.is_empty();
        let record = RelayRecord {
            entry_offset: offset,
            outcome,
            commit_position: if advance { offset + 1 } else { self.commit_position },
            attempted_at: now_ms().unwrap_or(0),
        };
        if let Err(e) = self
            .topic
            .record_delivery(&self.group_id, &self.topic_name, &record)
            .await
        {
            tracing::warn!(error = %e, offset, operation = "record_delivery", "Failed to record delivery");
        }
        if advance {
            self.advance_commit(offset + 1).await;
        }
    }

    /// Drops failed offsets that retention has pruned and moves the commit position up to
    /// the next failure still retained, or to the cursor when none is left.
    async fn release_pruned(&mut self) -> Result<(), PipelineError> {
        let Some(&oldest_failed) = self.failed.first() else {
            return Ok(());
        };
        let earliest = self
            .topic
            .earliest_offset(&self.topic_name)
            .await
            .map_err(|e| self.consume_failure(e))?
            .unwrap_or(self.cursor);
        if oldest_failed >= earliest {
            return Ok(());
        }
        self.failed = self.failed.split_off(&earliest);
        self.delivered = self.delivered.split_off(&earliest);
        let next = self.failed.first().copied().unwrap_or(self.cursor);
        tracing::warn!(
            oldest_failed,
            earliest,
            next_offset = next,
            "Failed entries pruned before redelivery; releasing commit position"
        );
        self.advance_commit(next).await;
        Ok(())
    }

    fn consume_failure(&self, e: anyhow::Error) -> PipelineError {
        PipelineError::ConsumeFailure {
            topic: self.topic_name.clone(),
            reason: e.to_string(),
        }
    }

    async fn advance_commit(&mut self, next_offset: i64) {
        self.commit_position = next_offset;
        if let Err(e) = self
            .topic
            .commit(&self.group_id, &self.topic_name, next_offset)
            .await
        {
            // The in-memory position still moves; the next successful commit catches up.
            tracing::warn!(error = %e, next_offset, operation = "commit", "Offset commit failed");
        }
    }
}
