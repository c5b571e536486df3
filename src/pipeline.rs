// Producer pipeline loop. One task owns both timers: poll ticks feed the window through
// the ingestor, flush ticks drain it through the aggregator and hand envelopes to the
// publisher task over a bounded channel.

use crate::aggregator::WindowAggregator;
use crate::ingestor::SampleIngestor;
use crate::models::Envelope;
use crate::stats::PipelineStats;
use crate::window::{self, SharedWindow};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{Duration, Instant, MissedTickBehavior, interval_at};
use tracing::Instrument;

/// Everything the loop touches, built once at startup.
pub struct PipelineContext {
    pub ingestor: SampleIngestor,
    pub aggregator: WindowAggregator,
    pub window: SharedWindow,
    pub envelope_tx: mpsc::Sender<Envelope>,
    pub stats: Arc<PipelineStats>,
    pub shutdown_rx: tokio::sync::oneshot::Receiver<()>,
}

/// Tick periods. Each timer first fires one full period after start.
pub struct PipelineConfig {
    pub poll_interval: Duration,
    pub flush_interval: Duration,
    pub stats_log_interval: Duration,
}

impl From<&crate::config::SamplingConfig> for PipelineConfig {
    fn from(c: &crate::config::SamplingConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(c.poll_interval_secs),
            flush_interval: Duration::from_secs(c.flush_interval_secs),
            stats_log_interval: Duration::from_secs(c.stats_log_interval_secs),
        }
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut t = interval_at(Instant::now() + period, period);
    t.set_missed_tick_behavior(MissedTickBehavior::Skip);
    t
}

/// Hands a flushed envelope to the publisher without waiting. A full or closed channel
/// drops the envelope, same as a failed append.
pub fn dispatch(envelope_tx: &mpsc::Sender<Envelope>, envelope: Envelope, stats: &PipelineStats) {
    match envelope_tx.try_send(envelope) {
        Ok(()) => {}
        Err(TrySendError::Full(env)) => {
            PipelineStats::incr(&stats.publish_failures_total);
            tracing::warn!(
                water_level = env.water_level,
                operation = "dispatch",
                "Publisher backlog full; envelope dropped"
            );
        }
        Err(TrySendError::Closed(env)) => {
            PipelineStats::incr(&stats.publish_failures_total);
            tracing::warn!(
                water_level = env.water_level,
                operation = "dispatch",
                "Publisher channel closed; envelope dropped"
            );
        }
    }
}

pub fn spawn(ctx: PipelineContext, config: PipelineConfig) -> tokio::task::JoinHandle<()> {
    let PipelineContext {
        ingestor,
        aggregator,
        window,
        envelope_tx,
        stats,
        mut shutdown_rx,
    } = ctx;

    let span = tracing::span!(
        tracing::Level::DEBUG,
        "pipeline",
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        flush_interval_ms = config.flush_interval.as_millis() as u64
    );

    tokio::spawn(
        async move {
            let mut poll_tick = ticker(config.poll_interval);
            let mut flush_tick = ticker(config.flush_interval);
            let mut stats_log_tick = ticker(config.stats_log_interval);
            tracing::info!("Started reading and sending");

            loop {
                tokio::select! {
                    _ = poll_tick.tick() => {
                        ingestor.poll().await;
                    }
                    _ = flush_tick.tick() => {
                        if let Some(envelope) = aggregator.flush() {
                            dispatch(&envelope_tx, envelope, &stats);
                        }
                    }
                    _ = stats_log_tick.tick() => {
                        let s = stats.snapshot();
                        let window_len = window::lock(&window).len();
                        tracing::info!(
                            window_len,
                            samples_ingested_total = s.samples_ingested_total,
                            read_failures_total = s.read_failures_total,
                            envelopes_published_total = s.envelopes_published_total,
                            publish_failures_total = s.publish_failures_total,
                            "pipeline stats"
                        );
                    }
                    _ = &mut shutdown_rx => {
                        tracing::debug!("Pipeline shutting down");
                        break;
                    }
                }
            }
        }
        .instrument(span),
    )
}
