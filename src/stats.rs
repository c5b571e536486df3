// Pipeline counters, shared by the stages, the stats log tick and GET /api/status.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PipelineStats {
    pub samples_ingested_total: AtomicU64,
    pub read_failures_total: AtomicU64,
    pub envelopes_published_total: AtomicU64,
    pub publish_failures_total: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub samples_ingested_total: u64,
    pub read_failures_total: u64,
    pub envelopes_published_total: u64,
    pub publish_failures_total: u64,
}

impl PipelineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            samples_ingested_total: self.samples_ingested_total.load(Ordering::Relaxed),
            read_failures_total: self.read_failures_total.load(Ordering::Relaxed),
            envelopes_published_total: self.envelopes_published_total.load(Ordering::Relaxed),
            publish_failures_total: self.publish_failures_total.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
