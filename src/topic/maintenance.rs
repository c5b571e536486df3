// Background topic maintenance: prune entries past retention every prune_interval_secs,
// VACUUM at the next cron fire (local time) or every vacuum_interval_secs.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use super::Topic;
use chrono::{DateTime, Local};
use tokio::time::Instant;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    pub prune_interval_secs: u64,
    /// Optional cron expression for VACUUM. Uses local time.
    pub vacuum_schedule: Option<String>,
    /// Run VACUUM every N seconds when vacuum_schedule is not set.
    pub vacuum_interval_secs: u64,
}

impl From<&crate::config::TopicConfig> for MaintenanceConfig {
    fn from(c: &crate::config::TopicConfig) -> Self {
        Self {
            prune_interval_secs: c.prune_interval_secs,
            vacuum_schedule: c.vacuum_schedule.clone(),
            vacuum_interval_secs: c.vacuum_interval_secs,
        }
    }
}

/// Spawns the maintenance worker. Runs until the shutdown sender fires or is dropped.
pub fn spawn(
    topic: Arc<Topic>,
    config: MaintenanceConfig,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        run(topic, config, shutdown_rx).await;
    })
}

#[instrument(skip(topic, shutdown_rx), fields(prune_interval_secs = config.prune_interval_secs))]
async fn run(
    topic: Arc<Topic>,
    config: MaintenanceConfig,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) {
    let mut prune_interval =
        tokio::time::interval(Duration::from_secs(config.prune_interval_secs));
    prune_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let schedule = config.vacuum_schedule.as_deref().and_then(|expr| {
        cron::Schedule::from_str(expr)
            .inspect_err(|e| warn!(cron = %expr, error = %e, "invalid vacuum_schedule; using vacuum_interval_secs"))
            .ok()
    });
    let vacuum_interval = Duration::from_secs(config.vacuum_interval_secs);
    let mut vacuum_at =
        Instant::now() + vacuum_delay(schedule.as_ref(), vacuum_interval, chrono::Local::now());

    loop {
        tokio::select! {
            _ = prune_interval.tick() => {
                match topic.prune_old_data().await {
                    Ok(0) => {}
                    Ok(n) => info!(entries_pruned = n, "topic retention prune"),
                    Err(e) => warn!(error = %e, operation = "prune_old_data", "topic prune failed"),
                }
            }
            _ = tokio::time::sleep_until(vacuum_at) => {
                match topic.vacuum().await {
                    Ok(()) => info!("vacuum complete"),
                    Err(e) => warn!(error = %e, operation = "vacuum", "vacuum failed"),
                }
                vacuum_at = Instant::now()
                    + vacuum_delay(schedule.as_ref(), vacuum_interval, chrono::Local::now());
            }
            _ = &mut shutdown_rx => {
                tracing::debug!("Topic maintenance shutting down");
                break;
            }
        }
    }
}

/// Time until the next VACUUM: the next cron fire after `now` (local time), or `interval`
/// when no schedule is set. A schedule with no future fire retries in an hour.
fn vacuum_delay(
    schedule: Option<&cron::Schedule>,
    interval: Duration,
    now: DateTime<Local>,
) -> Duration {
    match schedule {
        Some(schedule) => schedule
            .after(&now)
            .next()
            .and_then(|next| (next - now).to_std().ok())
            .unwrap_or(Duration::from_secs(3600)),
        None => interval,
    }
}
